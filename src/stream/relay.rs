//! Streaming relay: turns one upstream driver stream into the canonical event
//! sequence `RoleAnnounce, ContentDelta*, FinalUsage, Done`.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::observability::log_request_complete;
use crate::observability::token_counter::account_usage;
use crate::protocol::canonical::{StreamEvent, UsageInfo};
use crate::protocol::driver::fragment::{classify, Fragment};
use crate::protocol::driver::response_decoder::{
    is_success, message_content, usage_records, UsageRecord,
};
use crate::protocol::driver::UpstreamPayload;
use crate::state::AppState;
use crate::stream::lines::line_stream;
use crate::stream::sse::LineFraming;

type LineStream = Pin<Box<dyn Stream<Item = Result<String, reqwest::Error>> + Send>>;

/// Text and usage gathered over one relay. Pure; no I/O.
#[derive(Debug, Default)]
pub struct RelayAccumulator {
    framing: LineFraming,
    accumulated: String,
    usage: Vec<UsageRecord>,
}

impl RelayAccumulator {
    /// Process one upstream line and return the text to emit, if any.
    pub fn ingest_line(&mut self, line: &str) -> Option<String> {
        let payload = self.framing.payload(line)?;
        match classify(payload) {
            Fragment::Text { text, usage } => {
                if let Some(usage) = usage {
                    self.usage = usage;
                }
                Some(text)
            }
            Fragment::UsageOnly(usage) => {
                self.usage = usage;
                None
            }
            Fragment::Literal(text) => Some(text),
            Fragment::Ignored => None,
        }
    }

    /// Record emitted text and wrap it as a delta event.
    pub fn delta(&mut self, text: String) -> StreamEvent {
        self.accumulated.push_str(&text);
        StreamEvent::ContentDelta(text)
    }

    pub fn set_usage(&mut self, usage: Vec<UsageRecord>) {
        self.usage = usage;
    }

    #[must_use]
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    #[must_use]
    pub fn finish(&self, model: &str, prompt_text: &str) -> UsageInfo {
        account_usage(&self.usage, model, prompt_text, &self.accumulated)
    }
}

enum Phase {
    Start,
    RoleSent,
    Relaying(LineStream),
    Fallback,
    Finalizing,
    Done,
    Closed,
}

/// Pull-based producer of canonical stream events for one request.
///
/// Dropping the relay drops the upstream response, which releases the
/// connection; that is the cancellation path when a client disconnects.
pub struct StreamRelay {
    state: Arc<AppState>,
    headers: http::HeaderMap,
    payload: UpstreamPayload,
    model: String,
    prompt_text: String,
    acc: RelayAccumulator,
    phase: Phase,
    started: Instant,
}

impl StreamRelay {
    #[must_use]
    pub fn new(
        state: Arc<AppState>,
        headers: http::HeaderMap,
        payload: UpstreamPayload,
        prompt_text: String,
    ) -> Self {
        let model = payload.args.model.clone();
        Self {
            state,
            headers,
            payload,
            model,
            prompt_text,
            acc: RelayAccumulator::default(),
            phase: Phase::Start,
            started: Instant::now(),
        }
    }

    fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.state.config.server.stream_timeout_secs)
    }

    /// Advance the state machine to its next event. `None` once `Done` was emitted.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Closed) {
                Phase::Start => {
                    self.phase = Phase::RoleSent;
                    return Some(StreamEvent::RoleAnnounce);
                }
                Phase::RoleSent => {
                    self.phase = self.open_stream().await;
                }
                Phase::Relaying(mut lines) => {
                    let idle = self.stream_timeout();
                    match tokio::time::timeout(idle, lines.next()).await {
                        Ok(Some(Ok(line))) => {
                            self.phase = Phase::Relaying(lines);
                            if let Some(text) = self.acc.ingest_line(&line) {
                                return Some(self.acc.delta(text));
                            }
                        }
                        Ok(Some(Err(err))) => {
                            warn!(error = %err, "upstream stream broke");
                            self.phase = Phase::Finalizing;
                            return Some(self.acc.delta(format!("[proxy error] {err}")));
                        }
                        Ok(None) => {
                            debug!(sse_framed = self.acc.framing.is_sse(), "upstream stream ended");
                            self.phase = Phase::Finalizing;
                        }
                        Err(_) => {
                            warn!(idle_secs = idle.as_secs(), "upstream stream went idle");
                            self.phase = Phase::Finalizing;
                            return Some(self.acc.delta(format!(
                                "[proxy error] no data from upstream within {}s",
                                idle.as_secs()
                            )));
                        }
                    }
                }
                Phase::Fallback => {
                    self.phase = Phase::Finalizing;
                    if let Some(text) = self.fallback().await.filter(|text| !text.is_empty()) {
                        return Some(self.acc.delta(text));
                    }
                }
                Phase::Finalizing => {
                    self.phase = Phase::Done;
                    let usage = self.acc.finish(&self.model, &self.prompt_text);
                    log_request_complete(&self.model, &usage, self.started);
                    return Some(StreamEvent::FinalUsage(usage));
                }
                Phase::Done => {
                    self.phase = Phase::Closed;
                    return Some(StreamEvent::Done);
                }
                Phase::Closed => return None,
            }
        }
    }

    async fn open_stream(&mut self) -> Phase {
        let body = match serde_json::to_vec(&self.payload.streaming()) {
            Ok(body) => Bytes::from(body),
            Err(err) => {
                warn!(error = %err, "failed to encode streaming payload");
                return Phase::Fallback;
            }
        };
        let response = self
            .state
            .transport
            .send_stream(
                self.state.upstream.api_url(),
                &self.headers,
                body,
                self.stream_timeout(),
            )
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                debug!(model = %self.model, "upstream stream opened");
                Phase::Relaying(Box::pin(line_stream(response.bytes_stream())))
            }
            Ok(response) => {
                warn!(
                    status = response.status().as_u16(),
                    "stream request refused, falling back to non-stream"
                );
                Phase::Fallback
            }
            Err(err) => {
                warn!(error = %err, "stream request failed, falling back to non-stream");
                Phase::Fallback
            }
        }
    }

    /// One non-streaming attempt. Returns the text to emit.
    async fn fallback(&mut self) -> Option<String> {
        let body = match serde_json::to_vec(&self.payload) {
            Ok(body) => Bytes::from(body),
            Err(err) => {
                let err = GatewayError::Internal(err.to_string());
                return Some(format!("[proxy error] {err}"));
            }
        };
        let reply = self
            .state
            .transport
            .send_request(
                self.state.upstream.api_url(),
                &self.headers,
                body,
                self.stream_timeout(),
            )
            .await;

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "fallback request failed");
                return Some(format!("[proxy error] {err}"));
            }
        };
        if !reply.status.is_success() {
            warn!(status = reply.status.as_u16(), "fallback request refused");
            return Some(format!(
                "[proxy error] Upstream status {}",
                reply.status.as_u16()
            ));
        }

        match serde_json::from_slice::<serde_json::Value>(&reply.body) {
            Ok(document) if is_success(&document) => {
                self.acc.set_usage(usage_records(&document));
                message_content(&document)
            }
            _ => Some(reply.text()),
        }
    }
}
