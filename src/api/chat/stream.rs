use std::convert::Infallible;
use std::sync::Arc;

use axum::response::Response;
use bytes::Bytes;

use crate::protocol::driver::UpstreamPayload;
use crate::protocol::openai_chat::stream::{encode_stream_event, ChunkIdentity};
use crate::state::AppState;
use crate::stream::StreamRelay;
use crate::util::unix_now_secs;

/// Start a relay and wrap it as an SSE response. The role chunk is produced
/// before any upstream call is made.
pub(super) fn respond(
    state: Arc<AppState>,
    headers: http::HeaderMap,
    payload: UpstreamPayload,
    prompt_text: String,
) -> Response {
    let identity = ChunkIdentity {
        id: state.next_completion_id(),
        created: unix_now_secs(),
        model: payload.args.model.clone(),
    };
    let relay = StreamRelay::new(state, headers, payload, prompt_text);

    let frames = futures_util::stream::unfold((relay, identity), |(mut relay, identity)| async move {
        let event = relay.next_event().await?;
        let frame = encode_stream_event(&identity, &event);
        Some((Ok::<Bytes, Infallible>(frame), (relay, identity)))
    });

    sse_ok_response(axum::body::Body::from_stream(frames))
}

#[inline]
fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
