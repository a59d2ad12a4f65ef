use bytes::Bytes;

use crate::protocol::canonical::StreamEvent;
use crate::stream::sse::{done_frame, openai_sse_frame};

use super::{ChatCompletionChunk, ChunkChoice, ChunkDelta};

/// Identity shared by every chunk of one streamed completion.
#[derive(Debug, Clone)]
pub struct ChunkIdentity {
    pub id: String,
    pub created: u64,
    pub model: String,
}

/// Encode one relay event as an `OpenAI` SSE frame.
#[must_use]
pub fn encode_stream_event(identity: &ChunkIdentity, event: &StreamEvent) -> Bytes {
    let (delta, finish_reason, usage) = match event {
        StreamEvent::RoleAnnounce => (
            ChunkDelta {
                role: Some("assistant"),
                content: None,
            },
            None,
            None,
        ),
        StreamEvent::ContentDelta(text) => (
            ChunkDelta {
                role: None,
                content: Some(text.as_str()),
            },
            None,
            None,
        ),
        StreamEvent::FinalUsage(usage) => (ChunkDelta::default(), Some("stop"), Some(*usage)),
        StreamEvent::Done => return done_frame(),
    };

    let chunk = ChatCompletionChunk {
        id: &identity.id,
        object: "chat.completion.chunk",
        created: identity.created,
        model: &identity.model,
        choices: [ChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
        usage,
    };

    match serde_json::to_string(&chunk) {
        Ok(json) => openai_sse_frame(&json),
        Err(err) => {
            // Only reachable if a string were not valid UTF-8; keep the stream framed.
            tracing::error!(error = %err, "failed to serialize stream chunk");
            openai_sse_frame("{}")
        }
    }
}
