use crate::protocol::canonical::UsageInfo;

use super::{AssistantMessage, ChatChoice, ChatCompletion};

/// Assemble a non-streaming `chat.completion` object.
#[must_use]
pub fn encode_chat_completion(
    id: String,
    created: u64,
    model: &str,
    content: String,
    tool_calls: Option<serde_json::Value>,
    usage: UsageInfo,
) -> ChatCompletion {
    let tool_calls = tool_calls.filter(|calls| calls.as_array().is_some_and(|c| !c.is_empty()));
    let finish_reason = if tool_calls.is_some() {
        "tool_calls"
    } else {
        "stop"
    };

    ChatCompletion {
        id,
        object: "chat.completion",
        created,
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant",
                content,
                tool_calls,
            },
            finish_reason,
        }],
        usage,
        system_fingerprint: None,
    }
}
