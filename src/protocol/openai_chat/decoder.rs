//! Inbound chat request decoding and message normalization.

use serde_json::Value;

use crate::error::GatewayError;
use crate::protocol::canonical::{ChatMessage, ContentPart, MessageContent, Role};

/// A decoded `/v1/chat/completions` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub stream: bool,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    /// Tool definitions, opaque and forwarded as-is. `None` when absent or empty.
    pub tools: Option<Value>,
}

impl ChatRequest {
    /// Decode a raw request body. An unparsable body is treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when no message can be derived from
    /// `messages`, `prompt` or `input`, or when a field has an unusable type.
    pub fn from_body(body: &[u8], default_model: &str) -> Result<Self, GatewayError> {
        let body: Value = serde_json::from_slice(body).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "chat request body is not JSON, treating as empty");
            Value::Object(serde_json::Map::new())
        });

        let messages = normalize_messages(&body)?;
        if messages.is_empty() {
            return Err(GatewayError::Validation(
                "messages is required (or a non-empty prompt/input string)".to_string(),
            ));
        }

        let model = body
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(default_model)
            .to_string();
        let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

        let temperature = match body.get("temperature") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_f64().ok_or_else(|| {
                GatewayError::Validation("temperature must be a number".to_string())
            })?),
        };
        let max_tokens = match body.get("max_tokens") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_u64().ok_or_else(|| {
                GatewayError::Validation("max_tokens must be a non-negative integer".to_string())
            })?),
        };
        let tools = body
            .get("tools")
            .filter(|tools| tools.as_array().is_some_and(|list| !list.is_empty()))
            .cloned();

        Ok(Self {
            model,
            stream,
            messages,
            temperature,
            max_tokens,
            tools,
        })
    }
}

/// Canonicalize the message list of an untyped request body.
///
/// `messages` wins when it is a non-empty list; otherwise a non-empty `prompt`
/// (then `input`) string becomes a single user message. The result is empty when
/// neither is present. Order and content are preserved.
///
/// # Errors
///
/// Returns [`GatewayError::Validation`] when a message is not an object or has
/// an unknown role.
pub fn normalize_messages(body: &Value) -> Result<Vec<ChatMessage>, GatewayError> {
    match body.get("messages").and_then(Value::as_array) {
        Some(list) if !list.is_empty() => list
            .iter()
            .enumerate()
            .map(|(index, raw)| normalize_message(index, raw))
            .collect(),
        _ => Ok(legacy_prompt(body).into_iter().collect()),
    }
}

fn legacy_prompt(body: &Value) -> Option<ChatMessage> {
    ["prompt", "input"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .map(ChatMessage::user)
}

fn normalize_message(index: usize, raw: &Value) -> Result<ChatMessage, GatewayError> {
    let obj = raw.as_object().ok_or_else(|| {
        GatewayError::Validation(format!("messages[{index}] must be an object"))
    })?;

    let role = match obj.get("role") {
        None | Some(Value::Null) => Role::User,
        Some(value) => value.as_str().and_then(Role::parse).ok_or_else(|| {
            GatewayError::Validation(format!("messages[{index}].role is not supported: {value}"))
        })?,
    };

    let content = match obj.get("content") {
        None | Some(Value::Null) => MessageContent::default(),
        Some(Value::String(text)) => MessageContent::Text(text.clone()),
        Some(Value::Array(parts)) => MessageContent::Parts(
            parts.iter().cloned().map(ContentPart::from_value).collect(),
        ),
        Some(other) => MessageContent::Text(other.to_string()),
    };

    Ok(ChatMessage { role, content })
}
