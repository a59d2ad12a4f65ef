//! Decoding of non-streaming driver replies.

use serde_json::Value;

use crate::error::GatewayError;

/// One `{type, amount}` entry of a driver `result.usage` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub kind: String,
    pub amount: u64,
}

/// Extract the usage records from `result.usage` of any driver document.
///
/// Entries that are not objects, or that lack a string `type` or a numeric
/// `amount`, are skipped.
#[must_use]
pub fn usage_records(document: &Value) -> Vec<UsageRecord> {
    let Some(list) = document
        .get("result")
        .and_then(|result| result.get("usage"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|entry| {
            let kind = entry.get("type")?.as_str()?;
            let amount = entry.get("amount")?;
            let amount = amount.as_u64().or_else(|| {
                amount
                    .as_f64()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .map(|v| {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let whole = v as u64;
                        whole
                    })
            })?;
            Some(UsageRecord {
                kind: kind.to_string(),
                amount,
            })
        })
        .collect()
}

/// Read `result.message.content` as text. A list of text blocks is joined.
#[must_use]
pub fn message_content(document: &Value) -> Option<String> {
    match document.pointer("/result/message/content")? {
        Value::String(text) => Some(text.clone()),
        Value::Array(blocks) => Some(
            blocks
                .iter()
                .filter_map(|block| match block {
                    Value::String(text) => Some(text.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect::<String>(),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// The successful part of a chat completion reply.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverReply {
    pub content: String,
    pub tool_calls: Option<Value>,
    pub usage: Vec<UsageRecord>,
}

/// Decode a `puter-chat-completion` reply body.
///
/// # Errors
///
/// Returns [`GatewayError::UpstreamProtocol`] when the body is not JSON or
/// when `success` is not `true`; `details` carries what the upstream sent.
pub fn decode_chat_reply(body: &[u8]) -> Result<DriverReply, GatewayError> {
    let document: Value = serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "upstream reply is not JSON");
        GatewayError::UpstreamProtocol {
            status: None,
            message: "Upstream returned error".to_string(),
            details: Value::String(String::from_utf8_lossy(body).into_owned()),
        }
    })?;

    if !is_success(&document) {
        return Err(GatewayError::UpstreamProtocol {
            status: None,
            message: "Upstream returned error".to_string(),
            details: document,
        });
    }

    let tool_calls = document
        .pointer("/result/message/tool_calls")
        .filter(|calls| calls.as_array().is_some_and(|list| !list.is_empty()))
        .cloned();

    Ok(DriverReply {
        content: message_content(&document).unwrap_or_default(),
        tool_calls,
        usage: usage_records(&document),
    })
}

/// Whether a driver document reports `success: true`.
#[must_use]
pub fn is_success(document: &Value) -> bool {
    document.get("success").and_then(Value::as_bool) == Some(true)
}
