//! Classification of the lines a streaming driver call produces.

use serde_json::Value;
use tracing::debug;

use crate::error::GatewayError;

use super::response_decoder::{message_content, usage_records, UsageRecord};

/// What one upstream line contributes to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Text to emit as a content delta, possibly with usage to capture.
    Text {
        text: String,
        usage: Option<Vec<UsageRecord>>,
    },
    /// Usage without any text.
    UsageOnly(Vec<UsageRecord>),
    /// Not JSON: forwarded as literal text.
    Literal(String),
    /// JSON with nothing recognizable, or empty text.
    Ignored,
}

/// Classify one line payload (already stripped of any `data:` prefix).
///
/// Text shapes are tried in priority order: `{"type":"text","text":..}`, then
/// any object with a `text` key, then `{"result":{"message":{"content":..}}}`. A
/// `result.usage` list is captured whichever shape matched.
#[must_use]
pub fn classify(payload: &str) -> Fragment {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            let err = GatewayError::FragmentParse(err.to_string());
            debug!(error = %err, "forwarding non-JSON stream line verbatim");
            return if payload.is_empty() {
                Fragment::Ignored
            } else {
                Fragment::Literal(payload.to_string())
            };
        }
    };
    if !value.is_object() {
        return Fragment::Ignored;
    }

    let usage = Some(usage_records(&value)).filter(|records| !records.is_empty());
    match matched_text(&value).filter(|text| !text.is_empty()) {
        Some(text) => Fragment::Text { text, usage },
        None => usage.map_or(Fragment::Ignored, Fragment::UsageOnly),
    }
}

fn matched_text(value: &Value) -> Option<String> {
    // `{"type":"text","text":..}` is a special case of `{"text":..}`. A present
    // `text` key decides the shape even when it holds no string.
    if let Some(text) = value.get("text") {
        return text.as_str().map(str::to_string);
    }
    if value.get("result").is_some_and(Value::is_object) {
        return message_content(value);
    }
    None
}
