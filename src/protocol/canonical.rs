use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Canonical message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Parse a caller-supplied role. `developer` is folded into `system`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "system" | "developer" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

/// One element of a list-shaped message content.
///
/// Only the two canonical shapes are typed; anything else is carried verbatim
/// so normalization never drops caller data.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text { text: String },
    Image { url: String, detail: Option<String> },
    Other(serde_json::Value),
}

#[derive(Serialize)]
struct ImageUrlRef<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

impl ContentPart {
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Self {
        if let Some(part) = Self::typed_from_value(&value) {
            return part;
        }
        ContentPart::Other(value)
    }

    fn typed_from_value(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        match obj.get("type")?.as_str()? {
            "text" if obj.len() == 2 => Some(ContentPart::Text {
                text: obj.get("text")?.as_str()?.to_string(),
            }),
            "image_url" if obj.len() == 2 => {
                let image = obj.get("image_url")?.as_object()?;
                let url = image.get("url")?.as_str()?.to_string();
                let detail = match image.get("detail") {
                    None => None,
                    Some(detail) => Some(detail.as_str()?.to_string()),
                };
                if image.len() != 1 + usize::from(detail.is_some()) {
                    return None;
                }
                Some(ContentPart::Image { url, detail })
            }
            _ => None,
        }
    }

    /// Whether this part carries an image (typed, or any object with an `image_url` key).
    #[must_use]
    pub fn is_image(&self) -> bool {
        match self {
            ContentPart::Image { .. } => true,
            ContentPart::Other(serde_json::Value::Object(obj)) => obj.contains_key("image_url"),
            ContentPart::Text { .. } | ContentPart::Other(_) => false,
        }
    }

    /// Text used for local token estimation. Images do not count.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text } => Some(text),
            ContentPart::Other(value) => value.get("text").and_then(serde_json::Value::as_str),
            ContentPart::Image { .. } => None,
        }
    }
}

impl Serialize for ContentPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentPart::Text { text } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
                map.end()
            }
            ContentPart::Image { url, detail } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "image_url")?;
                map.serialize_entry(
                    "image_url",
                    &ImageUrlRef {
                        url,
                        detail: detail.as_deref(),
                    },
                )?;
                map.end()
            }
            ContentPart::Other(value) => value.serialize(serializer),
        }
    }
}

/// Message content: plain text or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    #[must_use]
    pub fn has_image(&self) -> bool {
        match self {
            MessageContent::Text(_) => false,
            MessageContent::Parts(parts) => parts.iter().any(ContentPart::is_image),
        }
    }
}

/// A single message in the canonical conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Concatenated input text of a conversation, used for prompt-token estimation.
#[must_use]
pub fn prompt_text(messages: &[ChatMessage]) -> String {
    let mut pieces: Vec<&str> = Vec::new();
    for message in messages {
        match &message.content {
            MessageContent::Text(text) => pieces.push(text),
            MessageContent::Parts(parts) => pieces.extend(parts.iter().filter_map(ContentPart::text)),
        }
    }
    pieces.join("\n")
}

/// Finalized token usage. `total_tokens` is the sum of the two components,
/// saturating at `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageInfo {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageInfo {
    #[must_use]
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// A single event emitted by the streaming relay, in lifetime order:
/// `RoleAnnounce`, `ContentDelta*`, `FinalUsage`, `Done`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    RoleAnnounce,
    ContentDelta(String),
    FinalUsage(UsageInfo),
    Done,
}
