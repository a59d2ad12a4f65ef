//! Puter driver-call protocol: `POST /drivers/call` envelopes and replies.

pub mod encoder;
pub mod fragment;
pub mod response_decoder;

use serde::Serialize;
use serde_json::Value;

use crate::protocol::canonical::ChatMessage;

/// The envelope every driver call shares. `Args` is interface specific.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverCall<Args> {
    pub interface: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    pub method: String,
    pub args: Args,
    pub test_mode: bool,
}

/// Arguments of a `puter-chat-completion` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatArgs {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Arguments of a `puter-image-generation` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageArgs {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Arguments of a `puter-tts` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechArgs {
    pub text: String,
    pub voice: String,
    pub engine: &'static str,
    pub language: String,
}

/// A chat completion invocation.
pub type UpstreamPayload = DriverCall<ChatArgs>;

impl UpstreamPayload {
    /// A copy of this payload that asks the driver to stream.
    #[must_use]
    pub fn streaming(&self) -> Self {
        let mut payload = self.clone();
        payload.args.stream = Some(true);
        payload
    }
}
