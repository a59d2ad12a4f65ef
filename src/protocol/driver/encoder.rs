//! Builders for outbound driver calls.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::config::{AppConfig, AudioConfig};
use crate::protocol::openai_chat::decoder::ChatRequest;

use super::{ChatArgs, DriverCall, ImageArgs, SpeechArgs, UpstreamPayload};

const IMAGE_INTERFACE: &str = "puter-image-generation";
const IMAGE_METHOD: &str = "generate";
const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
const TTS_INTERFACE: &str = "puter-tts";
const TTS_DRIVER: &str = "aws-polly";
const TTS_METHOD: &str = "synthesize";

/// Per-model adjustments and driver defaults, resolved once from config.
#[derive(Debug, Clone)]
pub struct ModelQuirks {
    no_temperature: FxHashSet<String>,
    chat_interface: String,
    chat_method: String,
    default_driver: String,
}

impl ModelQuirks {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            no_temperature: config.models.no_temperature.iter().cloned().collect(),
            chat_interface: config.upstream.chat_interface.clone(),
            chat_method: config.upstream.chat_method.clone(),
            default_driver: config.upstream.default_driver.clone(),
        }
    }

    #[must_use]
    pub fn rejects_temperature(&self, model: &str) -> bool {
        self.no_temperature.contains(model)
    }

    /// Driver for a model id: the prefix before the first `:`, else the default.
    #[must_use]
    pub fn driver_for<'a>(&'a self, model: &'a str) -> &'a str {
        match model.split_once(':') {
            Some((prefix, _)) if !prefix.is_empty() => prefix,
            _ => &self.default_driver,
        }
    }
}

/// Build the non-streaming chat invocation for a decoded request.
#[must_use]
pub fn build_chat_payload(request: &ChatRequest, quirks: &ModelQuirks) -> UpstreamPayload {
    let temperature = match request.temperature {
        Some(value) if quirks.rejects_temperature(&request.model) => {
            warn!(
                model = %request.model,
                temperature = value,
                "model does not accept temperature, dropping it"
            );
            None
        }
        other => other,
    };

    let has_image = request
        .messages
        .iter()
        .any(|message| message.content.has_image());
    let driver = quirks.driver_for(&request.model).to_string();
    debug!(model = %request.model, driver = %driver, vision = has_image, "built chat payload");

    DriverCall {
        interface: quirks.chat_interface.clone(),
        driver: Some(driver),
        method: quirks.chat_method.clone(),
        args: ChatArgs {
            messages: request.messages.clone(),
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            temperature,
            tools: request.tools.clone(),
            vision: has_image.then_some(true),
            stream: None,
        },
        test_mode: false,
    }
}

/// Build an image generation call. The default size sends no dimensions; an
/// unparsable size is ignored with a warning.
#[must_use]
pub fn build_image_payload(prompt: &str, size: &str) -> DriverCall<ImageArgs> {
    let (width, height) = if size == DEFAULT_IMAGE_SIZE {
        (None, None)
    } else if let Some((w, h)) = parse_size(size) {
        (Some(w), Some(h))
    } else {
        warn!(size = %size, "invalid image size, using {DEFAULT_IMAGE_SIZE}");
        (None, None)
    };

    DriverCall {
        interface: IMAGE_INTERFACE.to_string(),
        driver: None,
        method: IMAGE_METHOD.to_string(),
        args: ImageArgs {
            prompt: prompt.to_string(),
            width,
            height,
        },
        test_mode: false,
    }
}

fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Options of an OpenAI speech request after defaulting.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions<'a> {
    pub model: &'a str,
    pub input: &'a str,
    pub voice: &'a str,
    pub speed: f64,
}

/// Build a text-to-speech call. OpenAI voices map onto Polly voices,
/// `tts-1-hd` selects the neural engine, and a speed other than 1 wraps the
/// text in an SSML prosody element.
#[must_use]
pub fn build_speech_payload(options: &SpeechOptions<'_>, audio: &AudioConfig) -> DriverCall<SpeechArgs> {
    let voice = audio
        .voices
        .get(options.voice)
        .cloned()
        .unwrap_or_else(|| audio.default_voice.clone());
    let engine = if options.model == "tts-1-hd" {
        "neural"
    } else {
        "standard"
    };

    #[allow(clippy::float_cmp)]
    let text = if options.speed == 1.0 {
        options.input.to_string()
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let rate = (options.speed * 100.0) as i64;
        format!(
            "<speak><prosody rate=\"{rate}%\">{}</prosody></speak>",
            escape_xml(options.input)
        )
    };

    DriverCall {
        interface: TTS_INTERFACE.to_string(),
        driver: Some(TTS_DRIVER.to_string()),
        method: TTS_METHOD.to_string(),
        args: SpeechArgs {
            text,
            voice,
            engine,
            language: audio.language.clone(),
        },
        test_mode: false,
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
