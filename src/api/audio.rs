use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::Value;
use tracing::info;

use crate::api::{call_driver, lenient_json};
use crate::config::AudioConfig;
use crate::error::GatewayError;
use crate::protocol::driver::encoder::{build_speech_payload, SpeechOptions};
use crate::state::AppState;

/// A decoded `/v1/audio/speech` request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
    pub response_format: String,
    pub speed: f64,
}

impl SpeechRequest {
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when `input` is missing or empty.
    pub fn from_body(body: &[u8]) -> Result<Self, GatewayError> {
        let body = lenient_json(body);
        let field = |name: &str, default: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };
        let input = field("input", "");
        if input.is_empty() {
            return Err(GatewayError::Validation("input is required".to_string()));
        }
        Ok(Self {
            model: field("model", "tts-1"),
            input,
            voice: field("voice", "alloy"),
            response_format: field("response_format", "mp3"),
            speed: body.get("speed").and_then(Value::as_f64).unwrap_or(1.0),
        })
    }

    fn options(&self) -> SpeechOptions<'_> {
        SpeechOptions {
            model: &self.model,
            input: &self.input,
            voice: &self.voice,
            speed: self.speed,
        }
    }
}

/// `POST /v1/audio/speech`: the driver's audio bytes are passed through.
pub async fn handler(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    match synthesize(&state, &headers, &body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn synthesize(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, GatewayError> {
    let credential = state.credential(headers)?;
    let request = SpeechRequest::from_body(body)?;
    info!(
        voice = %request.voice,
        format = %request.response_format,
        speed = request.speed,
        "speech synthesis request"
    );

    let payload = build_speech_payload(&request.options(), &state.config.audio);
    let upstream_headers = state.upstream.headers_for(&credential)?;
    let reply = call_driver(state, &upstream_headers, &payload).await?;
    info!(bytes = reply.body.len(), format = %request.response_format, "speech synthesized");

    let content_type = audio_content_type(&state.config.audio, &request.response_format);
    let disposition = format!("attachment; filename=speech.{}", request.response_format);
    let disposition = http::HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| http::HeaderValue::from_static("attachment; filename=speech.mp3"));

    let mut response = Response::new(axum::body::Body::from(reply.body));
    let response_headers = response.headers_mut();
    response_headers.insert(http::header::CONTENT_TYPE, content_type);
    response_headers.insert(http::header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

fn audio_content_type(audio: &AudioConfig, format: &str) -> http::HeaderValue {
    let mime = audio
        .content_types
        .get(format)
        .unwrap_or(&audio.default_content_type);
    http::HeaderValue::from_str(mime).unwrap_or_else(|_| http::HeaderValue::from_static("audio/mpeg"))
}
