use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use base64::Engine as _;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::api::{call_driver, lenient_json};
use crate::error::GatewayError;
use crate::protocol::driver::encoder::build_image_payload;
use crate::protocol::driver::response_decoder::is_success;
use crate::state::AppState;
use crate::transport::BufferedResponse;
use crate::util::unix_now_secs;

const MAX_IMAGES: u64 = 10;

/// A decoded `/v1/images/generations` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub n: u64,
    pub size: String,
    pub b64_json: bool,
}

impl ImageRequest {
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when `prompt` is missing or empty.
    pub fn from_body(body: &[u8]) -> Result<Self, GatewayError> {
        let body = lenient_json(body);
        let prompt = body
            .get("prompt")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| GatewayError::Validation("prompt is required".to_string()))?;
        Ok(Self {
            prompt: prompt.to_string(),
            n: body
                .get("n")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, MAX_IMAGES),
            size: body
                .get("size")
                .and_then(Value::as_str)
                .unwrap_or("1024x1024")
                .to_string(),
            b64_json: body.get("response_format").and_then(Value::as_str) == Some("b64_json"),
        })
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(untagged)]
enum ImageData {
    Url { url: String },
    B64 { b64_json: String },
}

#[derive(Debug, Serialize)]
struct ImageResponse {
    created: u64,
    data: Vec<ImageData>,
}

/// `POST /v1/images/generations`.
pub async fn handler(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    match generate(&state, &headers, &body).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn generate(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<ImageResponse, GatewayError> {
    let credential = state.credential(headers)?;
    let request = ImageRequest::from_body(body)?;
    info!(n = request.n, size = %request.size, "image generation request");

    let payload = build_image_payload(&request.prompt, &request.size);
    let upstream_headers = state.upstream.headers_for(&credential)?;
    let reply = call_driver(state, &upstream_headers, &payload).await?;
    let image = image_base64(&reply)?;

    let data = (0..request.n)
        .map(|_| {
            if request.b64_json {
                ImageData::B64 {
                    b64_json: image.clone(),
                }
            } else {
                ImageData::Url {
                    url: format!("data:image/png;base64,{image}"),
                }
            }
        })
        .collect();
    Ok(ImageResponse {
        created: unix_now_secs(),
        data,
    })
}

/// Base64 image data from a driver reply: `result` of a JSON document, or the
/// raw body bytes encoded.
fn image_base64(reply: &BufferedResponse) -> Result<String, GatewayError> {
    if !reply.is_json() {
        return Ok(base64::engine::general_purpose::STANDARD.encode(&reply.body));
    }
    let document: Value = serde_json::from_slice(&reply.body).map_err(|err| {
        GatewayError::UpstreamProtocol {
            status: None,
            message: format!("Invalid image response: {err}"),
            details: Value::Null,
        }
    })?;
    if !is_success(&document) {
        return Err(GatewayError::UpstreamProtocol {
            status: None,
            message: "Image generation failed".to_string(),
            details: document,
        });
    }
    Ok(match document.get("result") {
        Some(Value::String(data)) => data.clone(),
        Some(other) => other.to_string(),
        None => reply.text(),
    })
}
