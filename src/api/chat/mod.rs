mod non_stream;
mod stream;

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::info;

use crate::protocol::canonical::prompt_text;
use crate::protocol::driver::encoder::build_chat_payload;
use crate::protocol::openai_chat::decoder::ChatRequest;
use crate::state::AppState;

pub use non_stream::invoke;

/// `POST /v1/chat/completions`.
pub async fn handler(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let credential = match state.credential(&headers) {
        Ok(credential) => credential,
        Err(err) => return err.into_response(),
    };
    let request = match ChatRequest::from_body(&body, &state.config.upstream.default_model) {
        Ok(request) => request,
        Err(err) => {
            info!(error = %err, "rejected chat completion request");
            return err.into_response();
        }
    };
    let upstream_headers = match state.upstream.headers_for(&credential) {
        Ok(headers) => headers,
        Err(err) => return err.into_response(),
    };

    let payload = build_chat_payload(&request, &state.quirks);
    let prompt = prompt_text(&request.messages);
    info!(
        model = %request.model,
        stream = request.stream,
        messages = request.messages.len(),
        "chat completion request"
    );

    if request.stream {
        stream::respond(state, upstream_headers, payload, prompt)
    } else {
        match invoke(&state, &upstream_headers, &payload, &prompt).await {
            Ok(completion) => axum::Json(completion).into_response(),
            Err(err) => err.into_response(),
        }
    }
}
