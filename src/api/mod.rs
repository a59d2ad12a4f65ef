pub mod audio;
pub mod chat;
pub mod health;
pub mod images;
pub mod models;

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::error::GatewayError;
use crate::state::AppState;
use crate::transport::BufferedResponse;

/// Send one buffered driver call with the plain request timeout and reject
/// non-success statuses.
pub(crate) async fn call_driver<P: Serialize>(
    state: &AppState,
    headers: &http::HeaderMap,
    payload: &P,
) -> Result<BufferedResponse, GatewayError> {
    let body = serde_json::to_vec(payload)
        .map_err(|err| GatewayError::Internal(format!("failed to encode payload: {err}")))?;
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let reply = state
        .transport
        .send_request(state.upstream.api_url(), headers, Bytes::from(body), timeout)
        .await?;
    if !reply.status.is_success() {
        tracing::error!(status = reply.status.as_u16(), "upstream returned failure status");
        return Err(GatewayError::upstream_status(reply.status.as_u16(), reply.text()));
    }
    Ok(reply)
}

/// Parse a body as JSON, treating anything unparsable as an empty object.
pub(crate) fn lenient_json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
}
