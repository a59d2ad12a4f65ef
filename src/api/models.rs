use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::state::AppState;
use crate::util::unix_now_secs;

/// One entry of the `OpenAI` model list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub owned_by: String,
}

#[derive(Debug, Serialize)]
struct ModelList {
    object: &'static str,
    data: Vec<ModelEntry>,
}

/// List models in `OpenAI` format: the upstream catalog when it can be
/// fetched, the configured static list otherwise.
pub async fn handler(State(state): State<Arc<AppState>>, headers: &HeaderMap) -> Response {
    let credential = match state.credential(headers) {
        Ok(credential) => credential,
        Err(err) => return err.into_response(),
    };
    let now = unix_now_secs();
    let owned_by = state.config.upstream.owned_by.as_str();

    let data = match fetch_catalog(&state, &credential, owned_by, now).await {
        Some(models) => {
            info!(count = models.len(), "fetched upstream model catalog");
            models
        }
        None => {
            warn!("using static model list");
            fallback_models(&state.config.models.fallback, owned_by, now)
        }
    };

    Json(ModelList {
        object: "list",
        data,
    })
    .into_response()
}

async fn fetch_catalog(
    state: &AppState,
    credential: &str,
    owned_by: &str,
    now: u64,
) -> Option<Vec<ModelEntry>> {
    let headers = state.upstream.headers_for(credential).ok()?;
    let timeout = Duration::from_secs(state.config.server.models_timeout_secs);
    let reply = match state
        .transport
        .get(state.upstream.models_url(), &headers, timeout)
        .await
    {
        Ok(reply) => reply,
        Err(err) => {
            warn!(error = %err, "model catalog request failed");
            return None;
        }
    };
    if reply.status != http::StatusCode::OK {
        warn!(status = reply.status.as_u16(), "model catalog request refused");
        return None;
    }
    let document: Value = serde_json::from_slice(&reply.body).ok()?;
    parse_catalog(&document, owned_by, now)
}

/// Read `{"models": [..]}` where each entry is a string or an object with
/// `id` (or `name`). `None` when nothing usable is listed.
#[must_use]
pub fn parse_catalog(document: &Value, owned_by: &str, now: u64) -> Option<Vec<ModelEntry>> {
    let models: Vec<ModelEntry> = document
        .get("models")?
        .as_array()?
        .iter()
        .filter_map(|model| match model {
            Value::String(id) => Some(id.as_str()),
            Value::Object(obj) => obj
                .get("id")
                .or_else(|| obj.get("name"))
                .and_then(Value::as_str),
            _ => None,
        })
        .filter(|id| !id.is_empty())
        .map(|id| entry(id, owned_by, now))
        .collect();
    (!models.is_empty()).then_some(models)
}

#[must_use]
pub fn fallback_models(ids: &[String], owned_by: &str, now: u64) -> Vec<ModelEntry> {
    ids.iter().map(|id| entry(id, owned_by, now)).collect()
}

fn entry(id: &str, owned_by: &str, now: u64) -> ModelEntry {
    ModelEntry {
        id: id.to_string(),
        object: "model",
        created: now,
        owned_by: owned_by.to_string(),
    }
}
