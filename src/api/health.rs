use axum::response::Json;
use serde_json::{json, Value};

use crate::util::unix_now_secs;

/// Health check handler.
pub fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": unix_now_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
    }))
}
