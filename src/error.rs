use crate::protocol::error_shapes::openai_error_payload;

/// Error type shared by every request path.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Validation(String),
    /// The upstream could not be reached or the connection broke.
    #[error("Upstream error: {0}")]
    UpstreamTransport(String),
    /// The upstream answered, but with a failure status or an explicit failure flag.
    #[error("{message}")]
    UpstreamProtocol {
        status: Option<u16>,
        message: String,
        details: serde_json::Value,
    },
    /// One malformed line inside a stream. Never surfaced to the caller.
    #[error("Fragment parse error: {0}")]
    FragmentParse(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    BadGateway,
    ServerError,
}

impl GatewayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::Validation(_) => ErrorCategory::InvalidRequest,
            GatewayError::Auth(_) => ErrorCategory::Authentication,
            GatewayError::UpstreamTransport(_) | GatewayError::UpstreamProtocol { .. } => {
                ErrorCategory::BadGateway
            }
            GatewayError::Config(_)
            | GatewayError::FragmentParse(_)
            | GatewayError::Internal(_) => ErrorCategory::ServerError,
        }
    }

    /// Build a protocol error from a non-success upstream status and its body text.
    #[must_use]
    pub fn upstream_status(status: u16, body: String) -> Self {
        GatewayError::UpstreamProtocol {
            status: Some(status),
            message: format!("Upstream status {status}"),
            details: serde_json::Value::String(body),
        }
    }

    /// HTTP status the upstream answered with, when it answered with a failure status.
    #[must_use]
    pub fn upstream_http_status(&self) -> Option<u16> {
        match self {
            GatewayError::UpstreamProtocol { status, .. } => *status,
            _ => None,
        }
    }

    #[must_use]
    fn details(&self) -> Option<&serde_json::Value> {
        match self {
            GatewayError::UpstreamProtocol { details, .. } if !details.is_null() => Some(details),
            _ => None,
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::BadGateway => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error as (`status_code`, OpenAI-style JSON envelope).
#[must_use]
pub fn format_error(err: &GatewayError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    let mut body = openai_error_payload(cat, &err.to_string(), err.details());
    if let (Some(upstream), Some(error)) = (
        err.upstream_http_status(),
        body.get_mut("error").and_then(serde_json::Value::as_object_mut),
    ) {
        error.insert("upstream_status".to_string(), upstream.into());
    }
    (status, body)
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        if status == http::StatusCode::BAD_GATEWAY {
            tracing::warn!(
                upstream_status = ?self.upstream_http_status(),
                error = %self,
                "upstream failure"
            );
        }
        (status, axum::Json(body)).into_response()
    }
}
