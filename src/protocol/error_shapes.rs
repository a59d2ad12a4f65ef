use crate::error::ErrorCategory;

fn openai_error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest | ErrorCategory::Authentication => "invalid_request_error",
        ErrorCategory::BadGateway => "upstream_error",
        ErrorCategory::ServerError => "server_error",
    }
}

fn openai_error_code(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request",
        ErrorCategory::Authentication => "invalid_api_key",
        ErrorCategory::BadGateway => "bad_gateway",
        ErrorCategory::ServerError => "server_error",
    }
}

#[must_use]
pub(crate) fn openai_error_payload(
    cat: ErrorCategory,
    message: &str,
    details: Option<&serde_json::Value>,
) -> serde_json::Value {
    let mut error = serde_json::json!({
        "message": message,
        "type": openai_error_type(cat),
        "code": openai_error_code(cat),
        "param": null,
    });
    if let (Some(details), Some(obj)) = (details, error.as_object_mut()) {
        obj.insert("details".to_string(), details.clone());
    }
    serde_json::json!({ "error": error })
}
