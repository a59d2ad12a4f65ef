use http::header::AUTHORIZATION;

use crate::error::GatewayError;

/// Extract the bearer key from `Authorization: Bearer <key>`, if any.
#[must_use]
pub fn extract_bearer_key(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Pick the credential forwarded upstream.
///
/// A header key strictly longer than `min_header_key_len` characters wins;
/// otherwise the environment token captured at startup is used.
///
/// # Errors
///
/// Returns [`GatewayError::Auth`] when neither source yields a credential.
pub fn resolve_credential(
    headers: &http::HeaderMap,
    env_token: Option<&str>,
    min_header_key_len: usize,
) -> Result<String, GatewayError> {
    let header_key = extract_bearer_key(headers)
        .filter(|key| key.chars().count() > min_header_key_len);
    if let Some(key) = header_key {
        return Ok(key.to_string());
    }
    env_token
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            GatewayError::Auth(
                "No valid API key provided. Send Authorization: Bearer <key> or set the API token environment variable"
                    .to_string(),
            )
        })
}
