use http::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};

use crate::config::UpstreamConfig;
use crate::error::GatewayError;

/// Precomputed upstream endpoints and the browser-like header bundle the
/// driver API expects. Built once at startup.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    api_url: url::Url,
    models_url: url::Url,
    static_headers: http::HeaderMap,
}

impl PreparedUpstream {
    /// Build the prepared upstream from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when a URL or header value is invalid.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, GatewayError> {
        let parse = |field: &str, raw: &str| {
            url::Url::parse(raw)
                .map_err(|err| GatewayError::Config(format!("upstream.{field} is invalid: {err}")))
        };
        Ok(Self {
            api_url: parse("api_url", &upstream.api_url)?,
            models_url: parse("models_url", &upstream.models_url)?,
            static_headers: Self::build_static_headers(upstream)?,
        })
    }

    fn build_static_headers(upstream: &UpstreamConfig) -> Result<http::HeaderMap, GatewayError> {
        let value = |field: &str, raw: &str| {
            HeaderValue::from_str(raw)
                .map_err(|err| GatewayError::Config(format!("upstream.{field} is not a valid header: {err}")))
        };

        let mut headers = http::HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(ORIGIN, value("origin", &upstream.origin)?);
        headers.insert(REFERER, value("referer", &upstream.referer)?);
        headers.insert(USER_AGENT, value("user_agent", &upstream.user_agent)?);
        Ok(headers)
    }

    #[must_use]
    pub fn api_url(&self) -> &url::Url {
        &self.api_url
    }

    #[must_use]
    pub fn models_url(&self) -> &url::Url {
        &self.models_url
    }

    /// The static header bundle plus `Authorization: Bearer <credential>`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Auth`] when the credential cannot be carried in a header.
    pub fn headers_for(&self, credential: &str) -> Result<http::HeaderMap, GatewayError> {
        let mut headers = self.static_headers.clone();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| GatewayError::Auth("API key contains invalid characters".to_string()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}
