use std::time::Duration;

use bytes::Bytes;

use crate::config::ServerConfig;
use crate::error::GatewayError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_reqwest_client(config: &ServerConfig) -> Result<reqwest::Client, GatewayError> {
    let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
    };

    // No client-wide timeout: streamed bodies are bounded per line by the relay.
    reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .map_err(|err| GatewayError::Config(format!("Failed to build HTTP client: {err}")))
}

/// HTTP transport client for driver calls.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with connection pooling from the given server config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the HTTP client cannot be built.
    pub fn new(config: &ServerConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: build_reqwest_client(config)?,
        })
    }

    /// POST a JSON body and buffer the whole reply. `timeout` bounds the
    /// entire exchange, body included.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamTransport`] when the request fails,
    /// times out, or the body cannot be read.
    pub async fn send_request(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        body: Bytes,
        timeout: Duration,
    ) -> Result<BufferedResponse, GatewayError> {
        let response = self
            .client
            .post(url.clone())
            .headers(headers.clone())
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;
        BufferedResponse::read(response).await
    }

    /// POST a JSON body and return as soon as the response head arrives.
    /// `timeout` bounds only that wait; the caller bounds body reads.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamTransport`] when the request fails or
    /// the head does not arrive in time.
    pub async fn send_stream(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        body: Bytes,
        timeout: Duration,
    ) -> Result<reqwest::Response, GatewayError> {
        let send = self
            .client
            .post(url.clone())
            .headers(headers.clone())
            .body(body)
            .send();
        match tokio::time::timeout(timeout, send).await {
            Ok(result) => result.map_err(transport_error),
            Err(_) => Err(GatewayError::UpstreamTransport(format!(
                "no response within {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// GET a resource and buffer the reply.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamTransport`] when the request fails or times out.
    pub async fn get(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        timeout: Duration,
    ) -> Result<BufferedResponse, GatewayError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;
        BufferedResponse::read(response).await
    }
}

/// A fully read upstream reply.
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: http::StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl BufferedResponse {
    async fn read(response: reqwest::Response) -> Result<Self, GatewayError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport_error)?;
        Ok(Self {
            status,
            content_type,
            body,
        })
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        return GatewayError::UpstreamTransport(format!("request timed out: {err}"));
    }
    GatewayError::UpstreamTransport(err.to_string())
}
