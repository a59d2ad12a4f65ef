mod request_id;

use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::protocol::driver::encoder::ModelQuirks;
use crate::transport::{HttpTransport, PreparedUpstream};

use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers. Immutable after startup.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub upstream: PreparedUpstream,
    pub quirks: ModelQuirks,
    env_token: Option<String>,
    request_ids: RequestIdGenerator,
}

impl AppState {
    /// Build the state. `env_token` is the fallback credential captured at startup.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the transport or upstream cannot be prepared.
    pub fn new(config: AppConfig, env_token: Option<String>) -> Result<Self, GatewayError> {
        let transport = HttpTransport::new(&config.server)?;
        let upstream = PreparedUpstream::new(&config.upstream)?;
        let quirks = ModelQuirks::from_config(&config);
        Ok(Self {
            config,
            transport,
            upstream,
            quirks,
            env_token: env_token.filter(|token| !token.is_empty()),
            request_ids: RequestIdGenerator::new(),
        })
    }

    /// Build the state, reading the fallback credential from the configured
    /// environment variable.
    ///
    /// # Errors
    ///
    /// See [`AppState::new`].
    pub fn from_env(config: AppConfig) -> Result<Self, GatewayError> {
        let env_token = std::env::var(&config.credentials.token_env).ok();
        Self::new(config, env_token)
    }

    /// Resolve the upstream credential for one request.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Auth` when no credential is available.
    pub fn credential(&self, headers: &http::HeaderMap) -> Result<String, GatewayError> {
        crate::auth::resolve_credential(
            headers,
            self.env_token.as_deref(),
            self.config.credentials.min_header_key_len,
        )
    }

    pub fn next_completion_id(&self) -> String {
        let seq = self.request_ids.next_seq();
        self.request_ids.completion_id(seq)
    }
}
