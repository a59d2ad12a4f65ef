use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream(config)?;
    validate_audio(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    for (name, value) in [
        ("stream_timeout_secs", server.stream_timeout_secs),
        ("request_timeout_secs", server.request_timeout_secs),
        ("models_timeout_secs", server.models_timeout_secs),
    ] {
        if value == 0 {
            return Err(validation_err(format!(
                "server.{name} must be greater than 0"
            )));
        }
    }
    if server.max_request_body_bytes == 0 {
        return Err(validation_err(
            "server.max_request_body_bytes must be greater than 0",
        ));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    validate_http_url("upstream.api_url", &upstream.api_url)?;
    validate_http_url("upstream.models_url", &upstream.models_url)?;
    for (name, value) in [
        ("chat_interface", &upstream.chat_interface),
        ("chat_method", &upstream.chat_method),
        ("default_driver", &upstream.default_driver),
        ("default_model", &upstream.default_model),
    ] {
        if value.trim().is_empty() {
            return Err(validation_err(format!("upstream.{name} cannot be empty")));
        }
    }
    if upstream.default_driver.contains(':') {
        return Err(validation_err(
            "upstream.default_driver must not contain ':'",
        ));
    }
    if config.credentials.token_env.trim().is_empty() {
        return Err(validation_err("credentials.token_env cannot be empty"));
    }
    Ok(())
}

fn validate_http_url(field_name: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|err| validation_err(format!("{field_name} is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "{field_name} must use http:// or https://"
        )));
    }
    Ok(())
}

fn validate_audio(config: &AppConfig) -> Result<(), ConfigError> {
    let audio = &config.audio;
    if audio.default_voice.trim().is_empty() {
        return Err(validation_err("audio.default_voice cannot be empty"));
    }
    for (format, mime) in &audio.content_types {
        if http::HeaderValue::from_str(mime).is_err() {
            return Err(validation_err(format!(
                "audio.content_types['{format}'] is not a valid header value"
            )));
        }
    }
    if http::HeaderValue::from_str(&audio.default_content_type).is_err() {
        return Err(validation_err(
            "audio.default_content_type is not a valid header value",
        ));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}
