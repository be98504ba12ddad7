//! Configuration validation.

use url::Url;

use super::{ConfigError, ServerConfig};

/// `value`, when set, must be an absolute http(s) URL.
pub fn validate_http_url(name: &str, value: Option<&str>) -> Result<(), ConfigError> {
    let Some(raw) = value else {
        return Ok(());
    };
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid(format!("{name} is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{name} must use http or https, got {other}"
        ))),
    }
}

fn validate_nonzero(name: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
    }
    Ok(())
}

pub fn validate_tls(config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(tls) = &config.tls {
        for (name, path) in [("TLS_CERT_PATH", &tls.cert_path), ("TLS_KEY_PATH", &tls.key_path)] {
            if !path.exists() {
                return Err(ConfigError::Invalid(format!(
                    "{name} does not exist: {}",
                    path.display()
                )));
            }
        }
    }
    Ok(())
}

/// Run every check against a merged configuration.
pub fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_tls(config)?;

    validate_nonzero("SESSION_TTL_SECONDS", config.session_ttl_seconds)?;
    validate_nonzero("TELEMETRY_TIMEOUT_MS", config.telemetry_timeout_ms)?;
    validate_nonzero("BOOKING_TIMEOUT_MS", config.booking_timeout_ms)?;
    validate_nonzero("PROFILE_CACHE_TTL_SECONDS", config.profile_cache_ttl_seconds)?;

    validate_http_url("PUBLIC_URL", config.public_url.as_deref())?;
    validate_http_url("OPENAI_BASE_URL", Some(&config.openai_base_url))?;
    validate_http_url("BOOKING_API_URL", config.booking_api_url.as_deref())?;
    validate_http_url("PROFILE_API_URL", config.profile_api_url.as_deref())?;
    validate_http_url("TELEMETRY_URL", config.telemetry_url.as_deref())?;

    if config.default_timezone.trim().is_empty() {
        return Err(ConfigError::Invalid("DEFAULT_TIMEZONE must not be empty".into()));
    }
    Ok(())
}
