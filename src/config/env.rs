//! Environment variable loading.
//!
//! Variables are read into the same sectioned shape as the YAML file so the two
//! sources can be layered field by field in [`super::merge`].

use std::env;
use std::str::FromStr;

use super::ConfigError;
use super::yaml::{
    BookingYaml, OpenAIYaml, ProfilesYaml, SecurityYaml, ServerYaml, SessionsYaml, TelemetryYaml,
    TlsYaml, YamlConfig,
};

/// Trimmed, non-empty value of `name`.
pub(crate) fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

pub(crate) fn env_bool(name: &str) -> Result<Option<bool>, ConfigError> {
    match env_string(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
            }),
        },
        None => Ok(None),
    }
}

/// Read every supported environment variable.
pub fn from_env() -> Result<YamlConfig, ConfigError> {
    Ok(YamlConfig {
        server: Some(ServerYaml {
            host: env_string("HOST"),
            port: env_parse("PORT")?,
            public_url: env_string("PUBLIC_URL"),
            tls: Some(TlsYaml {
                enabled: env_bool("TLS_ENABLED")?,
                cert_path: env_string("TLS_CERT_PATH"),
                key_path: env_string("TLS_KEY_PATH"),
            }),
        }),
        openai: Some(OpenAIYaml {
            api_key: env_string("OPENAI_API_KEY"),
            base_url: env_string("OPENAI_BASE_URL"),
            realtime_model: env_string("OPENAI_REALTIME_MODEL"),
            realtime_voice: env_string("OPENAI_REALTIME_VOICE"),
            nlu_model: env_string("NLU_MODEL"),
        }),
        booking: Some(BookingYaml {
            url: env_string("BOOKING_API_URL"),
            api_key: env_string("BOOKING_API_KEY"),
            timeout_ms: env_parse("BOOKING_TIMEOUT_MS")?,
        }),
        profiles: Some(ProfilesYaml {
            url: env_string("PROFILE_API_URL"),
            cache_ttl_seconds: env_parse("PROFILE_CACHE_TTL_SECONDS")?,
        }),
        telemetry: Some(TelemetryYaml {
            url: env_string("TELEMETRY_URL"),
            timeout_ms: env_parse("TELEMETRY_TIMEOUT_MS")?,
        }),
        sessions: Some(SessionsYaml {
            ttl_seconds: env_parse("SESSION_TTL_SECONDS")?,
            default_timezone: env_string("DEFAULT_TIMEZONE"),
        }),
        security: Some(SecurityYaml {
            cors_allowed_origins: env_string("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")?,
            rate_limit_burst_size: env_parse("RATE_LIMIT_BURST_SIZE")?,
            max_websocket_connections: env_parse("MAX_WEBSOCKET_CONNECTIONS")?,
            max_connections_per_ip: env_parse("MAX_CONNECTIONS_PER_IP")?,
        }),
    })
}
