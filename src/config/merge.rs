//! Layering of configuration sources: YAML over environment over defaults.

use std::path::PathBuf;

use super::yaml::{TlsYaml, YamlConfig};
use super::{ConfigError, ServerConfig, TlsConfig, defaults};

/// Pick the first present value from the YAML layer, then the env layer.
macro_rules! layer {
    ($yaml:expr, $env:expr, $section:ident . $field:ident) => {
        $yaml
            .$section
            .as_ref()
            .and_then(|s| s.$field.clone())
            .or_else(|| $env.$section.as_ref().and_then(|s| s.$field.clone()))
    };
}

fn tls_of(config: &YamlConfig) -> Option<&TlsYaml> {
    config.server.as_ref().and_then(|s| s.tls.as_ref())
}

fn tls_layer(yaml: &YamlConfig, env: &YamlConfig) -> (Option<bool>, Option<String>, Option<String>) {
    let (yaml, env) = (tls_of(yaml), tls_of(env));
    let enabled = yaml.and_then(|t| t.enabled).or(env.and_then(|t| t.enabled));
    let cert = yaml
        .and_then(|t| t.cert_path.clone())
        .or_else(|| env.and_then(|t| t.cert_path.clone()));
    let key = yaml
        .and_then(|t| t.key_path.clone())
        .or_else(|| env.and_then(|t| t.key_path.clone()));
    (enabled, cert, key)
}

/// Build the final configuration. `yaml` values win over `env` values, and
/// anything left unset takes its default.
pub fn merge_config(env: YamlConfig, yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let yaml = yaml.unwrap_or_default();

    let (tls_enabled, cert_path, key_path) = tls_layer(&yaml, &env);
    let tls = match (tls_enabled.unwrap_or(false), cert_path, key_path) {
        (false, _, _) => None,
        (true, Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (true, _, _) => {
            return Err(ConfigError::Invalid(
                "TLS is enabled but TLS_CERT_PATH and TLS_KEY_PATH are not both set".into(),
            ));
        }
    };

    Ok(ServerConfig {
        host: layer!(yaml, env, server.host).unwrap_or_else(|| defaults::HOST.to_string()),
        port: layer!(yaml, env, server.port).unwrap_or(defaults::PORT),
        public_url: layer!(yaml, env, server.public_url),
        tls,

        openai_api_key: layer!(yaml, env, openai.api_key),
        openai_base_url: layer!(yaml, env, openai.base_url)
            .unwrap_or_else(|| defaults::OPENAI_BASE_URL.to_string()),
        realtime_model: layer!(yaml, env, openai.realtime_model)
            .unwrap_or_else(|| defaults::REALTIME_MODEL.to_string()),
        realtime_voice: layer!(yaml, env, openai.realtime_voice)
            .unwrap_or_else(|| defaults::REALTIME_VOICE.to_string()),
        nlu_model: layer!(yaml, env, openai.nlu_model)
            .unwrap_or_else(|| defaults::NLU_MODEL.to_string()),

        booking_api_url: layer!(yaml, env, booking.url),
        booking_api_key: layer!(yaml, env, booking.api_key),
        booking_timeout_ms: layer!(yaml, env, booking.timeout_ms)
            .unwrap_or(defaults::BOOKING_TIMEOUT_MS),

        profile_api_url: layer!(yaml, env, profiles.url),
        profile_cache_ttl_seconds: layer!(yaml, env, profiles.cache_ttl_seconds)
            .unwrap_or(defaults::PROFILE_CACHE_TTL_SECONDS),

        telemetry_url: layer!(yaml, env, telemetry.url),
        telemetry_timeout_ms: layer!(yaml, env, telemetry.timeout_ms)
            .unwrap_or(defaults::TELEMETRY_TIMEOUT_MS),

        session_ttl_seconds: layer!(yaml, env, sessions.ttl_seconds)
            .unwrap_or(defaults::SESSION_TTL_SECONDS),
        default_timezone: layer!(yaml, env, sessions.default_timezone)
            .unwrap_or_else(|| defaults::TIMEZONE.to_string()),

        cors_allowed_origins: layer!(yaml, env, security.cors_allowed_origins),
        rate_limit_requests_per_second: layer!(yaml, env, security.rate_limit_requests_per_second)
            .unwrap_or(defaults::RATE_LIMIT_RPS),
        rate_limit_burst_size: layer!(yaml, env, security.rate_limit_burst_size)
            .unwrap_or(defaults::RATE_LIMIT_BURST),
        max_websocket_connections: layer!(yaml, env, security.max_websocket_connections),
        max_connections_per_ip: layer!(yaml, env, security.max_connections_per_ip)
            .unwrap_or(defaults::MAX_CONNECTIONS_PER_IP),
    })
}
