//! Configuration module for the receptionist gateway
//!
//! Configuration comes from a YAML file, environment variables and `.env`.
//! Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Layering YAML over environment over defaults
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use receptionist_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//!
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

mod env;
mod merge;
mod validation;
mod yaml;

pub use validation::validate_http_url;

/// Built-in defaults.
pub mod defaults {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 3001;
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const REALTIME_MODEL: &str = "gpt-4o-realtime-preview";
    pub const REALTIME_VOICE: &str = "alloy";
    pub const NLU_MODEL: &str = "gpt-4o-mini";
    pub const BOOKING_TIMEOUT_MS: u64 = 10_000;
    pub const PROFILE_CACHE_TTL_SECONDS: u64 = 300;
    pub const TELEMETRY_TIMEOUT_MS: u64 = 2_500;
    pub const SESSION_TTL_SECONDS: u64 = 30 * 60;
    pub const TIMEZONE: &str = "America/New_York";
    pub const RATE_LIMIT_RPS: u32 = 60;
    pub const RATE_LIMIT_BURST: u32 = 10;
    pub const MAX_CONNECTIONS_PER_IP: u32 = 100;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse YAML config: {0}")]
    Parse(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Everything needed to run the gateway: listener and TLS, the OpenAI realtime
/// and NLU settings, the booking/profile/telemetry collaborators, session
/// lifetime, and security limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL (used to build the media stream URL)
    pub public_url: Option<String>,
    pub tls: Option<TlsConfig>,

    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub nlu_model: String,

    // Booking backend
    pub booking_api_url: Option<String>,
    pub booking_api_key: Option<String>,
    pub booking_timeout_ms: u64,

    // Business profiles
    pub profile_api_url: Option<String>,
    pub profile_cache_ttl_seconds: u64,

    // Telemetry sink; disabled when unset
    pub telemetry_url: Option<String>,
    pub telemetry_timeout_ms: u64,

    // Sessions
    pub session_ttl_seconds: u64,
    pub default_timezone: String,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: u32,
    pub rate_limit_burst_size: u32,
    /// Maximum concurrent WebSocket connections (None = unlimited)
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: u32,
}

/// Zeroize secret fields when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.booking_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and defaults).
    ///
    /// `.env` is loaded in `main` before this is called, so its values are
    /// visible here unless a real environment variable overrides them.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(env::from_env()?, None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file layered over the environment.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(env::from_env()?, Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn booking_timeout(&self) -> Duration {
        Duration::from_millis(self.booking_timeout_ms)
    }

    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_timeout_ms)
    }

    pub fn profile_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_cache_ttl_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        // Defaults only; an empty env layer cannot fail to merge.
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            public_url: None,
            tls: None,
            openai_api_key: None,
            openai_base_url: defaults::OPENAI_BASE_URL.to_string(),
            realtime_model: defaults::REALTIME_MODEL.to_string(),
            realtime_voice: defaults::REALTIME_VOICE.to_string(),
            nlu_model: defaults::NLU_MODEL.to_string(),
            booking_api_url: None,
            booking_api_key: None,
            booking_timeout_ms: defaults::BOOKING_TIMEOUT_MS,
            profile_api_url: None,
            profile_cache_ttl_seconds: defaults::PROFILE_CACHE_TTL_SECONDS,
            telemetry_url: None,
            telemetry_timeout_ms: defaults::TELEMETRY_TIMEOUT_MS,
            session_ttl_seconds: defaults::SESSION_TTL_SECONDS,
            default_timezone: defaults::TIMEZONE.to_string(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: defaults::RATE_LIMIT_RPS,
            rate_limit_burst_size: defaults::RATE_LIMIT_BURST,
            max_websocket_connections: None,
            max_connections_per_ip: defaults::MAX_CONNECTIONS_PER_IP,
        }
    }
}
