use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// Every field is optional. Values present here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   public_url: "https://voice.example.com"
///   tls:
///     enabled: false
///
/// openai:
///   api_key: "sk-..."
///   realtime_model: "gpt-4o-realtime-preview"
///   realtime_voice: "alloy"
///   nlu_model: "gpt-4o-mini"
///
/// booking:
///   url: "https://scheduling.example.com/api"
///   api_key: "booking-key"
///   timeout_ms: 10000
///
/// profiles:
///   url: "https://profiles.example.com"
///   cache_ttl_seconds: 300
///
/// telemetry:
///   url: "https://telemetry.example.com"
///   timeout_ms: 2500
///
/// sessions:
///   ttl_seconds: 1800
///   default_timezone: "America/New_York"
///
/// security:
///   cors_allowed_origins: "*"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 500
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub booking: Option<BookingYaml>,
    pub profiles: Option<ProfilesYaml>,
    pub telemetry: Option<TelemetryYaml>,
    pub sessions: Option<SessionsYaml>,
    pub security: Option<SecurityYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Externally reachable base URL, used for the media stream URL in TwiML
    pub public_url: Option<String>,
    pub tls: Option<TlsYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    /// REST base URL for the NLU extractor
    pub base_url: Option<String>,
    pub realtime_model: Option<String>,
    pub realtime_voice: Option<String>,
    pub nlu_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BookingYaml {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProfilesYaml {
    pub url: Option<String>,
    pub cache_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelemetryYaml {
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionsYaml {
    pub ttl_seconds: Option<u64>,
    pub default_timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
  public_url: "https://voice.example.com"
  tls:
    enabled: true
    cert_path: "/certs/cert.pem"
    key_path: "/certs/key.pem"
openai:
  api_key: "sk-yaml"
  realtime_voice: "coral"
booking:
  url: "https://booking.example.com"
  timeout_ms: 5000
profiles:
  url: "https://profiles.example.com"
  cache_ttl_seconds: 60
telemetry:
  url: "https://telemetry.example.com"
sessions:
  ttl_seconds: 600
  default_timezone: "Europe/Berlin"
security:
  max_websocket_connections: 50
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.port, Some(8080));
        assert_eq!(server.tls.unwrap().enabled, Some(true));
        assert_eq!(config.openai.unwrap().realtime_voice.as_deref(), Some("coral"));
        assert_eq!(config.booking.unwrap().timeout_ms, Some(5000));
        assert_eq!(config.profiles.unwrap().cache_ttl_seconds, Some(60));
        assert!(config.telemetry.unwrap().timeout_ms.is_none());
        assert_eq!(
            config.sessions.unwrap().default_timezone.as_deref(),
            Some("Europe/Berlin")
        );
        assert_eq!(config.security.unwrap().max_websocket_connections, Some(50));
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.booking.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  host: \"localhost\"\n  port: 3000\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("localhost".to_string())
        );
    }

    #[test]
    fn test_from_file_not_found() {
        let path = PathBuf::from("/nonexistent/config.yaml");
        let result = YamlConfig::from_file(&path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");
        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }
}
