use crate::errors::{PecanError, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default entrypoint of the grant API
pub const DEFAULT_BASE_URL: &str = "https://www.pecanhq.com/grant/";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    pub cache: CacheConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub key_id: String,
    pub secret: String,
    pub artifact: String,
    pub schema: i32,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub state_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            cache: CacheConfig {
                state_path: PathBuf::from(".pecan/state.json"),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
            },
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            key_id: String::new(),
            secret: String::new(),
            artifact: String::new(),
            schema: 1,
            timeout_seconds: 30,
            user_agent: concat!("pecanhq/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Request timeout for the HTTP transport
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Parsed entrypoint URL
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(PecanError::from)
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let environment = env::var("PECAN_ENV").unwrap_or_else(|_| "development".to_string());
        let defaults = Config::default();

        let config = config::Config::builder()
            .set_default("client.base_url", defaults.client.base_url)
            .and_then(|b| b.set_default("client.key_id", ""))
            .and_then(|b| b.set_default("client.secret", ""))
            .and_then(|b| b.set_default("client.artifact", ""))
            .and_then(|b| b.set_default("client.schema", i64::from(defaults.client.schema)))
            .and_then(|b| b.set_default("client.timeout_seconds", defaults.client.timeout_seconds))
            .and_then(|b| b.set_default("client.user_agent", defaults.client.user_agent))
            .and_then(|b| {
                b.set_default(
                    "cache.state_path",
                    defaults.cache.state_path.to_string_lossy().into_owned(),
                )
            })
            .and_then(|b| b.set_default("observability.log_level", defaults.observability.log_level))
            .and_then(|b| b.set_default("observability.log_format", defaults.observability.log_format))
            .map_err(|e| PecanError::Configuration(e.to_string()))?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::File::with_name(&format!("config/{}", environment)).required(false),
            )
            // e.g., PECAN__CLIENT__KEY_ID=app-key
            .add_source(
                config::Environment::with_prefix("PECAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PecanError::Configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| PecanError::Configuration(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.client.key_id.trim().is_empty() {
            return Err(PecanError::Configuration("Key id is required".to_string()));
        }

        if self.client.secret.trim().is_empty() {
            return Err(PecanError::Configuration("Secret is required".to_string()));
        }

        if self.client.artifact.trim().is_empty() {
            return Err(PecanError::Configuration("Artifact name is required".to_string()));
        }

        if self.client.timeout_seconds == 0 {
            return Err(PecanError::Configuration(
                "Timeout must be at least one second".to_string(),
            ));
        }

        self.client
            .base_url()
            .map_err(|e| PecanError::Configuration(format!("Invalid base URL: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.client.key_id = "app-key".to_string();
        config.client.secret = "c2VjcmV0".to_string();
        config.client.artifact = "billing".to_string();
        config
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        assert!(config.validate().is_ok());

        config.client.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_requires_credentials() {
        let result = Config::default().validate();
        assert!(matches!(result, Err(PecanError::Configuration(_))));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = valid_config();
        config.client.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_base_url_parses() {
        let url = ClientConfig::default().base_url().unwrap();
        assert_eq!(url.host_str(), Some("www.pecanhq.com"));
        assert_eq!(ClientConfig::default().timeout(), Duration::from_secs(30));
    }
}
