//! Service configuration.

use std::env;
use std::path::PathBuf;

/// Service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to bind the HTTP listener to.
    pub listen_addr: String,

    /// Directory for the `RocksDB` database.
    pub data_dir: PathBuf,

    /// API key for service-to-service requests. When unset, every
    /// authenticated route rejects with 401.
    pub service_api_key: Option<String>,

    /// Allowed CORS origins. `"*"` allows any origin.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            data_dir: PathBuf::from("./data"),
            service_api_key: None,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: env::var("CARDWISE_LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: env::var("CARDWISE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            service_api_key: env::var("CARDWISE_SERVICE_API_KEY").ok(),
            cors_origins: env::var("CARDWISE_CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: env::var("CARDWISE_MAX_BODY_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env::var("CARDWISE_REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ServiceConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert!(config.service_api_key.is_none());
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.request_timeout_seconds, 30);
    }
}
