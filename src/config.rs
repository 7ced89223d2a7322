// ABOUTME: Application configuration loaded from ~/.config/pegashell/config.toml
// Everything has an in-code default; a missing file is not an error

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

fn default_api_base() -> String {
    "https://localhost:8006/api".to_string()
}

fn default_auth_retry_delay_ms() -> u64 {
    1500
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// REST/relay origin, e.g. `https://pegaprox.example:8006/api`
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Skip TLS verification on the resolver call (lab clusters with
    /// self-signed certificates)
    #[serde(default)]
    pub insecure: bool,

    /// Delay before an auth-shaped error drops the session back to the login
    /// form
    #[serde(default = "default_auth_retry_delay_ms")]
    pub auth_retry_delay_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            insecure: false,
            auth_retry_delay_ms: default_auth_retry_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl AppConfig {
    pub fn auth_retry_delay(&self) -> Duration {
        Duration::from_millis(self.auth_retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pegashell").join("config.toml"))
    }

    /// Load the config file if present, falling back to defaults. A malformed
    /// file is reported and ignored rather than aborting the shell.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!("loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("ignoring malformed config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api_base, "https://localhost:8006/api");
        assert!(!config.insecure);
        assert_eq!(config.auth_retry_delay(), Duration::from_millis(1500));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: AppConfig = toml::from_str("api_base = \"http://10.0.0.1:8006/api\"").unwrap();
        assert_eq!(config.api_base, "http://10.0.0.1:8006/api");
        assert_eq!(config.auth_retry_delay_ms, 1500);
        assert!(!config.insecure);
    }

    #[test]
    fn full_file_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            api_base = "https://cluster.lab:8006/api"
            insecure = true
            auth_retry_delay_ms = 500
            connect_timeout_ms = 3000
            "#,
        )
        .unwrap();
        assert!(config.insecure);
        assert_eq!(config.auth_retry_delay(), Duration::from_millis(500));
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
    }
}
