use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::jobs::change_feed::ChangeFeedOptions;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub change_feed: ChangeFeedSection,
    #[serde(default)]
    pub auth: AuthSection,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    /// Origin the backend must allow; named when the change feed gives up
    pub app_origin: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            app_origin: "http://localhost:3000".to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ChangeFeedSection {
    pub poll_timeout_ms: u64,
    pub hidden_check_ms: u64,
    pub auth_check_ms: u64,
    pub cors_failure_threshold: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub cors_backoff_initial_ms: u64,
    pub cors_backoff_max_ms: u64,
    pub jitter_ratio: f64,
}

impl Default for ChangeFeedSection {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 25_000,
            hidden_check_ms: 2_000,
            auth_check_ms: 2_000,
            cors_failure_threshold: 3,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 15_000,
            cors_backoff_initial_ms: 5_000,
            cors_backoff_max_ms: 30_000,
            jitter_ratio: 0.2,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AuthSection {
    pub jwt: Option<String>,
    pub graph_token: Option<String>,
}

const DEFAULT_CONFIG: &str = r#"
[api]
base_url = "http://localhost:3000/api"
app_origin = "http://localhost:3000"
request_timeout_secs = 60

[change_feed]
poll_timeout_ms = 25000
hidden_check_ms = 2000
auth_check_ms = 2000
cors_failure_threshold = 3
backoff_initial_ms = 1000
backoff_max_ms = 15000
cors_backoff_initial_ms = 5000
cors_backoff_max_ms = 30000
jitter_ratio = 0.2

[auth]
# Backend session token and Outlook (Graph) token
# jwt = "eyJ..."
# graph_token = "EwB..."
"#;

impl ClientConfig {
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let config_path = get_config_path();
        let config = Self::load_from(&config_path)?;
        Ok((config, config_path))
    }

    /// Loads `config_path`, writing the default file first if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        if !config_path.exists() {
            std::fs::write(config_path, DEFAULT_CONFIG).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.to_path_buf()))
            .build()?;

        builder.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    pub fn change_feed_options(&self) -> ChangeFeedOptions {
        let feed = &self.change_feed;
        let poll_timeout = Duration::from_millis(feed.poll_timeout_ms);

        ChangeFeedOptions {
            poll_timeout,
            request_timeout: poll_timeout + Duration::from_secs(10),
            hidden_check_interval: Duration::from_millis(feed.hidden_check_ms),
            auth_check_interval: Duration::from_millis(feed.auth_check_ms),
            cors_failure_threshold: feed.cors_failure_threshold,
            backoff_initial: Duration::from_millis(feed.backoff_initial_ms),
            backoff_max: Duration::from_millis(feed.backoff_max_ms),
            jitter_ratio: feed.jitter_ratio,
            cors_backoff_initial: Duration::from_millis(feed.cors_backoff_initial_ms),
            cors_backoff_max: Duration::from_millis(feed.cors_backoff_max_ms),
            origin: self.api.app_origin.clone(),
        }
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("olxcat").join("client.toml")
    } else {
        PathBuf::from("client.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_file_is_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("client.toml");

        let config = ClientConfig::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.api.base_url, "http://localhost:3000/api");
        assert_eq!(config.change_feed.cors_failure_threshold, 3);
        assert!(config.auth.jwt.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://mail.example.com/api\"\n\n[auth]\njwt = \"abc\"\n",
        )
        .unwrap();

        let config = ClientConfig::load_from(&path).unwrap();

        assert_eq!(config.api.base_url, "https://mail.example.com/api");
        assert_eq!(config.api.request_timeout_secs, 60);
        assert_eq!(config.auth.jwt.as_deref(), Some("abc"));
        assert_eq!(config.change_feed.poll_timeout_ms, 25_000);
    }

    #[test]
    fn test_change_feed_options() {
        let mut config = ClientConfig::default();
        config.change_feed.poll_timeout_ms = 10_000;
        config.api.app_origin = "https://addin.example.com".to_string();

        let options = config.change_feed_options();

        assert_eq!(options.poll_timeout, Duration::from_secs(10));
        assert_eq!(options.request_timeout, Duration::from_secs(20));
        assert_eq!(options.cors_backoff_initial, Duration::from_secs(5));
        assert_eq!(options.origin, "https://addin.example.com");
    }

    #[test]
    fn test_default_config_text_matches_defaults() {
        let parsed: ClientConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        let defaults = ClientConfig::default();

        assert_eq!(parsed.api.base_url, defaults.api.base_url);
        assert_eq!(parsed.change_feed.backoff_max_ms, defaults.change_feed.backoff_max_ms);
        assert_eq!(parsed.change_feed.jitter_ratio, defaults.change_feed.jitter_ratio);
    }
}
