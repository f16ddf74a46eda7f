//! TOML configuration with environment overrides. Monitors, channels and
//! subscriptions can be seeded straight from the file, which keeps small
//! deployments to a single artifact.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::models::{Monitor, MonitorStatus, MonitorType, NotificationChannel};
use crate::repository::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_listen_addr() -> String {
    "0.0.0.0:8090".to_string()
}

fn default_max_concurrent_checks() -> usize {
    64
}

fn default_interval() -> i32 {
    60
}

fn default_timeout() -> i32 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// When set, logs are additionally written to daily-rotated JSON files
    /// under this directory.
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
    #[serde(default)]
    pub monitors: Vec<MonitorSeed>,
    #[serde(default)]
    pub channels: Vec<ChannelSeed>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSeed {
    pub name: String,
    #[serde(rename = "type")]
    pub monitor_type: MonitorType,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default = "default_interval")]
    pub interval_seconds: i32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: i32,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub headers: Option<toml::value::Table>,
    #[serde(default)]
    pub expected_status: Option<String>,
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub json_path: Option<String>,
    #[serde(default)]
    pub json_value: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSeed {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    /// Sender-specific settings, stored opaquely and parsed by the sender.
    #[serde(default)]
    pub config: toml::value::Table,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSeed {
    pub monitor: String,
    pub channel: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_dir: None,
            max_concurrent_checks: default_max_concurrent_checks(),
            monitors: Vec::new(),
            channels: Vec::new(),
            subscriptions: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Loads the file if it exists, then applies `PULSEWATCH_*` environment
    /// overrides. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(addr) = std::env::var("PULSEWATCH_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
        if let Ok(dir) = std::env::var("PULSEWATCH_LOG_DIR") {
            self.log_dir = Some(dir);
        }
        if let Ok(raw) = std::env::var("PULSEWATCH_MAX_CONCURRENT_CHECKS") {
            self.max_concurrent_checks = raw.parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "PULSEWATCH_MAX_CONCURRENT_CHECKS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Inserts the seeded monitors, channels and subscriptions into the
    /// store. Subscriptions refer to monitors and channels by name.
    pub fn seed_store(&self, store: &MemoryStore) -> Result<(), ConfigError> {
        let now = Utc::now();
        let mut monitor_ids: HashMap<&str, i32> = HashMap::new();
        let mut channel_ids: HashMap<&str, i32> = HashMap::new();

        for seed in &self.monitors {
            let push_token = match (&seed.monitor_type, &seed.push_token) {
                (MonitorType::Push, None) => {
                    let token = uuid::Uuid::new_v4().to_string();
                    info!(monitor = %seed.name, token = %token, "generated push token");
                    Some(token)
                }
                (_, token) => token.clone(),
            };
            let headers = match &seed.headers {
                Some(table) => Some(serde_json::to_string(table).map_err(|e| {
                    ConfigError::Invalid(format!("headers for monitor '{}': {e}", seed.name))
                })?),
                None => None,
            };
            let id = store.insert_monitor(Monitor {
                id: 0,
                name: seed.name.clone(),
                monitor_type: seed.monitor_type,
                target: seed.target.clone(),
                push_token,
                interval_seconds: seed.interval_seconds,
                timeout_seconds: seed.timeout_seconds,
                method: seed.method.clone(),
                body: seed.body.clone(),
                headers,
                expected_status: seed.expected_status.clone(),
                keyword: seed.keyword.clone(),
                json_path: seed.json_path.clone(),
                json_value: seed.json_value.clone(),
                enabled: seed.enabled,
                last_status: MonitorStatus::Unknown,
                last_checked_at: None,
                certificate_expiry: None,
                created_at: now,
                updated_at: now,
            });
            monitor_ids.insert(seed.name.as_str(), id);
        }

        for seed in &self.channels {
            let config = serde_json::to_string(&seed.config).map_err(|e| {
                ConfigError::Invalid(format!("config for channel '{}': {e}", seed.name))
            })?;
            let id = store.insert_channel(NotificationChannel {
                id: 0,
                name: seed.name.clone(),
                channel_type: seed.channel_type.clone(),
                config,
                enabled: seed.enabled,
            });
            channel_ids.insert(seed.name.as_str(), id);
        }

        for seed in &self.subscriptions {
            let monitor_id = monitor_ids.get(seed.monitor.as_str()).ok_or_else(|| {
                ConfigError::Invalid(format!("subscription refers to unknown monitor '{}'", seed.monitor))
            })?;
            let channel_id = channel_ids.get(seed.channel.as_str()).ok_or_else(|| {
                ConfigError::Invalid(format!("subscription refers to unknown channel '{}'", seed.channel))
            })?;
            store.subscribe(*monitor_id, *channel_id);
        }

        info!(
            monitors = self.monitors.len(),
            channels = self.channels.len(),
            subscriptions = self.subscriptions.len(),
            "seeded store from config"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
listen_addr = "127.0.0.1:9000"
max_concurrent_checks = 8

[[monitors]]
name = "homepage"
type = "http"
target = "https://example.com"
expected_status = "2xx"

[[monitors]]
name = "agent"
type = "push"
push_token = "tok-agent"
interval_seconds = 30

[[channels]]
name = "ops"
type = "webhook"
[channels.config]
url = "https://hooks.example.com/x"

[[subscriptions]]
monitor = "homepage"
channel = "ops"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_full_config() {
        let file = write_config(SAMPLE);
        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.max_concurrent_checks, 8);
        assert_eq!(config.monitors.len(), 2);
        assert_eq!(config.monitors[0].monitor_type, MonitorType::Http);
        assert_eq!(config.monitors[1].push_token.as_deref(), Some("tok-agent"));
        assert_eq!(config.channels[0].channel_type, "webhook");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = ServerConfig::load(Path::new("/nonexistent/pulsewatch.toml")).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8090");
        assert_eq!(config.max_concurrent_checks, 64);
        assert!(config.monitors.is_empty());
    }

    #[tokio::test]
    async fn seeding_wires_monitors_channels_and_subscriptions() {
        use crate::repository::{MonitorRepository, SubscriptionRepository};

        let file = write_config(SAMPLE);
        let config = ServerConfig::load(file.path()).unwrap();
        let store = MemoryStore::new();
        config.seed_store(&store).unwrap();

        let monitors = store.list_enabled().await.unwrap();
        assert_eq!(monitors.len(), 2);
        let homepage = monitors.iter().find(|m| m.name == "homepage").unwrap();
        assert_eq!(homepage.expected_status.as_deref(), Some("2xx"));

        let channels = store.channels_for_monitor(homepage.id).await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].channel_type, "webhook");
        let parsed: serde_json::Value = serde_json::from_str(&channels[0].config).unwrap();
        assert_eq!(parsed["url"], "https://hooks.example.com/x");
    }

    #[tokio::test]
    async fn push_monitor_without_token_gets_one_generated() {
        use crate::repository::MonitorRepository;

        let file = write_config(
            r#"
[[monitors]]
name = "cron-job"
type = "push"
"#,
        );
        let config = ServerConfig::load(file.path()).unwrap();
        let store = MemoryStore::new();
        config.seed_store(&store).unwrap();

        let monitors = store.list_enabled().await.unwrap();
        let token = monitors[0].push_token.clone().unwrap();
        assert!(store.get_by_push_token(&token).await.unwrap().is_some());
    }

    #[test]
    fn subscription_with_unknown_channel_is_rejected() {
        let file = write_config(
            r#"
[[monitors]]
name = "m"
type = "tcp"
target = "a:1"

[[subscriptions]]
monitor = "m"
channel = "missing"
"#,
        );
        let config = ServerConfig::load(file.path()).unwrap();
        let store = MemoryStore::new();
        let err = config.seed_store(&store).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
