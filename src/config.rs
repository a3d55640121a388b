use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::monitor::{AccuracyPreference, FilterSettings, MonitorSettings};
use crate::transfer::ExportCalendar;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{field} must be a non-negative distance in meters, got {value}")]
    InvalidDistance { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub filter: FilterSettings,
    pub storage: StorageConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON-lines journal holding every track point.
    pub path: PathBuf,
    /// Folder holding `export/` and `import/`.
    pub data_root: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub calendar: ExportCalendar,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_authorized")]
    pub authorized: bool,
    #[serde(default = "default_history")]
    pub history: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            authorized: default_authorized(),
            history: default_history(),
        }
    }
}

fn default_authorized() -> bool {
    true
}

fn default_history() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Deliver sensor events.
    Ingest,
    /// Read points, bounds, status and notifications.
    Query,
    /// Run export and import.
    Transfer,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// The sensor refuses negative distance filters, which would leave the
    /// monitor unable to switch modes.
    fn validate(&self) -> Result<(), ConfigError> {
        if let AccuracyPreference::Meters(m) = self.monitor.accuracy {
            check_distance("monitor.accuracy", m)?;
        }
        check_distance(
            "monitor.significant_change_distance_m",
            self.monitor.significant_change_distance_m,
        )
    }

    pub fn find_api_key(&self, key: &str) -> Option<&ApiKey> {
        self.api_keys.iter().find(|k| k.key == key)
    }
}

fn check_distance(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDistance { field, value })
    }
}

/// Reads a humantime duration such as `10s` or `1m 30s`.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_yaml(
            r#"
storage:
  path: /var/lib/locus/track.jsonl
  data_root: /var/lib/locus
"#,
        )
        .unwrap();

        assert_eq!(config.monitor.accuracy, AccuracyPreference::Meters(0.0));
        assert_eq!(config.monitor.stationary_dwell, Duration::from_secs(60));
        assert_eq!(config.filter.min_interval, Duration::from_secs(10));
        assert_eq!(config.export.calendar, ExportCalendar::Local);
        assert!(config.notifications.authorized);
        assert_eq!(config.web.bind, "0.0.0.0:8080");
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn full_config() {
        let config = Config::from_yaml(
            r#"
monitor:
  accuracy: best
  stationary_dwell: 2m
  significant_change_distance_m: 800
filter:
  min_interval: 15s
storage:
  path: track.jsonl
  data_root: data
export:
  calendar: utc
notifications:
  authorized: false
web:
  bind: 127.0.0.1:9000
api_keys:
  - key: secret
    name: phone
    permissions: [ingest, query]
"#,
        )
        .unwrap();

        assert_eq!(config.monitor.accuracy, AccuracyPreference::Best);
        assert_eq!(config.monitor.stationary_dwell, Duration::from_secs(120));
        assert_eq!(config.monitor.stationary_speed, 1.0);
        assert_eq!(config.monitor.significant_change_distance_m, 800.0);
        assert_eq!(config.filter.min_interval, Duration::from_secs(15));
        assert_eq!(config.export.calendar, ExportCalendar::Utc);
        assert!(!config.notifications.authorized);

        let key = config.find_api_key("secret").unwrap();
        assert_eq!(key.name, "phone");
        assert!(key.permissions.contains(&Permission::Ingest));
        assert!(!key.permissions.contains(&Permission::Transfer));
        assert!(config.find_api_key("other").is_none());
    }

    #[test]
    fn bad_duration_is_an_error() {
        let err = Config::from_yaml(
            "filter:\n  min_interval: soon\nstorage:\n  path: a\n  data_root: b\n",
        );
        assert!(matches!(err, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn negative_distances_are_rejected() {
        let storage = "storage:\n  path: a\n  data_root: b\n";

        let err = Config::from_yaml(&format!("monitor:\n  accuracy: -5\n{storage}"));
        assert!(matches!(
            err,
            Err(ConfigError::InvalidDistance { field: "monitor.accuracy", .. })
        ));

        let err = Config::from_yaml(&format!(
            "monitor:\n  significant_change_distance_m: -1\n{storage}"
        ));
        assert!(matches!(
            err,
            Err(ConfigError::InvalidDistance {
                field: "monitor.significant_change_distance_m",
                ..
            })
        ));

        let err = Config::from_yaml(&format!("monitor:\n  accuracy: .nan\n{storage}"));
        assert!(matches!(err, Err(ConfigError::InvalidDistance { .. })));

        assert!(Config::from_yaml(&format!("monitor:\n  accuracy: 0\n{storage}")).is_ok());
    }
}
