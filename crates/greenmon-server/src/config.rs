use greenmon_alert::config::{ThresholdConfig, ThresholdTable};
use greenmon_alert::engine::{EngineOptions, LookupFailurePolicy};
use greenmon_common::types::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Empty means any origin (development mode).
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub alert: AlertConfig,
    /// Defaults for greenhouses without their own table.
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub greenhouses: HashMap<String, GreenhouseConfig>,
    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default)]
    pub lookup_failure_policy: LookupFailurePolicy,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            lookup_failure_policy: LookupFailurePolicy::default(),
        }
    }
}

impl AlertConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            store_timeout: Duration::from_millis(self.store_timeout_ms),
            lookup_failure_policy: self.lookup_failure_policy,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GreenhouseConfig {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Buffered events per greenhouse room before slow subscribers lag.
    #[serde(default = "default_room_capacity")]
    pub room_capacity: usize,
    /// Events waiting per greenhouse before new ones are dropped.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            room_capacity: default_room_capacity(),
            queue_depth: default_queue_depth(),
            webhooks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_webhook_min_severity")]
    pub min_severity: Severity,
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_retention_days() -> u32 {
    7
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_room_capacity() -> usize {
    greenmon_notify::channels::broadcast::DEFAULT_ROOM_CAPACITY
}

fn default_queue_depth() -> usize {
    greenmon_notify::dispatch::DEFAULT_QUEUE_DEPTH
}

fn default_webhook_min_severity() -> Severity {
    Severity::High
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            data_dir: default_data_dir(),
            retention_days: default_retention_days(),
            cors_allowed_origins: Vec::new(),
            alert: AlertConfig::default(),
            thresholds: ThresholdConfig::default(),
            greenhouses: HashMap::new(),
            notification: NotificationConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config '{path}': {e}"))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.alert.store_timeout_ms == 0 {
            anyhow::bail!("alert.store_timeout_ms must be greater than 0");
        }
        if self.retention_days == 0 {
            anyhow::bail!("retention_days must be greater than 0");
        }
        self.thresholds.validate()?;
        for (greenhouse_id, gh) in &self.greenhouses {
            gh.thresholds
                .validate()
                .map_err(|e| anyhow::anyhow!("greenhouses.{greenhouse_id}: {e}"))?;
        }
        Ok(())
    }

    /// Builds the threshold cache: `[thresholds]` as the default plus one
    /// entry per `[greenhouses.<id>]` table.
    pub fn threshold_table(&self) -> anyhow::Result<ThresholdTable> {
        let table = ThresholdTable::with_default(self.thresholds.clone())?;
        table.replace_all(
            self.greenhouses
                .iter()
                .map(|(id, gh)| (id.clone(), gh.thresholds.clone()))
                .collect(),
        )?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenmon_alert::config::ThresholdSource;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.alert.store_timeout_ms, 5000);
        assert_eq!(
            config.alert.lookup_failure_policy,
            LookupFailurePolicy::FailCandidate
        );
        assert_eq!(config.thresholds, ThresholdConfig::default());
        assert_eq!(config.notification.room_capacity, 256);
        assert_eq!(config.notification.queue_depth, 1024);
    }

    #[test]
    fn partial_tables_override_only_named_fields() {
        let config = ServerConfig::parse(
            r#"
            http_port = 9000

            [alert]
            lookup_failure_policy = "assume_absent"

            [thresholds.temperature]
            high = 32.0

            [greenhouses.north.thresholds]
            soil_moisture_low = 420.0

            [[notification.webhooks]]
            url = "http://localhost:9999/hook"
            min_severity = "CRITICAL"
            "#,
        )
        .unwrap();

        assert_eq!(config.http_port, 9000);
        assert_eq!(
            config.alert.lookup_failure_policy,
            LookupFailurePolicy::AssumeAbsent
        );
        assert_eq!(config.thresholds.temperature.high, 32.0);
        assert_eq!(config.thresholds.temperature.low, 15.0);
        assert_eq!(config.notification.webhooks[0].min_severity, Severity::Critical);

        let table = config.threshold_table().unwrap();
        let north = table.thresholds_for("north").unwrap();
        assert_eq!(north.soil_moisture_low, 420.0);
        // Per-greenhouse tables start from built-in defaults, not [thresholds].
        assert_eq!(north.temperature.high, 35.0);
        let other = table.thresholds_for("south").unwrap();
        assert_eq!(other.temperature.high, 32.0);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = ServerConfig::parse(
            r#"
            [greenhouses.north.thresholds.humidity]
            low = 90.0
            high = 50.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("greenhouses.north"));
    }
}
