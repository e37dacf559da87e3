use crate::error::{AlertError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Water level below this many centimetres is always critical. Not tunable
/// per greenhouse.
pub const WATER_LEVEL_FLOOR_CM: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBounds {
    #[serde(default = "default_temperature_low")]
    pub low: f64,
    #[serde(default = "default_temperature_high")]
    pub high: f64,
    /// Distance beyond either bound at which severity escalates to critical.
    #[serde(default = "default_temperature_critical_delta")]
    pub critical_delta: f64,
}

impl Default for TemperatureBounds {
    fn default() -> Self {
        Self {
            low: default_temperature_low(),
            high: default_temperature_high(),
            critical_delta: default_temperature_critical_delta(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumidityBounds {
    #[serde(default = "default_humidity_low")]
    pub low: f64,
    #[serde(default = "default_humidity_high")]
    pub high: f64,
}

impl Default for HumidityBounds {
    fn default() -> Self {
        Self {
            low: default_humidity_low(),
            high: default_humidity_high(),
        }
    }
}

/// One greenhouse's tunable bounds. Every field has a default, so a partial
/// TOML table only overrides what it names.
///
/// # Examples
///
/// ```
/// use greenmon_alert::config::ThresholdConfig;
///
/// let cfg = ThresholdConfig::default();
/// assert_eq!(cfg.temperature.high, 35.0);
/// assert_eq!(cfg.soil_moisture_low, 300.0);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub temperature: TemperatureBounds,
    #[serde(default)]
    pub humidity: HumidityBounds,
    /// Raw ADC units.
    #[serde(default = "default_soil_moisture_low")]
    pub soil_moisture_low: f64,
    /// Lux-equivalent.
    #[serde(default = "default_light_low")]
    pub light_low: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temperature: TemperatureBounds::default(),
            humidity: HumidityBounds::default(),
            soil_moisture_low: default_soil_moisture_low(),
            light_low: default_light_low(),
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<()> {
        let t = &self.temperature;
        let all_finite = [
            t.low,
            t.high,
            t.critical_delta,
            self.humidity.low,
            self.humidity.high,
            self.soil_moisture_low,
            self.light_low,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !all_finite {
            return Err(AlertError::InvalidThresholds(
                "threshold values must be finite numbers".to_string(),
            ));
        }
        if t.high <= t.low {
            return Err(AlertError::InvalidThresholds(format!(
                "temperature high ({}) must be greater than low ({})",
                t.high, t.low
            )));
        }
        if t.critical_delta < 0.0 {
            return Err(AlertError::InvalidThresholds(format!(
                "temperature critical_delta ({}) must not be negative",
                t.critical_delta
            )));
        }
        if self.humidity.high <= self.humidity.low {
            return Err(AlertError::InvalidThresholds(format!(
                "humidity high ({}) must be greater than low ({})",
                self.humidity.high, self.humidity.low
            )));
        }
        Ok(())
    }
}

fn default_temperature_low() -> f64 {
    15.0
}

fn default_temperature_high() -> f64 {
    35.0
}

fn default_temperature_critical_delta() -> f64 {
    5.0
}

fn default_humidity_low() -> f64 {
    40.0
}

fn default_humidity_high() -> f64 {
    80.0
}

fn default_soil_moisture_low() -> f64 {
    300.0
}

fn default_light_low() -> f64 {
    200.0
}

/// Resolves a greenhouse's thresholds. `None` means "nothing stored"; the
/// caller falls back to [`ThresholdConfig::default`].
pub trait ThresholdSource: Send + Sync {
    fn thresholds_for(&self, greenhouse_id: &str) -> Option<ThresholdConfig>;
}

/// In-memory threshold cache, refreshed by the settings owner.
#[derive(Default)]
pub struct ThresholdTable {
    default: Option<ThresholdConfig>,
    entries: RwLock<HashMap<String, ThresholdConfig>>,
}

impl ThresholdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config` for greenhouses without their own entry.
    pub fn with_default(config: ThresholdConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            default: Some(config),
            entries: RwLock::new(HashMap::new()),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ThresholdConfig>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ThresholdConfig>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn upsert(&self, greenhouse_id: &str, config: ThresholdConfig) -> Result<()> {
        config.validate()?;
        self.write().insert(greenhouse_id.to_string(), config);
        Ok(())
    }

    /// Replaces all per-greenhouse entries. Nothing changes if any entry is
    /// invalid.
    pub fn replace_all(&self, entries: HashMap<String, ThresholdConfig>) -> Result<()> {
        for (greenhouse_id, config) in &entries {
            config.validate().map_err(|e| {
                AlertError::InvalidThresholds(format!("greenhouse {greenhouse_id}: {e}"))
            })?;
        }
        *self.write() = entries;
        Ok(())
    }
}

impl ThresholdSource for ThresholdTable {
    fn thresholds_for(&self, greenhouse_id: &str) -> Option<ThresholdConfig> {
        self.read()
            .get(greenhouse_id)
            .cloned()
            .or_else(|| self.default.clone())
    }
}
