use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The physical quantity a sensor value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
    SoilMoisture,
    Light,
    WaterLevel,
}

impl SensorKind {
    pub const ALL: [SensorKind; 5] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::SoilMoisture,
        SensorKind::Light,
        SensorKind::WaterLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::SoilMoisture => "soil_moisture",
            SensorKind::Light => "light",
            SensorKind::WaterLevel => "water_level",
        }
    }

    /// Display unit used in alert messages and live updates.
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Humidity => "%",
            SensorKind::SoilMoisture => "raw",
            SensorKind::Light => "lux",
            SensorKind::WaterLevel => "cm",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown sensor kind: {s}"))
    }
}

/// Per-kind values carried by one device payload. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_moisture: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_level: Option<f64>,
}

impl SensorValues {
    pub fn get(&self, kind: SensorKind) -> Option<f64> {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::SoilMoisture => self.soil_moisture,
            SensorKind::Light => self.light_intensity,
            SensorKind::WaterLevel => self.water_level,
        }
    }
}

/// One timestamped observation from one device, possibly covering several
/// sensor kinds (e.g. a combined temperature and humidity payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub greenhouse_id: String,
    pub device_id: String,
    pub values: SensorValues,
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    /// Returns the finite `(kind, value)` pairs of this reading.
    ///
    /// Missing, NaN and infinite values are skipped, so downstream rules
    /// never see them.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use greenmon_common::types::{SensorKind, SensorReading, SensorValues};
    ///
    /// let reading = SensorReading {
    ///     greenhouse_id: "gh-1".into(),
    ///     device_id: "esp32-01".into(),
    ///     values: SensorValues {
    ///         temperature: Some(f64::NAN),
    ///         soil_moisture: Some(50.0),
    ///         ..Default::default()
    ///     },
    ///     timestamp: Utc::now(),
    /// };
    /// let samples: Vec<_> = reading.samples().collect();
    /// assert_eq!(samples, vec![(SensorKind::SoilMoisture, 50.0)]);
    /// ```
    pub fn samples(&self) -> impl Iterator<Item = (SensorKind, f64)> + '_ {
        SensorKind::ALL.into_iter().filter_map(move |kind| {
            self.values
                .get(kind)
                .filter(|v| v.is_finite())
                .map(|v| (kind, v))
        })
    }
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use greenmon_common::types::Severity;
///
/// let sev: Severity = "medium".parse().unwrap();
/// assert_eq!(sev, Severity::Medium);
/// assert_eq!(sev.to_string(), "MEDIUM");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// The kind of threshold violation a detection describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    TemperatureHigh,
    TemperatureLow,
    HumidityHigh,
    HumidityLow,
    SoilMoistureLow,
    LightLevelLow,
    WaterLevelLow,
}

impl ConditionType {
    pub const ALL: [ConditionType; 7] = [
        ConditionType::TemperatureHigh,
        ConditionType::TemperatureLow,
        ConditionType::HumidityHigh,
        ConditionType::HumidityLow,
        ConditionType::SoilMoistureLow,
        ConditionType::LightLevelLow,
        ConditionType::WaterLevelLow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::TemperatureHigh => "TEMPERATURE_HIGH",
            ConditionType::TemperatureLow => "TEMPERATURE_LOW",
            ConditionType::HumidityHigh => "HUMIDITY_HIGH",
            ConditionType::HumidityLow => "HUMIDITY_LOW",
            ConditionType::SoilMoistureLow => "SOIL_MOISTURE_LOW",
            ConditionType::LightLevelLow => "LIGHT_LEVEL_LOW",
            ConditionType::WaterLevelLow => "WATER_LEVEL_LOW",
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConditionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionType::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown condition type: {s}"))
    }
}

/// Identity of "the same ongoing problem": at most one unresolved alert per
/// key is admitted within the cooldown window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub greenhouse_id: String,
    pub condition: ConditionType,
    pub device_id: String,
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.greenhouse_id, self.condition, self.device_id)
    }
}

/// A possible alert produced by rule evaluation. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDetection {
    pub greenhouse_id: String,
    pub device_id: String,
    pub condition: ConditionType,
    pub severity: Severity,
    pub value: f64,
    /// The bound that was crossed.
    pub threshold: f64,
    pub sensor_kind: SensorKind,
    pub message: String,
    pub detected_at: DateTime<Utc>,
}

impl CandidateDetection {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            greenhouse_id: self.greenhouse_id.clone(),
            condition: self.condition,
            device_id: self.device_id.clone(),
        }
    }
}

/// A persisted, externally visible alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub greenhouse_id: String,
    pub device_id: String,
    pub condition: ConditionType,
    pub severity: Severity,
    pub value: f64,
    pub threshold: f64,
    pub sensor_kind: SensorKind,
    pub message: String,
    pub detected_at: DateTime<Utc>,
    /// Set by an operator or a resolution flow, never by the alert engine.
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Builds a new active alert from a detection that survived dedup.
    pub fn admit(detection: CandidateDetection, id: String, now: DateTime<Utc>) -> Self {
        Alert {
            id,
            greenhouse_id: detection.greenhouse_id,
            device_id: detection.device_id,
            condition: detection.condition,
            severity: detection.severity,
            value: detection.value,
            threshold: detection.threshold,
            sensor_kind: detection.sensor_kind,
            message: detection.message,
            detected_at: detection.detected_at,
            resolved: false,
            created_at: now,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            greenhouse_id: self.greenhouse_id.clone(),
            condition: self.condition,
            device_id: self.device_id.clone(),
        }
    }
}
