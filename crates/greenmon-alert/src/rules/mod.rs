pub mod humidity;
pub mod light;
pub mod soil_moisture;
pub mod temperature;
pub mod threshold;
pub mod water_level;

use crate::config::ThresholdConfig;
use greenmon_common::types::{CandidateDetection, SensorKind, SensorReading};

/// A pure threshold check for one sensor kind.
///
/// Implementations are registered in a [`RuleSet`] and called once per
/// finite value of their kind. They never perform I/O and never fail.
pub trait SensorRule: Send + Sync {
    /// The sensor kind whose values this rule inspects.
    fn kind(&self) -> SensorKind;

    /// Returns a detection if `value` violates the greenhouse's bounds.
    fn evaluate(
        &self,
        reading: &SensorReading,
        value: f64,
        config: &ThresholdConfig,
    ) -> Option<CandidateDetection>;
}

/// The registered sensor rules.
pub struct RuleSet {
    rules: Vec<Box<dyn SensorRule>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Box<dyn SensorRule>>) -> Self {
        Self { rules }
    }

    /// Evaluates every finite value in `reading`.
    ///
    /// Detections come out in sensor-kind order (temperature, humidity, soil
    /// moisture, light, water level), so callers see a stable sequence.
    pub fn evaluate(
        &self,
        reading: &SensorReading,
        config: &ThresholdConfig,
    ) -> Vec<CandidateDetection> {
        let mut detections = Vec::new();
        for (kind, value) in reading.samples() {
            for rule in self.rules.iter().filter(|r| r.kind() == kind) {
                if let Some(detection) = rule.evaluate(reading, value, config) {
                    detections.push(detection);
                }
            }
        }
        detections
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(vec![
            Box::new(temperature::TemperatureRule),
            Box::new(humidity::HumidityRule),
            Box::new(soil_moisture::SoilMoistureRule),
            Box::new(light::LightRule),
            Box::new(water_level::WaterLevelRule),
        ])
    }
}
