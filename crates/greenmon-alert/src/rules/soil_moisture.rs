use super::threshold::{Breach, CompareOp};
use super::SensorRule;
use crate::config::ThresholdConfig;
use greenmon_common::types::{
    CandidateDetection, ConditionType, SensorKind, SensorReading, Severity,
};

/// Dry soil only; over-saturation is not modelled. Below half the bound is
/// critical.
pub struct SoilMoistureRule;

impl SensorRule for SoilMoistureRule {
    fn kind(&self) -> SensorKind {
        SensorKind::SoilMoisture
    }

    fn evaluate(
        &self,
        reading: &SensorReading,
        value: f64,
        config: &ThresholdConfig,
    ) -> Option<CandidateDetection> {
        let low = config.soil_moisture_low;
        Breach::check(
            ConditionType::SoilMoistureLow,
            CompareOp::LessThan,
            value,
            low,
            || {
                if value < low / 2.0 {
                    Severity::Critical
                } else {
                    Severity::High
                }
            },
        )
        .map(|breach| breach.into_detection(reading, SensorKind::SoilMoisture, value))
    }
}
