use super::threshold::{Breach, CompareOp};
use super::SensorRule;
use crate::config::ThresholdConfig;
use greenmon_common::types::{
    CandidateDetection, ConditionType, SensorKind, SensorReading, Severity,
};

/// Humidity outside `[low, high]` is always medium severity.
pub struct HumidityRule;

impl SensorRule for HumidityRule {
    fn kind(&self) -> SensorKind {
        SensorKind::Humidity
    }

    fn evaluate(
        &self,
        reading: &SensorReading,
        value: f64,
        config: &ThresholdConfig,
    ) -> Option<CandidateDetection> {
        let bounds = &config.humidity;
        let breach = Breach::check(
            ConditionType::HumidityHigh,
            CompareOp::GreaterThan,
            value,
            bounds.high,
            || Severity::Medium,
        )
        .or_else(|| {
            Breach::check(
                ConditionType::HumidityLow,
                CompareOp::LessThan,
                value,
                bounds.low,
                || Severity::Medium,
            )
        })?;

        Some(breach.into_detection(reading, SensorKind::Humidity, value))
    }
}
