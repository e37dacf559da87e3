use super::threshold::{Breach, CompareOp};
use super::SensorRule;
use crate::config::ThresholdConfig;
use greenmon_common::types::{
    CandidateDetection, ConditionType, SensorKind, SensorReading, Severity,
};

/// High and low temperature. Severity is critical once the value is more
/// than `critical_delta` past the crossed bound.
pub struct TemperatureRule;

impl SensorRule for TemperatureRule {
    fn kind(&self) -> SensorKind {
        SensorKind::Temperature
    }

    fn evaluate(
        &self,
        reading: &SensorReading,
        value: f64,
        config: &ThresholdConfig,
    ) -> Option<CandidateDetection> {
        let bounds = &config.temperature;
        let delta = bounds.critical_delta;

        // high > low is validated on load, so at most one of these fires.
        let breach = Breach::check(
            ConditionType::TemperatureHigh,
            CompareOp::GreaterThan,
            value,
            bounds.high,
            || escalate(value > bounds.high + delta),
        )
        .or_else(|| {
            Breach::check(
                ConditionType::TemperatureLow,
                CompareOp::LessThan,
                value,
                bounds.low,
                || escalate(value < bounds.low - delta),
            )
        })?;

        Some(breach.into_detection(reading, SensorKind::Temperature, value))
    }
}

fn escalate(critical: bool) -> Severity {
    if critical {
        Severity::Critical
    } else {
        Severity::High
    }
}
