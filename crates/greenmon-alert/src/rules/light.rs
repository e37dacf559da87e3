use super::threshold::{Breach, CompareOp};
use super::SensorRule;
use crate::config::ThresholdConfig;
use greenmon_common::types::{
    CandidateDetection, ConditionType, SensorKind, SensorReading, Severity,
};

/// Low light is informational: severity is always [`Severity::Low`].
pub struct LightRule;

impl SensorRule for LightRule {
    fn kind(&self) -> SensorKind {
        SensorKind::Light
    }

    fn evaluate(
        &self,
        reading: &SensorReading,
        value: f64,
        config: &ThresholdConfig,
    ) -> Option<CandidateDetection> {
        Breach::check(
            ConditionType::LightLevelLow,
            CompareOp::LessThan,
            value,
            config.light_low,
            || Severity::Low,
        )
        .map(|breach| breach.into_detection(reading, SensorKind::Light, value))
    }
}
