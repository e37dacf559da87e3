use super::threshold::{Breach, CompareOp};
use super::SensorRule;
use crate::config::{ThresholdConfig, WATER_LEVEL_FLOOR_CM};
use greenmon_common::types::{
    CandidateDetection, ConditionType, SensorKind, SensorReading, Severity,
};

/// Reservoir level against the fixed [`WATER_LEVEL_FLOOR_CM`]; ignores the
/// greenhouse config.
pub struct WaterLevelRule;

impl SensorRule for WaterLevelRule {
    fn kind(&self) -> SensorKind {
        SensorKind::WaterLevel
    }

    fn evaluate(
        &self,
        reading: &SensorReading,
        value: f64,
        _config: &ThresholdConfig,
    ) -> Option<CandidateDetection> {
        Breach::check(
            ConditionType::WaterLevelLow,
            CompareOp::LessThan,
            value,
            WATER_LEVEL_FLOOR_CM,
            || Severity::Critical,
        )
        .map(|breach| breach.into_detection(reading, SensorKind::WaterLevel, value))
    }
}
