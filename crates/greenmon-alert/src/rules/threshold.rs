use greenmon_common::types::{
    CandidateDetection, ConditionType, SensorKind, SensorReading, Severity,
};

/// Comparison against a bound. Both directions are strict: a value equal
/// to the bound never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::GreaterThan => "too high",
            Self::LessThan => "too low",
        }
    }
}

/// A bound crossing found by one sensor rule.
#[derive(Debug, Clone, Copy)]
pub struct Breach {
    pub condition: ConditionType,
    pub severity: Severity,
    pub operator: CompareOp,
    pub threshold: f64,
}

impl Breach {
    /// Returns a breach if `value` crosses `threshold` in the `operator`
    /// direction.
    pub fn check(
        condition: ConditionType,
        operator: CompareOp,
        value: f64,
        threshold: f64,
        severity: impl FnOnce() -> Severity,
    ) -> Option<Self> {
        operator.check(value, threshold).then(|| Breach {
            condition,
            severity: severity(),
            operator,
            threshold,
        })
    }

    pub fn into_detection(
        self,
        reading: &SensorReading,
        kind: SensorKind,
        value: f64,
    ) -> CandidateDetection {
        let unit = kind.unit();
        CandidateDetection {
            greenhouse_id: reading.greenhouse_id.clone(),
            device_id: reading.device_id.clone(),
            condition: self.condition,
            severity: self.severity,
            value,
            threshold: self.threshold,
            sensor_kind: kind,
            message: format!(
                "{} {}: {:.1}{} (threshold {:.1}{})",
                label(kind),
                self.operator.describe(),
                value,
                unit,
                self.threshold,
                unit,
            ),
            detected_at: reading.timestamp,
        }
    }
}

fn label(kind: SensorKind) -> &'static str {
    match kind {
        SensorKind::Temperature => "Temperature",
        SensorKind::Humidity => "Humidity",
        SensorKind::SoilMoisture => "Soil moisture",
        SensorKind::Light => "Light level",
        SensorKind::WaterLevel => "Water level",
    }
}
