use crate::config::{ThresholdConfig, ThresholdSource};
use crate::engine::{AlertEngine, ProcessOutcome};
use crate::rules::RuleSet;
use chrono::{DateTime, Utc};
use greenmon_common::types::{CandidateDetection, SensorReading};
use std::sync::Arc;

/// Evaluate-then-dedupe pipeline for incoming readings.
pub struct AlertService {
    thresholds: Arc<dyn ThresholdSource>,
    rules: RuleSet,
    engine: AlertEngine,
}

impl AlertService {
    pub fn new(thresholds: Arc<dyn ThresholdSource>, rules: RuleSet, engine: AlertEngine) -> Self {
        Self {
            thresholds,
            rules,
            engine,
        }
    }

    pub fn engine(&self) -> &AlertEngine {
        &self.engine
    }

    fn config_for(&self, greenhouse_id: &str) -> ThresholdConfig {
        self.thresholds.thresholds_for(greenhouse_id).unwrap_or_else(|| {
            tracing::debug!(greenhouse_id, "No thresholds stored, using defaults");
            ThresholdConfig::default()
        })
    }

    /// Pure evaluation step. No store access.
    pub fn evaluate(&self, reading: &SensorReading) -> Vec<CandidateDetection> {
        let config = self.config_for(&reading.greenhouse_id);
        self.rules.evaluate(reading, &config)
    }

    pub async fn on_reading(&self, reading: &SensorReading) -> ProcessOutcome {
        self.on_reading_at(reading, Utc::now()).await
    }

    /// Like [`Self::on_reading`] with an explicit admission time, which
    /// anchors the cooldown window and becomes `created_at` on new alerts.
    pub async fn on_reading_at(&self, reading: &SensorReading, now: DateTime<Utc>) -> ProcessOutcome {
        let detections = self.evaluate(reading);
        if detections.is_empty() {
            return ProcessOutcome::default();
        }
        tracing::debug!(
            greenhouse_id = %reading.greenhouse_id,
            device_id = %reading.device_id,
            candidates = detections.len(),
            "Threshold violations detected"
        );
        self.engine.process(detections, now).await
    }
}
