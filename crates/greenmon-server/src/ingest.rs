use crate::state::AppState;
use greenmon_common::types::{Alert, SensorReading};
use greenmon_notify::LiveEvent;
use greenmon_storage::ReadingStore;
use serde::Serialize;

/// What one ingested reading produced.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub device_id: String,
    pub samples_stored: usize,
    pub alerts: Vec<Alert>,
    pub suppressed: usize,
    pub failed: usize,
}

/// Persists the reading, evaluates it and queues live delivery.
///
/// A storage failure on the raw reading is logged and does not block alert
/// evaluation. Events go through the room's dispatch queue, so a greenhouse
/// sees the sensor update and then its alerts, in ingestion order, without
/// the caller waiting on subscribers.
pub async fn ingest_reading(state: &AppState, reading: SensorReading) -> IngestSummary {
    let samples_stored = match state.storage.write_reading(&reading).await {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(
                greenhouse_id = %reading.greenhouse_id,
                device_id = %reading.device_id,
                error = %e,
                "Failed to store sensor reading"
            );
            0
        }
    };

    let outcome = state.alerts.on_reading(&reading).await;

    let greenhouse_id = reading.greenhouse_id.clone();
    let device_id = reading.device_id.clone();
    let mut events = Vec::with_capacity(1 + outcome.admitted.len());
    events.push(LiveEvent::SensorUpdate(reading));
    events.extend(outcome.admitted.iter().cloned().map(LiveEvent::NewAlert));
    state.dispatcher.dispatch(&greenhouse_id, events);

    tracing::debug!(
        greenhouse_id = %greenhouse_id,
        device_id = %device_id,
        samples_stored,
        admitted = outcome.admitted.len(),
        suppressed = outcome.suppressed,
        "Reading ingested"
    );

    IngestSummary {
        device_id,
        samples_stored,
        alerts: outcome.admitted,
        suppressed: outcome.suppressed,
        failed: outcome.failures.len(),
    }
}
