//! Time-series storage for sensor samples and greenhouse alerts.
//!
//! The default implementation ([`engine::SqliteStorageEngine`]) uses daily
//! time-partitioned SQLite databases with WAL mode. Sensor samples are
//! partitioned by capture time and alerts by creation time.

pub mod engine;
pub mod error;
pub mod partition;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error::Result;
use greenmon_common::types::{Alert, DedupKey, SensorKind, SensorReading};

/// Parameters for a time-range sample query within one greenhouse.
///
/// # Examples
///
/// ```
/// use greenmon_storage::SampleQuery;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let query = SampleQuery {
///     greenhouse_id: "greenhouse-001".into(),
///     device_id: None,
///     kind: None,
///     from: now - Duration::hours(1),
///     to: now,
///     limit: Some(50),
/// };
/// assert!(query.device_id.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct SampleQuery {
    pub greenhouse_id: String,
    pub device_id: Option<String>,
    pub kind: Option<SensorKind>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Keep only the newest `limit` samples.
    pub limit: Option<usize>,
}

/// One stored sensor value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub greenhouse_id: String,
    pub device_id: String,
    pub kind: SensorKind,
    pub value: f64,
}

/// Append-only persistence for incoming readings.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Stores every finite value of the reading. Returns the number of
    /// samples written.
    async fn write_reading(&self, reading: &SensorReading) -> Result<usize>;

    /// Returns samples matching the query, oldest first.
    async fn query_samples(&self, query: &SampleQuery) -> Result<Vec<StoredSample>>;
}

/// Persistence backend for alerts.
///
/// The alert engine is the only writer of new rows. Implementations must be
/// shareable across tasks because readings from many devices are evaluated
/// concurrently.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Returns the most recent unresolved alert for `key` created at or after
    /// `since`, if any.
    async fn find_active(&self, key: &DedupKey, since: DateTime<Utc>) -> Result<Option<Alert>>;

    /// Persists a new alert and returns the stored record.
    async fn insert(&self, alert: &Alert) -> Result<Alert>;

    /// Marks an alert resolved. Returns true if an active alert was found.
    async fn resolve(&self, alert_id: &str) -> Result<bool>;
}
