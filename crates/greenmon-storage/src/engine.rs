use crate::error::{Result, StorageError};
use crate::partition::PartitionManager;
use crate::{AlertStore, ReadingStore, SampleQuery, StoredSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenmon_common::types::{Alert, DedupKey, SensorReading};
use std::path::Path;
use std::sync::Arc;

const ALERT_COLUMNS: &str = "id, greenhouse_id, device_id, condition, severity, sensor_kind, \
     message, value, threshold, detected_at, resolved, created_at";

/// Raw alert row, decoded outside the rusqlite row callback so enum parse
/// failures surface as [`StorageError::InvalidColumn`].
struct AlertRow {
    id: String,
    greenhouse_id: String,
    device_id: String,
    condition: String,
    severity: String,
    sensor_kind: String,
    message: String,
    value: f64,
    threshold: f64,
    detected_at_ms: i64,
    resolved: bool,
    created_at_ms: i64,
}

impl AlertRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            greenhouse_id: row.get(1)?,
            device_id: row.get(2)?,
            condition: row.get(3)?,
            severity: row.get(4)?,
            sensor_kind: row.get(5)?,
            message: row.get(6)?,
            value: row.get(7)?,
            threshold: row.get(8)?,
            detected_at_ms: row.get(9)?,
            resolved: row.get::<_, i64>(10)? != 0,
            created_at_ms: row.get(11)?,
        })
    }

    fn into_alert(self) -> Result<Alert> {
        Ok(Alert {
            condition: parse_column("condition", &self.condition)?,
            severity: parse_column("severity", &self.severity)?,
            sensor_kind: parse_column("sensor_kind", &self.sensor_kind)?,
            id: self.id,
            greenhouse_id: self.greenhouse_id,
            device_id: self.device_id,
            message: self.message,
            value: self.value,
            threshold: self.threshold,
            detected_at: from_millis(self.detected_at_ms),
            resolved: self.resolved,
            created_at: from_millis(self.created_at_ms),
        })
    }
}

fn parse_column<T: std::str::FromStr>(column: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| StorageError::InvalidColumn {
        column,
        value: value.to_string(),
    })
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Rusqlite calls block, so every trait method hands its work to the
/// blocking pool. A caller-side timeout can then fire while SQLite waits on
/// a locked file.
pub struct SqliteStorageEngine {
    partitions: Arc<PartitionManager>,
}

impl SqliteStorageEngine {
    pub fn new(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            partitions: Arc::new(PartitionManager::new(data_dir)?),
        })
    }

    /// Removes partitions older than `retention_days`. Returns the number of
    /// partitions removed.
    pub async fn cleanup(&self, retention_days: u32) -> Result<u32> {
        self.blocking(move |partitions| partitions.cleanup_older_than(retention_days))
            .await
    }

    async fn blocking<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PartitionManager) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let partitions = self.partitions.clone();
        tokio::task::spawn_blocking(move || f(&partitions)).await?
    }
}

fn find_active(
    partitions: &PartitionManager,
    key: &DedupKey,
    since: DateTime<Utc>,
) -> Result<Option<Alert>> {
    let since_ms = since.timestamp_millis();
    let condition = key.condition.to_string();
    let mut latest: Option<AlertRow> = None;

    for partition in partitions.partitions_since(since)? {
        let row = partitions.with_partition(&partition, |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts
                 WHERE greenhouse_id = ?1 AND condition = ?2 AND device_id = ?3
                   AND resolved = 0 AND created_at >= ?4
                 ORDER BY created_at DESC LIMIT 1"
            ))?;
            let mut rows = stmt.query_map(
                rusqlite::params![&key.greenhouse_id, &condition, &key.device_id, since_ms],
                AlertRow::from_row,
            )?;
            let row = rows.next().transpose()?;
            Ok(row)
        })?;

        if let Some(row) = row {
            if latest
                .as_ref()
                .map_or(true, |l| row.created_at_ms > l.created_at_ms)
            {
                latest = Some(row);
            }
        }
    }

    latest.map(AlertRow::into_alert).transpose()
}

fn insert_alert(partitions: &PartitionManager, alert: &Alert) -> Result<()> {
    let key = partitions.get_or_create(alert.created_at)?;
    partitions.with_partition(&key, |conn| {
        conn.execute(
            &format!(
                "INSERT INTO alerts ({ALERT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            rusqlite::params![
                &alert.id,
                &alert.greenhouse_id,
                &alert.device_id,
                alert.condition.to_string(),
                alert.severity.to_string(),
                alert.sensor_kind.to_string(),
                &alert.message,
                alert.value,
                alert.threshold,
                alert.detected_at.timestamp_millis(),
                alert.resolved as i64,
                alert.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    })
}

fn write_reading(partitions: &PartitionManager, reading: &SensorReading) -> Result<usize> {
    let key = partitions.get_or_create(reading.timestamp)?;
    partitions.with_partition(&key, |conn| {
        let tx = conn.unchecked_transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO samples (id, timestamp, greenhouse_id, device_id, sensor_kind, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (kind, value) in reading.samples() {
                stmt.execute(rusqlite::params![
                    greenmon_common::id::next_id(),
                    reading.timestamp.timestamp_millis(),
                    &reading.greenhouse_id,
                    &reading.device_id,
                    kind.as_str(),
                    value,
                ])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    })
}

fn query_samples(partitions: &PartitionManager, query: &SampleQuery) -> Result<Vec<StoredSample>> {
    let keys = partitions.partitions_in_range(query.from, query.to)?;
    let from_ms = query.from.timestamp_millis();
    let to_ms = query.to.timestamp_millis();
    let mut raw = Vec::new();

    for key in keys {
        partitions.with_partition(&key, |conn| {
            let mut sql = String::from(
                "SELECT id, timestamp, greenhouse_id, device_id, sensor_kind, value FROM samples
                 WHERE greenhouse_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3",
            );
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
                Box::new(query.greenhouse_id.clone()),
                Box::new(from_ms),
                Box::new(to_ms),
            ];
            if let Some(device_id) = &query.device_id {
                params.push(Box::new(device_id.clone()));
                sql.push_str(&format!(" AND device_id = ?{}", params.len()));
            }
            if let Some(kind) = query.kind {
                params.push(Box::new(kind.as_str()));
                sql.push_str(&format!(" AND sensor_kind = ?{}", params.len()));
            }

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt.query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            })?;
            for row in rows {
                raw.push(row?);
            }
            Ok(())
        })?;
    }

    let mut results = raw
        .into_iter()
        .map(|(id, ts_ms, greenhouse_id, device_id, kind, value)| {
            Ok(StoredSample {
                id,
                timestamp: from_millis(ts_ms),
                greenhouse_id,
                device_id,
                kind: parse_column("sensor_kind", &kind)?,
                value,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    results.sort_by_key(|s| s.timestamp);
    if let Some(limit) = query.limit {
        let skip = results.len().saturating_sub(limit);
        results.drain(..skip);
    }
    Ok(results)
}

#[async_trait]
impl ReadingStore for SqliteStorageEngine {
    async fn write_reading(&self, reading: &SensorReading) -> Result<usize> {
        let reading = reading.clone();
        self.blocking(move |partitions| write_reading(partitions, &reading))
            .await
    }

    async fn query_samples(&self, query: &SampleQuery) -> Result<Vec<StoredSample>> {
        let query = query.clone();
        self.blocking(move |partitions| query_samples(partitions, &query))
            .await
    }
}

#[async_trait]
impl AlertStore for SqliteStorageEngine {
    async fn find_active(&self, key: &DedupKey, since: DateTime<Utc>) -> Result<Option<Alert>> {
        let key = key.clone();
        self.blocking(move |partitions| find_active(partitions, &key, since))
            .await
    }

    async fn insert(&self, alert: &Alert) -> Result<Alert> {
        let alert = alert.clone();
        self.blocking(move |partitions| {
            insert_alert(partitions, &alert)?;
            Ok(alert)
        })
        .await
    }

    async fn resolve(&self, alert_id: &str) -> Result<bool> {
        let alert_id = alert_id.to_string();
        self.blocking(move |partitions| partitions.mark_alert_resolved(&alert_id))
            .await
    }
}
