use crate::error::{Result, StorageError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SAMPLES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS samples (
    id TEXT PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    greenhouse_id TEXT NOT NULL,
    device_id TEXT NOT NULL,
    sensor_kind TEXT NOT NULL,
    value REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_samples_greenhouse_time
    ON samples(greenhouse_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_samples_device_kind_time
    ON samples(device_id, sensor_kind, timestamp);
";

const ALERTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    greenhouse_id TEXT NOT NULL,
    device_id TEXT NOT NULL,
    condition TEXT NOT NULL,
    severity TEXT NOT NULL,
    sensor_kind TEXT NOT NULL,
    message TEXT NOT NULL,
    value REAL NOT NULL,
    threshold REAL NOT NULL,
    detected_at INTEGER NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_dedup
    ON alerts(greenhouse_id, condition, device_id, created_at);
CREATE INDEX IF NOT EXISTS idx_alerts_created ON alerts(created_at);
";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Daily SQLite partitions (`YYYY-MM-DD.db`) under one data directory.
pub struct PartitionManager {
    data_dir: PathBuf,
    connections: Mutex<HashMap<String, Connection>>,
}

impl PartitionManager {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            connections: Mutex::new(HashMap::new()),
        })
    }

    /// Lock the connections map, recovering from a poisoned Mutex if necessary.
    fn lock_connections(&self) -> MutexGuard<'_, HashMap<String, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn partition_key(ts: DateTime<Utc>) -> String {
        ts.format(DATE_FORMAT).to_string()
    }

    fn partition_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.db"))
    }

    fn open(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SAMPLES_SCHEMA)?;
        conn.execute_batch(ALERTS_SCHEMA)?;
        Ok(conn)
    }

    /// Makes sure an existing partition file is in the connection cache.
    fn ensure_loaded(
        conns: &mut HashMap<String, Connection>,
        key: &str,
        path: &Path,
    ) -> Result<()> {
        if !conns.contains_key(key) {
            let conn = Self::open(path)?;
            conns.insert(key.to_string(), conn);
        }
        Ok(())
    }

    pub fn get_or_create(&self, ts: DateTime<Utc>) -> Result<String> {
        let key = Self::partition_key(ts);
        let mut conns = self.lock_connections();
        if !conns.contains_key(&key) {
            let path = self.partition_path(&key);
            let conn = Self::open(&path)?;
            tracing::info!(partition = %key, "Created new partition");
            conns.insert(key.clone(), conn);
        }
        Ok(key)
    }

    pub fn with_partition<F, R>(&self, key: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conns = self.lock_connections();
        let conn = conns
            .get(key)
            .ok_or_else(|| StorageError::PartitionMissing(key.to_string()))?;
        f(conn)
    }

    /// Existing partitions whose date falls in `[from, to]`, oldest first.
    pub fn partitions_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let to_date = to.date_naive();
        let mut keys = Vec::new();
        let mut date = from.date_naive();
        while date <= to_date {
            let key = date.format(DATE_FORMAT).to_string();
            let path = self.partition_path(&key);
            if path.exists() {
                let mut conns = self.lock_connections();
                Self::ensure_loaded(&mut conns, &key, &path)?;
                keys.push(key);
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Ok(keys)
    }

    /// Existing partitions dated on or after `from`, oldest first.
    pub fn partitions_since(&self, from: DateTime<Utc>) -> Result<Vec<String>> {
        let from_date = from.date_naive();
        let mut found = self
            .partition_files()?
            .into_iter()
            .filter(|(date, _, _)| *date >= from_date)
            .collect::<Vec<_>>();
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut conns = self.lock_connections();
        let mut keys = Vec::with_capacity(found.len());
        for (_, key, path) in found {
            Self::ensure_loaded(&mut conns, &key, &path)?;
            keys.push(key);
        }
        Ok(keys)
    }

    /// Every `YYYY-MM-DD.db` file in the data directory.
    fn partition_files(&self) -> Result<Vec<(NaiveDate, String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(date_str) = name.strip_suffix(".db") {
                if let Ok(date) = NaiveDate::parse_from_str(date_str, DATE_FORMAT) {
                    files.push((date, date_str.to_string(), entry.path()));
                }
            }
        }
        Ok(files)
    }

    pub fn cleanup_older_than(&self, retention_days: u32) -> Result<u32> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
        let cutoff_date = cutoff.date_naive();
        let mut removed = 0u32;

        let expired: Vec<(String, PathBuf)> = self
            .partition_files()?
            .into_iter()
            .filter(|(date, _, _)| *date < cutoff_date)
            .map(|(_, key, path)| (key, path))
            .collect();

        // Best-effort: log failures and keep going.
        for (date_str, db_path) in &expired {
            // Dropping the Connection checkpoints the WAL before the files go.
            {
                let mut conns = self.lock_connections();
                conns.remove(date_str.as_str());
            }

            if let Err(e) = std::fs::remove_file(db_path) {
                tracing::error!(partition = %date_str, error = %e, "Failed to remove partition file");
                continue;
            }
            for suffix in ["db-wal", "db-shm"] {
                let aux = self.data_dir.join(format!("{date_str}.{suffix}"));
                if aux.exists() {
                    if let Err(e) = std::fs::remove_file(&aux) {
                        tracing::warn!(path = %aux.display(), error = %e, "Failed to remove auxiliary file");
                    }
                }
            }

            tracing::info!(partition = %date_str, "Removed expired partition");
            removed += 1;
        }

        Ok(removed)
    }

    /// Marks an alert resolved in whichever partition holds it.
    /// Returns true if the alert was found and was still active.
    pub fn mark_alert_resolved(&self, alert_id: &str) -> Result<bool> {
        const SQL: &str = "UPDATE alerts SET resolved = 1 WHERE id = ?1 AND resolved = 0";

        {
            let conns = self.lock_connections();
            for conn in conns.values() {
                if conn.execute(SQL, rusqlite::params![alert_id])? > 0 {
                    return Ok(true);
                }
            }
        }

        // Partitions written by an earlier process may not be loaded yet.
        for (_, key, path) in self.partition_files()? {
            let mut conns = self.lock_connections();
            if conns.contains_key(&key) {
                continue;
            }
            Self::ensure_loaded(&mut conns, &key, &path)?;
            if let Some(conn) = conns.get(&key) {
                if conn.execute(SQL, rusqlite::params![alert_id])? > 0 {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
