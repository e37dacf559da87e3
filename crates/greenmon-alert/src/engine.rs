use crate::error::{AlertError, Result};
use crate::keylock::KeyLocks;
use chrono::{DateTime, Utc};
use greenmon_common::types::{Alert, CandidateDetection, DedupKey};
use greenmon_storage::AlertStore;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Repeat detections for a key are suppressed for this long after an alert
/// is raised.
pub const COOLDOWN_SECS: i64 = 600;

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// What to do when the dedup lookup itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailurePolicy {
    /// Drop the candidate and report it as failed. May under-alert while
    /// the store is down, but never duplicates.
    #[default]
    FailCandidate,
    /// Insert as if no active alert existed. Keeps alerting while the store
    /// is degraded, at the risk of a duplicate.
    AssumeAbsent,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound for each individual store call.
    pub store_timeout: Duration,
    pub lookup_failure_policy: LookupFailurePolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            lookup_failure_policy: LookupFailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Lookup,
    Insert,
}

/// A candidate that could not be raised this time.
#[derive(Debug)]
pub struct CandidateFailure {
    pub key: DedupKey,
    pub stage: FailureStage,
    pub error: AlertError,
}

/// Result of one engine pass over a batch of detections.
#[derive(Debug, Default)]
pub struct ProcessOutcome {
    /// Number of candidates considered.
    pub evaluated: usize,
    /// Newly persisted alerts, in candidate order.
    pub admitted: Vec<Alert>,
    /// Candidates dropped because their key already had an active alert.
    pub suppressed: usize,
    pub failures: Vec<CandidateFailure>,
}

enum Decision {
    Admitted(Alert),
    Suppressed,
    Failed(CandidateFailure),
}

/// Deduplicates candidate detections against the alert store and persists
/// the survivors.
///
/// The find-then-insert sequence for a [`DedupKey`] runs under a per-key
/// lock, so concurrent batches for the same key cannot both insert within
/// one cooldown window. Distinct keys proceed in parallel.
pub struct AlertEngine {
    store: Arc<dyn AlertStore>,
    options: EngineOptions,
    pub(crate) locks: KeyLocks,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn AlertStore>, options: EngineOptions) -> Self {
        Self {
            store,
            options,
            locks: KeyLocks::default(),
        }
    }

    /// Admits or suppresses each detection in order. A failure on one
    /// candidate never stops the rest of the batch.
    pub async fn process(
        &self,
        detections: Vec<CandidateDetection>,
        now: DateTime<Utc>,
    ) -> ProcessOutcome {
        let mut outcome = ProcessOutcome {
            evaluated: detections.len(),
            ..Default::default()
        };

        for detection in detections {
            match self.decide(detection, now).await {
                Decision::Admitted(alert) => outcome.admitted.push(alert),
                Decision::Suppressed => outcome.suppressed += 1,
                Decision::Failed(failure) => outcome.failures.push(failure),
            }
        }

        if let Some(first) = outcome.failures.first() {
            tracing::warn!(
                greenhouse_id = %first.key.greenhouse_id,
                admitted = outcome.admitted.len(),
                failed = outcome.failures.len(),
                "Some alerts could not be raised"
            );
        }

        outcome
    }

    async fn decide(&self, detection: CandidateDetection, now: DateTime<Utc>) -> Decision {
        let key = detection.dedup_key();
        let handle = self.locks.handle(&key);
        let _guard = handle.lock().await;
        let decision = self.decide_locked(detection, &key, now).await;
        decision
    }

    async fn decide_locked(
        &self,
        detection: CandidateDetection,
        key: &DedupKey,
        now: DateTime<Utc>,
    ) -> Decision {
        let since = now - chrono::Duration::seconds(COOLDOWN_SECS);

        match self
            .bounded("find_active", self.store.find_active(key, since))
            .await
        {
            Ok(Some(existing)) => {
                tracing::debug!(
                    key = %key,
                    existing_id = %existing.id,
                    "Alert suppressed (cooldown active)"
                );
                return Decision::Suppressed;
            }
            Ok(None) => {}
            Err(error) => match self.options.lookup_failure_policy {
                LookupFailurePolicy::FailCandidate => {
                    tracing::warn!(key = %key, error = %error, "Alert lookup failed, candidate dropped");
                    return Decision::Failed(CandidateFailure {
                        key: key.clone(),
                        stage: FailureStage::Lookup,
                        error,
                    });
                }
                LookupFailurePolicy::AssumeAbsent => {
                    tracing::warn!(key = %key, error = %error, "Alert lookup failed, admitting without dedup");
                }
            },
        }

        let alert = Alert::admit(detection, greenmon_common::id::next_id(), now);
        match self.bounded("insert", self.store.insert(&alert)).await {
            Ok(stored) => {
                tracing::info!(
                    alert_id = %stored.id,
                    greenhouse_id = %stored.greenhouse_id,
                    device_id = %stored.device_id,
                    condition = %stored.condition,
                    severity = %stored.severity,
                    value = stored.value,
                    "Alert raised"
                );
                Decision::Admitted(stored)
            }
            Err(error) => {
                tracing::error!(key = %key, error = %error, "Failed to persist alert");
                Decision::Failed(CandidateFailure {
                    key: key.clone(),
                    stage: FailureStage::Insert,
                    error,
                })
            }
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = greenmon_storage::error::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.options.store_timeout, call).await {
            Ok(result) => result.map_err(AlertError::from),
            Err(_) => Err(AlertError::Timeout {
                operation,
                after_ms: self.options.store_timeout.as_millis() as u64,
            }),
        }
    }
}
