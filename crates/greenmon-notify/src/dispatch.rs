use crate::manager::NotificationManager;
use crate::LiveEvent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Serialises publishing per greenhouse.
///
/// Each room gets one worker task fed by a bounded queue, so events reach a
/// room in the order they were dispatched while a slow channel in one room
/// never delays another. A full queue drops the event with a warning.
pub struct RoomDispatcher {
    manager: Arc<NotificationManager>,
    depth: usize,
    queues: Mutex<HashMap<String, mpsc::Sender<LiveEvent>>>,
}

impl RoomDispatcher {
    pub fn new(manager: Arc<NotificationManager>, depth: usize) -> Self {
        Self {
            manager,
            depth: depth.max(1),
            queues: Mutex::new(HashMap::new()),
        }
    }

    fn queues(&self) -> MutexGuard<'_, HashMap<String, mpsc::Sender<LiveEvent>>> {
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues `events` for the room in order. Must run inside a Tokio
    /// runtime. Returns how many were queued.
    pub fn dispatch(&self, greenhouse_id: &str, events: Vec<LiveEvent>) -> usize {
        let mut queues = self.queues();
        let mut queued = 0;

        for event in events {
            let tx = queues
                .entry(greenhouse_id.to_string())
                .or_insert_with(|| self.spawn_worker(greenhouse_id));
            match tx.try_send(event) {
                Ok(()) => queued += 1,
                Err(mpsc::error::TrySendError::Full(event)) => {
                    tracing::warn!(
                        greenhouse_id,
                        event = event.name(),
                        "Publish queue full, event dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(event)) => {
                    // Worker is gone; start a fresh one and retry once.
                    let tx = self.spawn_worker(greenhouse_id);
                    if tx.try_send(event).is_ok() {
                        queued += 1;
                    }
                    queues.insert(greenhouse_id.to_string(), tx);
                }
            }
        }
        queued
    }

    fn spawn_worker(&self, greenhouse_id: &str) -> mpsc::Sender<LiveEvent> {
        let (tx, mut rx) = mpsc::channel::<LiveEvent>(self.depth);
        let manager = self.manager.clone();
        let greenhouse_id = greenhouse_id.to_string();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                manager.publish(&greenhouse_id, &event).await;
            }
        });
        tx
    }
}
