use crate::error::Result;
use crate::{LiveEvent, NotificationChannel};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

pub const DEFAULT_ROOM_CAPACITY: usize = 256;

/// Per-greenhouse broadcast rooms.
///
/// A room is created on first subscribe and dropped once its last
/// subscriber is gone. Slow subscribers lag rather than block publishers.
pub struct RoomHub {
    capacity: usize,
    rooms: Mutex<HashMap<String, broadcast::Sender<LiveEvent>>>,
}

impl RoomHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<LiveEvent>>> {
        self.rooms
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, greenhouse_id: &str) -> broadcast::Receiver<LiveEvent> {
        self.rooms()
            .entry(greenhouse_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, greenhouse_id: &str) -> usize {
        self.rooms()
            .get(greenhouse_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Sends to the room. Returns how many subscribers received the event.
    pub fn broadcast(&self, greenhouse_id: &str, event: LiveEvent) -> usize {
        let mut rooms = self.rooms();
        let Some(tx) = rooms.get(greenhouse_id) else {
            return 0;
        };
        match tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                rooms.remove(greenhouse_id);
                tracing::debug!(greenhouse_id, "Room closed, no subscribers left");
                0
            }
        }
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}

#[async_trait]
impl NotificationChannel for RoomHub {
    async fn send(&self, greenhouse_id: &str, event: &LiveEvent) -> Result<()> {
        let receivers = self.broadcast(greenhouse_id, event.clone());
        tracing::debug!(
            greenhouse_id,
            event = event.name(),
            receivers,
            "Live event broadcast"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "room"
    }
}
