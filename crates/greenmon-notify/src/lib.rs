//! Live-event delivery for greenhouse dashboards and outbound hooks.
//!
//! A [`LiveEvent`] is fanned out by the [`manager::NotificationManager`] to
//! every routed [`NotificationChannel`]. The in-process
//! [`channels::broadcast::RoomHub`] feeds per-greenhouse subscriber rooms,
//! and [`channels::webhook::WebhookChannel`] forwards alerts over HTTP.
//! [`dispatch::RoomDispatcher`] keeps per-room publish order.

pub mod channels;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod routing;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use error::Result;
use greenmon_common::types::{Alert, SensorReading, Severity};
use serde::{Deserialize, Serialize};

/// An event pushed to a greenhouse room.
///
/// Serialized as `{"event": <name>, "data": <payload>}`.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use greenmon_common::types::{SensorReading, SensorValues};
/// use greenmon_notify::LiveEvent;
///
/// let event = LiveEvent::SensorUpdate(SensorReading {
///     greenhouse_id: "greenhouse-001".into(),
///     device_id: "esp32-01".into(),
///     values: SensorValues::default(),
///     timestamp: Utc::now(),
/// });
/// assert_eq!(event.name(), "allSensorsUpdate");
/// let json = serde_json::to_value(&event).unwrap();
/// assert_eq!(json["event"], "allSensorsUpdate");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum LiveEvent {
    #[serde(rename = "newAlert")]
    NewAlert(Alert),
    #[serde(rename = "allSensorsUpdate")]
    SensorUpdate(SensorReading),
}

impl LiveEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::NewAlert(_) => "newAlert",
            LiveEvent::SensorUpdate(_) => "allSensorsUpdate",
        }
    }

    /// Alert severity, if this event carries an alert.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            LiveEvent::NewAlert(alert) => Some(alert.severity),
            LiveEvent::SensorUpdate(_) => None,
        }
    }
}

/// A delivery target for live events.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers `event` to subscribers of `greenhouse_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails after retries (if applicable).
    async fn send(&self, greenhouse_id: &str, event: &LiveEvent) -> Result<()>;

    /// Returns the channel type name (e.g., `"room"`, `"webhook"`).
    fn channel_name(&self) -> &str;

    /// Whether this channel wants events of this kind at all.
    fn accepts(&self, _event: &LiveEvent) -> bool {
        true
    }
}
