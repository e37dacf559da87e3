use crate::routing::ChannelRoute;
use crate::{LiveEvent, NotificationChannel};
use std::sync::Arc;

/// Delivery tally for one published event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans live events out to routed channels.
///
/// Delivery is best-effort: a failing channel is logged and counted, never
/// propagated, and never stops the remaining routes.
pub struct NotificationManager {
    channels: Vec<Arc<dyn NotificationChannel>>,
    routes: Vec<ChannelRoute>,
}

impl NotificationManager {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>, routes: Vec<ChannelRoute>) -> Self {
        Self { channels, routes }
    }

    pub async fn publish(&self, greenhouse_id: &str, event: &LiveEvent) -> PublishReport {
        let mut report = PublishReport::default();

        for route in &self.routes {
            if let Some(severity) = event.severity() {
                if !route.should_send(severity) {
                    continue;
                }
            }

            let Some(channel) = self.channels.get(route.channel_index) else {
                tracing::warn!(
                    channel_index = route.channel_index,
                    "Route points at a missing channel"
                );
                continue;
            };
            if !channel.accepts(event) {
                continue;
            }

            match channel.send(greenhouse_id, event).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        channel = channel.channel_name(),
                        greenhouse_id,
                        event = event.name(),
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        }

        report
    }
}
