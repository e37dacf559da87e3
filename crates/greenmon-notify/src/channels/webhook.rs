use crate::error::{NotifyError, Result};
use crate::{LiveEvent, NotificationChannel};
use async_trait::async_trait;
use greenmon_common::types::Alert;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const MAX_BODY_LENGTH: usize = 1024;

/// POSTs new alerts as JSON to a fixed URL. Sensor updates are not
/// forwarded.
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
    backoff_base: Duration,
}

impl WebhookChannel {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            backoff_base: Duration::from_millis(100),
        }
    }

    /// Overrides the first retry delay. Each later retry doubles it.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn render_body(greenhouse_id: &str, alert: &Alert) -> serde_json::Value {
        serde_json::json!({
            "event": "newAlert",
            "alert_id": alert.id,
            "greenhouse_id": greenhouse_id,
            "device_id": alert.device_id,
            "condition": alert.condition.as_str(),
            "severity": alert.severity.to_string(),
            "message": alert.message,
            "value": alert.value,
            "threshold": alert.threshold,
            "detected_at": alert.detected_at.to_rfc3339(),
            "created_at": alert.created_at.to_rfc3339(),
        })
    }

    async fn post_once(&self, body: &serde_json::Value) -> Result<()> {
        let resp = self.client.post(self.url.as_str()).json(body).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = match resp.text().await {
            Ok(text) => truncate(&text, MAX_BODY_LENGTH),
            Err(e) => format!("[Failed to read response body: {e}]"),
        };
        Err(NotifyError::Api {
            service: "webhook".to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, greenhouse_id: &str, event: &LiveEvent) -> Result<()> {
        let LiveEvent::NewAlert(alert) = event else {
            return Ok(());
        };
        let body = Self::render_body(greenhouse_id, alert);

        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.post_once(&body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        url = %self.url,
                        attempt = attempt + 1,
                        error = %e,
                        "Webhook send failed, retrying"
                    );
                    last_err = Some(e);
                }
            }
            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(self.backoff_base * 2u32.pow(attempt)).await;
            }
        }

        tracing::error!(url = %self.url, alert_id = %alert.id, "Webhook failed after {MAX_ATTEMPTS} attempts");
        Err(last_err.unwrap_or_else(|| NotifyError::Other("webhook not attempted".to_string())))
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }

    fn accepts(&self, event: &LiveEvent) -> bool {
        matches!(event, LiveEvent::NewAlert(_))
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("°C°C°C", 2), "°C...");
    }
}
