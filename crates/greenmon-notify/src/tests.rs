use crate::channels::broadcast::RoomHub;
use crate::channels::webhook::WebhookChannel;
use crate::dispatch::RoomDispatcher;
use crate::error::{NotifyError, Result};
use crate::manager::NotificationManager;
use crate::routing::ChannelRoute;
use crate::{LiveEvent, NotificationChannel};
use async_trait::async_trait;
use chrono::Utc;
use greenmon_common::types::{
    Alert, ConditionType, SensorKind, SensorReading, SensorValues, Severity,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn make_alert(greenhouse: &str, severity: Severity) -> Alert {
    let now = Utc::now();
    Alert {
        id: "1".into(),
        greenhouse_id: greenhouse.into(),
        device_id: "esp32-01".into(),
        condition: ConditionType::WaterLevelLow,
        severity,
        value: 4.0,
        threshold: 10.0,
        sensor_kind: SensorKind::WaterLevel,
        message: "Water level too low: 4.0cm (threshold 10.0cm)".into(),
        detected_at: now,
        resolved: false,
        created_at: now,
    }
}

fn sensor_update(greenhouse: &str) -> LiveEvent {
    LiveEvent::SensorUpdate(SensorReading {
        greenhouse_id: greenhouse.into(),
        device_id: "esp32-01".into(),
        values: SensorValues {
            temperature: Some(22.0),
            ..Default::default()
        },
        timestamp: Utc::now(),
    })
}

#[derive(Default)]
struct CountingChannel {
    sent: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl NotificationChannel for CountingChannel {
    async fn send(&self, _greenhouse_id: &str, _event: &LiveEvent) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::Other("unreachable".into()));
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "counting"
    }
}

#[test]
fn routing_severity_filter() {
    let route_high = ChannelRoute {
        min_severity: Severity::High,
        channel_index: 0,
    };
    let route_low = ChannelRoute {
        min_severity: Severity::Low,
        channel_index: 1,
    };

    assert!(!route_high.should_send(Severity::Medium));
    assert!(route_high.should_send(Severity::High));
    assert!(route_high.should_send(Severity::Critical));

    assert!(route_low.should_send(Severity::Low));
    assert!(route_low.should_send(Severity::Critical));
}

#[test]
fn live_event_serializes_with_event_name() {
    let event = LiveEvent::NewAlert(make_alert("gh-1", Severity::Critical));
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "newAlert");
    assert_eq!(json["data"]["condition"], "WATER_LEVEL_LOW");
    assert_eq!(json["data"]["severity"], "CRITICAL");
}

#[tokio::test]
async fn rooms_are_isolated_per_greenhouse() {
    let hub = RoomHub::new(8);
    let mut gh1 = hub.subscribe("gh-1");
    let mut gh2 = hub.subscribe("gh-2");

    hub.send("gh-1", &sensor_update("gh-1")).await.unwrap();

    let got = gh1.recv().await.unwrap();
    assert_eq!(got.name(), "allSensorsUpdate");
    assert!(gh2.try_recv().is_err());
}

#[tokio::test]
async fn publishing_to_empty_room_is_not_an_error() {
    let hub = RoomHub::default();
    assert!(hub.send("nobody", &sensor_update("nobody")).await.is_ok());

    let rx = hub.subscribe("gh-1");
    assert_eq!(hub.subscriber_count("gh-1"), 1);
    drop(rx);
    assert_eq!(hub.broadcast("gh-1", sensor_update("gh-1")), 0);
    assert_eq!(hub.subscriber_count("gh-1"), 0);
}

#[tokio::test]
async fn manager_routes_alerts_by_severity() {
    let pager = Arc::new(CountingChannel::default());
    let log = Arc::new(CountingChannel::default());
    let manager = NotificationManager::new(
        vec![pager.clone(), log.clone()],
        vec![
            ChannelRoute {
                min_severity: Severity::Critical,
                channel_index: 0,
            },
            ChannelRoute {
                min_severity: Severity::Low,
                channel_index: 1,
            },
        ],
    );

    let report = manager
        .publish("gh-1", &LiveEvent::NewAlert(make_alert("gh-1", Severity::Medium)))
        .await;
    assert_eq!(report.delivered, 1);
    assert_eq!(pager.sent.load(Ordering::SeqCst), 0);
    assert_eq!(log.sent.load(Ordering::SeqCst), 1);

    // Sensor updates carry no severity and reach every route.
    let report = manager.publish("gh-1", &sensor_update("gh-1")).await;
    assert_eq!(report.delivered, 2);
}

#[tokio::test]
async fn failing_channel_does_not_stop_the_others() {
    let broken = Arc::new(CountingChannel {
        fail: true,
        ..Default::default()
    });
    let healthy = Arc::new(CountingChannel::default());
    let manager = NotificationManager::new(
        vec![broken.clone(), healthy.clone()],
        vec![
            ChannelRoute {
                min_severity: Severity::Low,
                channel_index: 0,
            },
            ChannelRoute {
                min_severity: Severity::Low,
                channel_index: 1,
            },
            ChannelRoute {
                min_severity: Severity::Low,
                channel_index: 7,
            },
        ],
    );

    let report = manager
        .publish("gh-1", &LiveEvent::NewAlert(make_alert("gh-1", Severity::High)))
        .await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);
    assert_eq!(healthy.sent.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn webhook_skips_sensor_updates() {
    let webhook = WebhookChannel::new("http://127.0.0.1:9/hook");
    assert!(!webhook.accepts(&sensor_update("gh-1")));
    assert!(webhook.accepts(&LiveEvent::NewAlert(make_alert("gh-1", Severity::Low))));
    // Never touches the network for non-alert events.
    assert!(webhook.send("gh-1", &sensor_update("gh-1")).await.is_ok());
}

#[tokio::test]
async fn webhook_reports_failure_after_retries() {
    let webhook = WebhookChannel::new("http://127.0.0.1:9/hook")
        .with_backoff(std::time::Duration::from_millis(1));
    let result = webhook
        .send("gh-1", &LiveEvent::NewAlert(make_alert("gh-1", Severity::High)))
        .await;
    assert!(matches!(result, Err(NotifyError::Http(_))));
}

#[tokio::test]
async fn dispatcher_keeps_room_order_across_batches() {
    let hub = Arc::new(RoomHub::new(16));
    let channels: Vec<Arc<dyn NotificationChannel>> = vec![hub.clone()];
    let manager = Arc::new(NotificationManager::new(
        channels,
        vec![ChannelRoute {
            min_severity: Severity::Low,
            channel_index: 0,
        }],
    ));
    let dispatcher = RoomDispatcher::new(manager, 16);
    let mut rx = hub.subscribe("gh-1");

    assert_eq!(
        dispatcher.dispatch(
            "gh-1",
            vec![
                sensor_update("gh-1"),
                LiveEvent::NewAlert(make_alert("gh-1", Severity::High)),
            ],
        ),
        2
    );
    dispatcher.dispatch("gh-1", vec![sensor_update("gh-1")]);

    let mut names = Vec::new();
    for _ in 0..3 {
        names.push(rx.recv().await.unwrap().name());
    }
    assert_eq!(names, vec!["allSensorsUpdate", "newAlert", "allSensorsUpdate"]);
}

#[tokio::test]
async fn dispatcher_drops_events_past_queue_depth() {
    let manager = Arc::new(NotificationManager::new(Vec::new(), Vec::new()));
    let dispatcher = RoomDispatcher::new(manager, 1);
    // The worker has not run yet, so only the first event fits.
    let queued = dispatcher.dispatch(
        "gh-1",
        vec![sensor_update("gh-1"), sensor_update("gh-1"), sensor_update("gh-1")],
    );
    assert_eq!(queued, 1);
}
