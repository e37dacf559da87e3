use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use greenmon_alert::engine::AlertEngine;
use greenmon_alert::rules::RuleSet;
use greenmon_alert::service::AlertService;
use greenmon_common::types::Severity;
use greenmon_notify::channels::broadcast::RoomHub;
use greenmon_notify::channels::webhook::WebhookChannel;
use greenmon_notify::dispatch::RoomDispatcher;
use greenmon_notify::manager::NotificationManager;
use greenmon_notify::routing::ChannelRoute;
use greenmon_notify::NotificationChannel;
use greenmon_storage::engine::SqliteStorageEngine;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<SqliteStorageEngine>,
    pub alerts: Arc<AlertService>,
    pub rooms: Arc<RoomHub>,
    pub dispatcher: Arc<RoomDispatcher>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wires storage, the alert pipeline and live delivery from config.
    pub fn build(config: ServerConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(SqliteStorageEngine::new(Path::new(&config.data_dir))?);

        let thresholds = Arc::new(config.threshold_table()?);
        let engine = AlertEngine::new(storage.clone(), config.alert.engine_options());
        let alerts = Arc::new(AlertService::new(thresholds, RuleSet::default(), engine));

        let rooms = Arc::new(RoomHub::new(config.notification.room_capacity));
        let mut channels: Vec<Arc<dyn NotificationChannel>> = vec![rooms.clone()];
        let mut routes = vec![ChannelRoute {
            min_severity: Severity::Low,
            channel_index: 0,
        }];
        for hook in &config.notification.webhooks {
            routes.push(ChannelRoute {
                min_severity: hook.min_severity,
                channel_index: channels.len(),
            });
            channels.push(Arc::new(WebhookChannel::new(&hook.url)));
        }
        let notifier = Arc::new(NotificationManager::new(channels, routes));
        let dispatcher = Arc::new(RoomDispatcher::new(
            notifier,
            config.notification.queue_depth,
        ));

        Ok(Self {
            storage,
            alerts,
            rooms,
            dispatcher,
            start_time: Utc::now(),
            config: Arc::new(config),
        })
    }
}
