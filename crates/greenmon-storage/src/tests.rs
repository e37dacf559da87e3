use crate::engine::SqliteStorageEngine;
use crate::{AlertStore, ReadingStore, SampleQuery};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use greenmon_common::types::{
    Alert, ConditionType, DedupKey, SensorKind, SensorReading, SensorValues, Severity,
};
use tempfile::TempDir;

fn setup() -> (TempDir, SqliteStorageEngine) {
    greenmon_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let engine = SqliteStorageEngine::new(dir.path()).unwrap();
    (dir, engine)
}

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
        .and_utc()
}

fn make_alert(greenhouse: &str, device: &str, condition: ConditionType, created_at: DateTime<Utc>) -> Alert {
    Alert {
        id: greenmon_common::id::next_id(),
        greenhouse_id: greenhouse.to_string(),
        device_id: device.to_string(),
        condition,
        severity: Severity::High,
        value: 250.0,
        threshold: 300.0,
        sensor_kind: SensorKind::SoilMoisture,
        message: "Soil moisture low: 250.0raw (threshold 300.0raw)".to_string(),
        detected_at: created_at,
        resolved: false,
        created_at,
    }
}

fn key(greenhouse: &str, device: &str, condition: ConditionType) -> DedupKey {
    DedupKey {
        greenhouse_id: greenhouse.to_string(),
        condition,
        device_id: device.to_string(),
    }
}

#[tokio::test]
async fn find_active_returns_inserted_alert_within_window() {
    let (_dir, engine) = setup();
    let created = at(2024, 3, 1, 12, 0);
    let alert = make_alert("gh-1", "esp32-01", ConditionType::SoilMoistureLow, created);
    engine.insert(&alert).await.unwrap();

    let found = engine
        .find_active(
            &key("gh-1", "esp32-01", ConditionType::SoilMoistureLow),
            created - Duration::minutes(10),
        )
        .await
        .unwrap()
        .expect("alert should be active");
    assert_eq!(found, alert);
}

#[tokio::test]
async fn find_active_ignores_alerts_before_since() {
    let (_dir, engine) = setup();
    let created = at(2024, 3, 1, 12, 0);
    engine
        .insert(&make_alert("gh-1", "esp32-01", ConditionType::SoilMoistureLow, created))
        .await
        .unwrap();

    let since = created + Duration::minutes(1);
    let found = engine
        .find_active(&key("gh-1", "esp32-01", ConditionType::SoilMoistureLow), since)
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn find_active_is_scoped_to_the_full_key() {
    let (_dir, engine) = setup();
    let created = at(2024, 3, 1, 12, 0);
    engine
        .insert(&make_alert("gh-1", "esp32-01", ConditionType::SoilMoistureLow, created))
        .await
        .unwrap();
    let since = created - Duration::minutes(10);

    for other in [
        key("gh-2", "esp32-01", ConditionType::SoilMoistureLow),
        key("gh-1", "esp32-02", ConditionType::SoilMoistureLow),
        key("gh-1", "esp32-01", ConditionType::TemperatureHigh),
    ] {
        assert!(engine.find_active(&other, since).await.unwrap().is_none(), "{other}");
    }
}

#[tokio::test]
async fn resolved_alerts_are_not_active() {
    let (_dir, engine) = setup();
    let created = at(2024, 3, 1, 12, 0);
    let alert = make_alert("gh-1", "esp32-01", ConditionType::WaterLevelLow, created);
    engine.insert(&alert).await.unwrap();

    assert!(engine.resolve(&alert.id).await.unwrap());
    // A second resolve finds nothing left to resolve.
    assert!(!engine.resolve(&alert.id).await.unwrap());

    let found = engine
        .find_active(
            &key("gh-1", "esp32-01", ConditionType::WaterLevelLow),
            created - Duration::minutes(10),
        )
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn resolve_unknown_alert_returns_false() {
    let (_dir, engine) = setup();
    assert!(!engine.resolve("does-not-exist").await.unwrap());
}

#[tokio::test]
async fn find_active_spans_midnight_partitions() {
    let (_dir, engine) = setup();
    let late = at(2024, 3, 1, 23, 55);
    engine
        .insert(&make_alert("gh-1", "esp32-01", ConditionType::HumidityHigh, late))
        .await
        .unwrap();

    let now = at(2024, 3, 2, 0, 3);
    let found = engine
        .find_active(
            &key("gh-1", "esp32-01", ConditionType::HumidityHigh),
            now - Duration::minutes(10),
        )
        .await
        .unwrap();
    assert_eq!(found.map(|a| a.created_at), Some(late));
}

#[tokio::test]
async fn find_active_prefers_latest_alert() {
    let (_dir, engine) = setup();
    let first = at(2024, 3, 1, 12, 0);
    let second = first + Duration::minutes(5);
    engine
        .insert(&make_alert("gh-1", "esp32-01", ConditionType::LightLevelLow, first))
        .await
        .unwrap();
    engine
        .insert(&make_alert("gh-1", "esp32-01", ConditionType::LightLevelLow, second))
        .await
        .unwrap();

    let found = engine
        .find_active(
            &key("gh-1", "esp32-01", ConditionType::LightLevelLow),
            first - Duration::minutes(1),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.created_at, second);
}

#[tokio::test]
async fn write_reading_stores_only_finite_values() {
    let (_dir, engine) = setup();
    let now = Utc::now();
    let reading = SensorReading {
        greenhouse_id: "gh-1".into(),
        device_id: "esp32-01".into(),
        values: SensorValues {
            temperature: Some(24.5),
            humidity: Some(61.0),
            soil_moisture: Some(f64::NAN),
            ..Default::default()
        },
        timestamp: now,
    };

    assert_eq!(engine.write_reading(&reading).await.unwrap(), 2);

    let samples = engine
        .query_samples(&SampleQuery {
            greenhouse_id: "gh-1".into(),
            device_id: None,
            kind: None,
            from: now - Duration::minutes(1),
            to: now + Duration::minutes(1),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.device_id == "esp32-01"));

    let humidity = engine
        .query_samples(&SampleQuery {
            greenhouse_id: "gh-1".into(),
            device_id: Some("esp32-01".into()),
            kind: Some(SensorKind::Humidity),
            from: now - Duration::minutes(1),
            to: now + Duration::minutes(1),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(humidity.len(), 1);
    assert_eq!(humidity[0].value, 61.0);
}

#[tokio::test]
async fn query_samples_empty_for_unknown_greenhouse() {
    let (_dir, engine) = setup();
    let now = Utc::now();
    let samples = engine
        .query_samples(&SampleQuery {
            greenhouse_id: "nowhere".into(),
            device_id: None,
            kind: None,
            from: now - Duration::hours(1),
            to: now,
            limit: None,
        })
        .await
        .unwrap();
    assert!(samples.is_empty());
}

#[tokio::test]
async fn cleanup_keeps_todays_partition() {
    let (_dir, engine) = setup();
    let reading = SensorReading {
        greenhouse_id: "gh-1".into(),
        device_id: "esp32-01".into(),
        values: SensorValues {
            water_level: Some(42.0),
            ..Default::default()
        },
        timestamp: Utc::now(),
    };
    engine.write_reading(&reading).await.unwrap();
    assert_eq!(engine.cleanup(7).await.unwrap(), 0);
}

#[tokio::test]
async fn query_samples_limit_keeps_newest() {
    let (_dir, engine) = setup();
    let now = Utc::now();
    for i in 0..5 {
        let reading = SensorReading {
            greenhouse_id: "gh-1".into(),
            device_id: "esp32-01".into(),
            values: SensorValues {
                temperature: Some(20.0 + i as f64),
                ..Default::default()
            },
            timestamp: now - Duration::seconds(50 - i * 10),
        };
        engine.write_reading(&reading).await.unwrap();
    }

    let samples = engine
        .query_samples(&SampleQuery {
            greenhouse_id: "gh-1".into(),
            device_id: None,
            kind: Some(SensorKind::Temperature),
            from: now - Duration::minutes(5),
            to: now,
            limit: Some(2),
        })
        .await
        .unwrap();
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    assert_eq!(values, vec![23.0, 24.0]);
}
