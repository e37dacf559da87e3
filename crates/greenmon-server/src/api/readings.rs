use crate::api::{fail, ok, Failure};
use crate::ingest::{ingest_reading, IngestSummary};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use greenmon_common::types::{SensorKind, SensorReading, SensorValues};
use greenmon_storage::{ReadingStore, SampleQuery, StoredSample};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const DEFAULT_GREENHOUSE_ID: &str = "greenhouse-001";
pub const MAX_BULK_READINGS: usize = 500;
const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1000;
const DEFAULT_LIST_WINDOW_HOURS: i64 = 24;

/// Device payload as posted by field controllers.
///
/// Sensor fields accept numbers or numeric strings. Anything else, and
/// non-finite numbers, count as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPayload {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub greenhouse_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub soil_moisture: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub light_intensity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub water_level: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|v| v.is_finite()))
}

/// RFC 3339 string or epoch milliseconds. Unparseable values fall back to
/// the receive time.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

impl ReadingPayload {
    /// Returns `None` when `deviceId` is missing or blank.
    pub fn into_reading(self, received_at: DateTime<Utc>) -> Option<SensorReading> {
        let device_id = self
            .device_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())?;
        let greenhouse_id = or_default_greenhouse(self.greenhouse_id);

        Some(SensorReading {
            greenhouse_id,
            device_id,
            values: SensorValues {
                temperature: self.temperature,
                humidity: self.humidity,
                soil_moisture: self.soil_moisture,
                light_intensity: self.light_intensity,
                water_level: self.water_level,
            },
            timestamp: self.timestamp.unwrap_or(received_at),
        })
    }
}

fn or_default_greenhouse(id: Option<String>) -> String {
    id.map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_GREENHOUSE_ID.to_string())
}

pub async fn ingest(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<ReadingPayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return fail(&trace_id, Failure::BadRequest, rejection.body_text()),
    };

    let Some(reading) = payload.into_reading(Utc::now()) else {
        return fail(&trace_id, Failure::BadRequest, "deviceId is required");
    };

    ok(&trace_id, ingest_reading(&state, reading).await)
}

#[derive(Debug, Deserialize)]
pub struct BulkPayload {
    #[serde(default)]
    pub readings: Option<Vec<Value>>,
}

/// Outcome for one entry of a bulk upload. Exactly one of `summary` and
/// `error` is set.
#[derive(Debug, Serialize)]
pub struct BulkItem {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<IngestSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkSummary {
    pub processed: usize,
    pub total: usize,
    pub results: Vec<BulkItem>,
}

fn parse_bulk_item(raw: Value, received_at: DateTime<Utc>) -> Result<SensorReading, String> {
    let payload: ReadingPayload = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    payload
        .into_reading(received_at)
        .ok_or_else(|| "deviceId is required".to_string())
}

/// Ingests each entry on its own, in order. A bad entry is reported in its
/// slot and never rejects the rest.
pub async fn ingest_bulk(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    payload: Result<Json<BulkPayload>, JsonRejection>,
) -> Response {
    let readings = match payload {
        Ok(Json(BulkPayload {
            readings: Some(readings),
        })) if !readings.is_empty() => readings,
        Ok(_) => return fail(&trace_id, Failure::BadRequest, "readings array is required"),
        Err(rejection) => return fail(&trace_id, Failure::BadRequest, rejection.body_text()),
    };
    if readings.len() > MAX_BULK_READINGS {
        return fail(
            &trace_id,
            Failure::BadRequest,
            format!("at most {MAX_BULK_READINGS} readings per request"),
        );
    }

    let received_at = Utc::now();
    let total = readings.len();
    let mut results = Vec::with_capacity(total);
    for (index, raw) in readings.into_iter().enumerate() {
        let item = match parse_bulk_item(raw, received_at) {
            Ok(reading) => BulkItem {
                index,
                summary: Some(ingest_reading(&state, reading).await),
                error: None,
            },
            Err(error) => {
                tracing::warn!(index, error = %error, "Skipping invalid bulk reading");
                BulkItem {
                    index,
                    summary: None,
                    error: Some(error),
                }
            }
        };
        results.push(item);
    }

    let processed = results.iter().filter(|r| r.summary.is_some()).count();
    tracing::info!(processed, total, "Bulk readings ingested");
    ok(
        &trace_id,
        BulkSummary {
            processed,
            total,
            results,
        },
    )
}

/// Filters for reading back stored samples. Times are RFC 3339. Without
/// `from`/`to` the last day is returned.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub greenhouse_id: Option<String>,
    pub device_id: Option<String>,
    pub sensor: Option<SensorKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ListQuery {
    fn into_sample_query(self, now: DateTime<Utc>) -> Result<SampleQuery, &'static str> {
        let to = self.to.unwrap_or(now);
        let from = self
            .from
            .unwrap_or(to - Duration::hours(DEFAULT_LIST_WINDOW_HOURS));
        if from > to {
            return Err("from must not be after to");
        }
        Ok(SampleQuery {
            greenhouse_id: or_default_greenhouse(self.greenhouse_id),
            device_id: self.device_id.filter(|id| !id.trim().is_empty()),
            kind: self.sensor,
            from,
            to,
            limit: Some(self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SampleView {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub greenhouse_id: String,
    pub device_id: String,
    pub sensor: SensorKind,
    pub unit: &'static str,
    pub value: f64,
}

impl From<StoredSample> for SampleView {
    fn from(sample: StoredSample) -> Self {
        Self {
            id: sample.id,
            timestamp: sample.timestamp,
            greenhouse_id: sample.greenhouse_id,
            device_id: sample.device_id,
            unit: sample.kind.unit(),
            sensor: sample.kind,
            value: sample.value,
        }
    }
}

pub async fn list(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return fail(&trace_id, Failure::BadRequest, rejection.body_text()),
    };
    let query = match query.into_sample_query(Utc::now()) {
        Ok(query) => query,
        Err(msg) => return fail(&trace_id, Failure::BadRequest, msg),
    };

    match state.storage.query_samples(&query).await {
        Ok(samples) => ok(
            &trace_id,
            samples.into_iter().map(SampleView::from).collect::<Vec<_>>(),
        ),
        Err(e) => {
            tracing::error!(greenhouse_id = %query.greenhouse_id, error = %e, "Failed to query samples");
            fail(&trace_id, Failure::Storage, "storage error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ReadingPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let payload = parse(r#"{"deviceId":"esp32-01","temperature":"31.5","humidity":55}"#);
        assert_eq!(payload.temperature, Some(31.5));
        assert_eq!(payload.humidity, Some(55.0));
    }

    #[test]
    fn malformed_fields_are_dropped() {
        let payload = parse(
            r#"{"deviceId":"esp32-01","temperature":"hot","humidity":null,"soilMoisture":[1],"timestamp":"yesterday"}"#,
        );
        assert_eq!(payload.temperature, None);
        assert_eq!(payload.humidity, None);
        assert_eq!(payload.soil_moisture, None);
        assert_eq!(payload.timestamp, None);
    }

    #[test]
    fn greenhouse_defaults_and_device_is_required() {
        let now = Utc::now();
        let reading = parse(r#"{"deviceId":"esp32-01","soilMoisture":50}"#)
            .into_reading(now)
            .unwrap();
        assert_eq!(reading.greenhouse_id, DEFAULT_GREENHOUSE_ID);
        assert_eq!(reading.timestamp, now);
        assert_eq!(reading.values.soil_moisture, Some(50.0));

        assert!(parse(r#"{"temperature":20}"#).into_reading(now).is_none());
        assert!(parse(r#"{"deviceId":"  "}"#).into_reading(now).is_none());
    }

    #[test]
    fn timestamp_accepts_rfc3339_and_epoch_millis() {
        let a = parse(r#"{"deviceId":"d","timestamp":"2024-03-01T12:00:00Z"}"#);
        let b = parse(r#"{"deviceId":"d","timestamp":1709294400000}"#);
        assert_eq!(a.timestamp, b.timestamp);
        assert!(a.timestamp.is_some());
    }

    #[test]
    fn bulk_items_are_parsed_independently() {
        let now = Utc::now();
        assert!(parse_bulk_item(serde_json::json!({"deviceId": "d", "temperature": 20}), now).is_ok());
        assert_eq!(
            parse_bulk_item(serde_json::json!({"temperature": 20}), now).unwrap_err(),
            "deviceId is required"
        );
        assert!(parse_bulk_item(serde_json::json!("not an object"), now).is_err());
    }

    #[test]
    fn list_query_defaults_to_last_day_and_clamps_limit() {
        let now = Utc::now();
        let query = ListQuery {
            limit: Some(50_000),
            ..Default::default()
        }
        .into_sample_query(now)
        .unwrap();
        assert_eq!(query.greenhouse_id, DEFAULT_GREENHOUSE_ID);
        assert_eq!(query.to, now);
        assert_eq!(query.from, now - Duration::hours(24));
        assert_eq!(query.limit, Some(MAX_LIST_LIMIT));

        let inverted = ListQuery {
            from: Some(now),
            to: Some(now - Duration::hours(1)),
            ..Default::default()
        };
        assert!(inverted.into_sample_query(now).is_err());
    }
}
