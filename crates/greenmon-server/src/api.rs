pub mod alerts;
pub mod live;
pub mod readings;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use greenmon_alert::engine::LookupFailurePolicy;
use serde::Serialize;

/// Body of every HTTP reply. `err_code` is 0 on success, `data` is absent
/// on failure.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub err_code: u16,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

/// Failure classes the ingestion surface can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Unparseable body, missing `deviceId`, or an invalid query.
    BadRequest,
    NotFound,
    PayloadTooLarge,
    /// The store rejected or could not serve the request.
    Storage,
}

impl Failure {
    fn status(self) -> StatusCode {
        match self {
            Failure::BadRequest => StatusCode::BAD_REQUEST,
            Failure::NotFound => StatusCode::NOT_FOUND,
            Failure::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Failure::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Failure::BadRequest => 1001,
            Failure::NotFound => 1004,
            Failure::PayloadTooLarge => 1013,
            Failure::Storage => 1501,
        }
    }
}

pub fn ok<T: Serialize>(trace_id: &str, data: T) -> Response {
    Json(Envelope {
        err_code: 0,
        err_msg: "success".to_string(),
        trace_id: trace_id.to_string(),
        data: Some(data),
    })
    .into_response()
}

pub fn fail(trace_id: &str, failure: Failure, msg: impl Into<String>) -> Response {
    (
        failure.status(),
        Json(Envelope::<()> {
            err_code: failure.code(),
            err_msg: msg.into(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

#[derive(Serialize)]
struct Health {
    version: &'static str,
    uptime_secs: i64,
    configured_greenhouses: usize,
    lookup_failure_policy: LookupFailurePolicy,
}

async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    ok(
        &trace_id,
        Health {
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: (Utc::now() - state.start_time).num_seconds(),
            configured_greenhouses: state.config.greenhouses.len(),
            lookup_failure_policy: state.config.alert.lookup_failure_policy,
        },
    )
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health))
        .route(
            "/v1/readings",
            post(readings::ingest).get(readings::list),
        )
        .route("/v1/readings/bulk", post(readings::ingest_bulk))
        .route("/v1/alerts/{id}/resolve", post(alerts::resolve))
        .route("/v1/live/{greenhouse_id}", get(live::subscribe))
}
