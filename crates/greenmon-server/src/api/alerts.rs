use crate::api::{fail, ok, Failure};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::response::Response;
use greenmon_storage::AlertStore;

/// Marks an alert resolved so the next detection for its key is admitted.
pub async fn resolve(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.storage.resolve(&id).await {
        Ok(true) => {
            tracing::info!(alert_id = %id, "Alert resolved");
            ok(&trace_id, serde_json::json!({ "id": id, "resolved": true }))
        }
        Ok(false) => fail(&trace_id, Failure::NotFound, "active alert not found"),
        Err(e) => {
            tracing::error!(alert_id = %id, error = %e, "Failed to resolve alert");
            fail(&trace_id, Failure::Storage, "storage error")
        }
    }
}
