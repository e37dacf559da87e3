use crate::api::{fail, Failure};
use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;
use serde_json::Value;
use std::time::Instant;

pub const TRACE_HEADER: &str = "x-trace-id";
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Per-request trace id, stored in request extensions.
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// Reuses a caller-supplied id (1 to 32 hex chars) so field gateways can
/// correlate their own logs; anything else gets a fresh 16-char id.
fn trace_id_for(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| (1..=32).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_hexdigit()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| format!("{:016x}", rand::thread_rng().gen::<u64>()))
}

/// Who sent a reading upload, pulled from the body for the request log.
#[derive(Debug, Default, PartialEq)]
struct UploadTags {
    greenhouse_id: Option<String>,
    device_id: Option<String>,
    /// Entries in a bulk upload. Zero for a single reading.
    entries: usize,
}

fn upload_tags(body: &[u8]) -> UploadTags {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return UploadTags::default();
    };
    let text = |v: &Value, field: &str| v.get(field).and_then(Value::as_str).map(str::to_string);

    match value.get("readings").and_then(Value::as_array) {
        Some(entries) => {
            let first = entries.first().unwrap_or(&Value::Null);
            UploadTags {
                greenhouse_id: text(first, "greenhouseId"),
                device_id: text(first, "deviceId"),
                entries: entries.len(),
            }
        }
        None => UploadTags {
            greenhouse_id: text(&value, "greenhouseId"),
            device_id: text(&value, "deviceId"),
            entries: 0,
        },
    }
}

/// Attaches a [`TraceId`], tags reading uploads with their greenhouse and
/// device, and logs the status and latency of every request. Live
/// subscriptions are logged on join only.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = trace_id_for(req.headers());
    req.extensions_mut().insert(TraceId(trace_id.clone()));
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if path.starts_with("/v1/live/") {
        tracing::info!(trace_id = %trace_id, path = %path, "Live subscribe");
        return next.run(req).await;
    }

    let req = if method == Method::POST && path.starts_with("/v1/readings") {
        let (parts, body) = req.into_parts();
        let Ok(bytes) = axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES).await else {
            tracing::warn!(trace_id = %trace_id, path = %path, "Upload rejected: body too large");
            return with_trace_header(
                fail(&trace_id, Failure::PayloadTooLarge, "request body too large"),
                &trace_id,
            );
        };
        let tags = upload_tags(&bytes);
        tracing::info!(
            trace_id = %trace_id,
            path = %path,
            greenhouse_id = tags.greenhouse_id.as_deref().unwrap_or("-"),
            device_id = tags.device_id.as_deref().unwrap_or("-"),
            entries = tags.entries,
            bytes = bytes.len(),
            "Reading upload"
        );
        Request::from_parts(parts, Body::from(bytes))
    } else {
        tracing::debug!(trace_id = %trace_id, method = %method, path = %path, "Request");
        req
    };

    let started = Instant::now();
    let response = next.run(req).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        tracing::error!(trace_id = %trace_id, method = %method, path = %path, status, elapsed_ms, "Request failed");
    } else if response.status().is_client_error() {
        tracing::warn!(trace_id = %trace_id, method = %method, path = %path, status, elapsed_ms, "Request rejected");
    } else {
        tracing::info!(trace_id = %trace_id, method = %method, path = %path, status, elapsed_ms, "Request done");
    }

    with_trace_header(response, &trace_id)
}

fn with_trace_header(mut response: Response, trace_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(TRACE_HEADER, value);
    }
    response
}
