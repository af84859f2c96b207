use std::sync::atomic::Ordering;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::{
  state::{counters, db_client},
  upload::store::store_reachable,
};

/// Liveness of the two external dependencies. 503 when either is
/// unreachable so load balancers stop routing ingest traffic here.
pub async fn health() -> impl IntoResponse {
  let database = sqlx::query("SELECT 1")
    .execute(&db_client().pool)
    .await
    .inspect_err(|e| warn!("Database health probe failed | {e:?}"))
    .is_ok();
  let object_store = store_reachable().await;
  let healthy = database && object_store;
  let status = if healthy {
    StatusCode::OK
  } else {
    StatusCode::SERVICE_UNAVAILABLE
  };
  let body = Json(json!({
    "status": if healthy { "ok" } else { "degraded" },
    "database": if database { "ok" } else { "unreachable" },
    "objectStore": if object_store { "ok" } else { "unreachable" },
  }));
  (status, body)
}

/// Process-lifetime ingest counters.
pub async fn metrics() -> Json<serde_json::Value> {
  let counters = counters();
  Json(json!({
    "batchesStarted": counters.batches_started.load(Ordering::Relaxed),
    "batchesFinalized": counters.batches_finalized.load(Ordering::Relaxed),
    "batchesReaped": counters.batches_reaped.load(Ordering::Relaxed),
    "uploadsCommitted": counters.uploads_committed.load(Ordering::Relaxed),
    "uploadBytes": counters.upload_bytes.load(Ordering::Relaxed),
    "errorsRecorded": counters.errors_recorded.load(Ordering::Relaxed),
  }))
}
