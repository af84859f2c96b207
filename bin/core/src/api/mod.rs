use std::time::Instant;

use axum::{
  Router,
  extract::Request,
  http::{HeaderName, HeaderValue},
  middleware::{self, Next},
  response::Response,
  routing::get,
};
use tower_http::set_header::SetResponseHeaderLayer;
use uuid::Uuid;

use crate::{config::cors_layer, error::error_envelope};

mod admin;
mod agent;
mod health;

/// Correlates the request log lines emitted below and by the error
/// envelope's internal-error path.
async fn request_log(req: Request, next: Next) -> Response {
  let timer = Instant::now();
  let req_id = Uuid::new_v4();
  let method = req.method().clone();
  let path = req.uri().path().to_string();
  debug!("request {req_id} | {method} {path}");
  let response = next.run(req).await;
  debug!(
    "request {req_id} | {method} {path} | status: {} | took: {:?}",
    response.status(),
    timer.elapsed()
  );
  response
}

pub fn app() -> Router {
  Router::new()
    .route("/version", get(|| async { env!("CARGO_PKG_VERSION") }))
    .route("/health", get(health::health))
    .route("/metrics", get(health::metrics))
    .nest("/api/v1", agent::router())
    // Deprecated alias kept for already-deployed agents.
    .nest("/api/ingest", agent::router())
    .nest("/api/admin", admin::router())
    .layer(middleware::from_fn(error_envelope))
    .layer(middleware::from_fn(request_log))
    .layer(cors_layer())
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("x-content-type-options"),
      HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("x-frame-options"),
      HeaderValue::from_static("DENY"),
    ))
    .layer(SetResponseHeaderLayer::overriding(
      HeaderName::from_static("referrer-policy"),
      HeaderValue::from_static("strict-origin-when-cross-origin"),
    ))
}
