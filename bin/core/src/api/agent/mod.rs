use axum::{
  Router,
  extract::DefaultBodyLimit,
  middleware,
  routing::{get, post},
};

use crate::{auth, config::core_config};

mod batch;
mod error;
mod token;
mod upload;

/// The agent surface, mounted at `/api/v1` (and its deprecated
/// alias). Write routes take agent tokens only; reads also accept
/// admin tokens; the token mint takes HTTP Basic.
pub fn router() -> Router {
  // Multipart framing on top of the per-file cap.
  let upload_body_limit =
    core_config().max_file_size as usize + 1024 * 1024;

  let writes = Router::new()
    .route("/batch/start", post(batch::start))
    .route("/batch/{id}/complete", post(batch::complete))
    .route("/batch/{id}/fail", post(batch::fail))
    .route("/batch/{id}/cancel", post(batch::cancel))
    .route(
      "/batch/{id}/upload",
      post(upload::upload)
        .layer(DefaultBodyLimit::max(upload_body_limit)),
    )
    .route("/error", post(error::site_error))
    .route("/error/{batch_id}", post(error::batch_error))
    .route_layer(middleware::from_fn(auth::agent_request));

  let reads = Router::new()
    .route("/batch/{id}", get(batch::get_one))
    .route("/error/log/{error_id}", get(error::get_one))
    .route_layer(middleware::from_fn(auth::agent_or_admin_request));

  Router::new()
    .route("/auth/token", post(token::mint))
    .merge(writes)
    .merge(reads)
}
