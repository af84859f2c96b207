use axum::{
  Router, middleware,
  routing::{get, post},
};

use crate::auth;

mod account;
mod batch;
mod error;
mod site;

/// The operator surface, mounted at `/api/admin`. Admin tokens only.
/// Ownership checks do not apply here, but every mutation logs the
/// acting principal.
pub fn router() -> Router {
  Router::new()
    .route("/account", post(account::create).get(account::list))
    .route(
      "/account/{id}",
      get(account::get_one).patch(account::update),
    )
    .route("/account/{id}/deactivate", post(account::deactivate))
    .route("/site", post(site::create).get(site::list))
    .route("/site/{id}", get(site::get_one).patch(site::update))
    .route("/site/{id}/deactivate", post(site::deactivate))
    .route("/batch", get(batch::list))
    .route(
      "/batch/{id}",
      get(batch::get_one).delete(batch::delete_metadata),
    )
    .route("/error", get(error::list))
    .route("/error/export", get(error::export))
    .route_layer(middleware::from_fn(auth::admin_request))
}
