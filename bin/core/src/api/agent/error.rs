use axum::{
  Extension, Json,
  extract::Path,
  http::StatusCode,
};
use depot_client::{
  api::agent::ErrorReport, entities::ErrorLog,
};
use uuid::Uuid;

use crate::{
  auth::{AgentPrincipal, Principal},
  batch::{self, ensure_owned},
  error::{DomainError, DomainResult},
  errorlog,
};

/// `POST /error`: a site-level error, not tied to any batch.
pub async fn site_error(
  Extension(principal): Extension<AgentPrincipal>,
  Json(report): Json<ErrorReport>,
) -> DomainResult<StatusCode> {
  errorlog::append(principal.site_id, None, report).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /error/{batch_id}`: batch-associated; also flips the batch
/// `hasErrors` flag.
pub async fn batch_error(
  Extension(principal): Extension<AgentPrincipal>,
  Path(batch_id): Path<Uuid>,
  Json(report): Json<ErrorReport>,
) -> DomainResult<(StatusCode, Json<ErrorLog>)> {
  let batch = batch::get_batch(batch_id).await?;
  ensure_owned(&batch, &principal)?;
  let log =
    errorlog::append(principal.site_id, Some(batch_id), report)
      .await?;
  Ok((StatusCode::CREATED, Json(log)))
}

/// `GET /error/log/{error_id}`: agents only see errors their own
/// site issued (batch-associated or standalone); admins see any.
pub async fn get_one(
  Extension(principal): Extension<Principal>,
  Path(error_id): Path<Uuid>,
) -> DomainResult<Json<ErrorLog>> {
  let log = errorlog::get_error_log(error_id)
    .await?
    .ok_or(DomainError::NotFound("Error log"))?;
  if let Principal::Agent(agent) = &principal
    && log.site_id != agent.site_id
  {
    return Err(DomainError::OwnershipDenied);
  }
  Ok(Json(log))
}
