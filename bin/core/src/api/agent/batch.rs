use axum::{
  Extension, Json,
  extract::Path,
  http::StatusCode,
};
use depot_client::entities::Batch;
use uuid::Uuid;

use crate::{
  auth::{AgentPrincipal, Principal},
  batch::{self, Transition, ensure_owned},
  error::DomainResult,
};

pub async fn start(
  Extension(principal): Extension<AgentPrincipal>,
) -> DomainResult<(StatusCode, Json<Batch>)> {
  let batch = batch::start_batch(&principal).await?;
  Ok((StatusCode::CREATED, Json(batch)))
}

/// Read route: agents see only their own batches, admins any.
pub async fn get_one(
  Extension(principal): Extension<Principal>,
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Batch>> {
  let batch = batch::get_batch(id).await?;
  if let Principal::Agent(agent) = &principal {
    ensure_owned(&batch, agent)?;
  }
  Ok(Json(batch))
}

pub async fn complete(
  Extension(principal): Extension<AgentPrincipal>,
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Batch>> {
  transition(principal, id, Transition::Complete).await
}

pub async fn fail(
  Extension(principal): Extension<AgentPrincipal>,
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Batch>> {
  transition(principal, id, Transition::Fail).await
}

pub async fn cancel(
  Extension(principal): Extension<AgentPrincipal>,
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Batch>> {
  transition(principal, id, Transition::Cancel).await
}

async fn transition(
  principal: AgentPrincipal,
  id: Uuid,
  transition: Transition,
) -> DomainResult<Json<Batch>> {
  let batch = batch::get_batch(id).await?;
  ensure_owned(&batch, &principal)?;
  let batch = batch::transition_batch(id, transition).await?;
  Ok(Json(batch))
}
