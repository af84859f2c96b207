use axum::{
  Extension, Json,
  extract::{Path, Query},
};
use depot_client::{
  api::admin::{BatchDetail, BatchQuery, Paginated},
  entities::Batch,
};
use uuid::Uuid;

use crate::{
  auth::admin::AdminPrincipal, batch, error::DomainResult,
};

pub async fn list(
  Query(query): Query<BatchQuery>,
) -> DomainResult<Json<Paginated<Batch>>> {
  Ok(Json(batch::list_batches(query).await?))
}

/// Batch plus its file list and the owning site's domain.
pub async fn get_one(
  Path(id): Path<Uuid>,
) -> DomainResult<Json<BatchDetail>> {
  Ok(Json(batch::batch_detail(id).await?))
}

/// Deletes the metadata only: the batch row and (via cascade) its
/// uploaded file rows. Objects in the store are not touched; blob
/// removal is a separate, explicit action.
pub async fn delete_metadata(
  Extension(admin): Extension<AdminPrincipal>,
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Batch>> {
  let deleted = batch::delete_batch(id).await?;
  info!(
    "Batch {id} metadata deleted | operator: {} | blobs under {} left in place",
    admin.subject, deleted.storage_path
  );
  Ok(Json(deleted))
}
