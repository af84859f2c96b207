use axum::{
  Extension, Json,
  extract::{Path, Query},
  http::StatusCode,
};
use depot_client::{
  api::admin::{
    CreateAccount, Paginated, Pagination, UpdateAccount,
  },
  entities::Account,
};
use uuid::Uuid;

use crate::{
  auth::admin::AdminPrincipal,
  error::{DomainError, DomainResult},
  resource::account,
};

pub async fn create(
  Extension(admin): Extension<AdminPrincipal>,
  Json(request): Json<CreateAccount>,
) -> DomainResult<(StatusCode, Json<Account>)> {
  let created = account::create_account(request).await?;
  info!(
    "Account {} created | operator: {}",
    created.id, admin.subject
  );
  Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list(
  Query(pagination): Query<Pagination>,
) -> DomainResult<Json<Paginated<Account>>> {
  Ok(Json(account::list_accounts(pagination).await?))
}

pub async fn get_one(
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Account>> {
  account::get_account(id)
    .await?
    .map(Json)
    .ok_or(DomainError::NotFound("Account"))
}

pub async fn update(
  Extension(admin): Extension<AdminPrincipal>,
  Path(id): Path<Uuid>,
  Json(request): Json<UpdateAccount>,
) -> DomainResult<Json<Account>> {
  let updated = account::update_account(id, request).await?;
  info!("Account {id} updated | operator: {}", admin.subject);
  Ok(Json(updated))
}

/// Soft delete: flips the account inactive and cascades to every
/// owned site in the same transaction. There is no hard delete.
pub async fn deactivate(
  Extension(admin): Extension<AdminPrincipal>,
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Account>> {
  let deactivated = account::deactivate_account(id).await?;
  info!(
    "Account {id} deactivated | operator: {}",
    admin.subject
  );
  Ok(Json(deactivated))
}
