use axum::{
  Extension, Json,
  extract::{Path, Query},
  http::StatusCode,
};
use depot_client::{
  api::admin::{
    CreateSite, CreateSiteResponse, Paginated, Pagination,
    UpdateSite,
  },
  entities::Site,
};
use uuid::Uuid;

use crate::{
  auth::admin::AdminPrincipal,
  error::{DomainError, DomainResult},
  resource::site,
};

/// The response carries the generated client secret, the only time
/// it is ever returned.
pub async fn create(
  Extension(admin): Extension<AdminPrincipal>,
  Json(request): Json<CreateSite>,
) -> DomainResult<(StatusCode, Json<CreateSiteResponse>)> {
  let created = site::create_site(request).await?;
  info!(
    "Site {} ({}) created | operator: {}",
    created.site.id, created.site.domain, admin.subject
  );
  Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list(
  Query(pagination): Query<Pagination>,
) -> DomainResult<Json<Paginated<Site>>> {
  Ok(Json(site::list_sites(pagination).await?))
}

pub async fn get_one(
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Site>> {
  site::get_site(id)
    .await?
    .map(Json)
    .ok_or(DomainError::NotFound("Site"))
}

pub async fn update(
  Extension(admin): Extension<AdminPrincipal>,
  Path(id): Path<Uuid>,
  Json(request): Json<UpdateSite>,
) -> DomainResult<Json<Site>> {
  let updated = site::update_site(id, request).await?;
  info!("Site {id} updated | operator: {}", admin.subject);
  Ok(Json(updated))
}

pub async fn deactivate(
  Extension(admin): Extension<AdminPrincipal>,
  Path(id): Path<Uuid>,
) -> DomainResult<Json<Site>> {
  let deactivated = site::deactivate_site(id).await?;
  info!("Site {id} deactivated | operator: {}", admin.subject);
  Ok(Json(deactivated))
}
