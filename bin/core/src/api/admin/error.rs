use axum::{
  Json,
  extract::Query,
  http::header,
  response::IntoResponse,
};
use depot_client::{
  api::admin::{ErrorLogQuery, Paginated},
  entities::ErrorLog,
};

use crate::{error::DomainResult, errorlog};

pub async fn list(
  Query(query): Query<ErrorLogQuery>,
) -> DomainResult<Json<Paginated<ErrorLog>>> {
  Ok(Json(errorlog::list(&query).await?))
}

/// CSV download. Not paginated; pass a bounded occurredAt range.
pub async fn export(
  Query(query): Query<ErrorLogQuery>,
) -> DomainResult<impl IntoResponse> {
  let csv = errorlog::export_csv(&query).await?;
  Ok((
    [
      (header::CONTENT_TYPE, "text/csv"),
      (
        header::CONTENT_DISPOSITION,
        "attachment; filename=\"error-logs.csv\"",
      ),
    ],
    csv,
  ))
}
