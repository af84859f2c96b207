use axum::{
  Extension, Json,
  extract::{Multipart, Path},
  http::StatusCode,
};
use depot_client::api::agent::UploadResponse;
use uuid::Uuid;

use crate::{
  auth::AgentPrincipal,
  batch,
  error::{DomainError, DomainResult},
  upload::{Spool, ingest_file, validate_target},
};

/// `POST /batch/{id}/upload`, multipart. Every file part runs the
/// full three-phase pipeline independently; the first failure aborts
/// the call (already-committed parts stay committed, exactly as if
/// they had been separate calls).
pub async fn upload(
  Extension(principal): Extension<AgentPrincipal>,
  Path(id): Path<Uuid>,
  mut multipart: Multipart,
) -> DomainResult<(StatusCode, Json<UploadResponse>)> {
  let mut files = Vec::new();
  while let Some(mut field) = multipart
    .next_field()
    .await
    .map_err(|e| DomainError::Validation(e.to_string()))?
  {
    let Some(file_name) = field.file_name().map(str::to_string)
    else {
      // Non-file parts carry nothing the pipeline stores.
      continue;
    };
    let content_type = field
      .content_type()
      .unwrap_or("application/octet-stream")
      .to_string();

    // Phase A: validate, then stream the part into the spool while
    // the digest runs. A dropped client aborts here, before any
    // object store or metadata write.
    let target =
      validate_target(id, &principal, &file_name).await?;
    let mut spool = Spool::new();
    while let Some(chunk) = field
      .chunk()
      .await
      .map_err(|e| DomainError::Validation(e.to_string()))?
    {
      spool.write_chunk(&chunk)?;
    }

    // Phases B + C.
    let file =
      ingest_file(&target, &file_name, &content_type, spool).await?;
    files.push(file);
  }

  if files.is_empty() {
    return Err(DomainError::Validation(String::from(
      "Multipart body contained no file parts",
    )));
  }

  // Re-read for the post-commit counters.
  let batch = batch::get_batch(id).await?;
  Ok((
    StatusCode::CREATED,
    Json(UploadResponse {
      uploaded_files: batch.uploaded_files_count,
      files,
    }),
  ))
}
