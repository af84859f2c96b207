use std::io::{Read, Seek, SeekFrom, Write};

use anyhow::Context;
use bytes::Bytes;
use depot_client::entities::{
  Batch, BatchStatus, UploadedFile, depot_timestamp,
};
use sha2::{Digest, Sha256};
use tempfile::SpooledTempFile;
use uuid::Uuid;

use crate::{
  auth::AgentPrincipal,
  batch::ensure_owned,
  config::core_config,
  error::{DomainError, DomainResult},
  helpers::unique_violation,
  state::{Counters, counters, db_client},
};

pub mod store;

/// Bodies up to this size spool in memory; larger ones spill to a
/// temp file.
const SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

/// Phase A, part one: load the batch and check everything that does
/// not depend on the body. Read-only; takes no locks.
pub async fn validate_target(
  batch_id: Uuid,
  principal: &AgentPrincipal,
  file_name: &str,
) -> DomainResult<Batch> {
  validate_file_name(file_name)?;
  let batch = crate::batch::get_batch(batch_id).await?;
  ensure_owned(&batch, principal)?;
  if batch.status != BatchStatus::InProgress {
    return Err(DomainError::InvalidState(format!(
      "Batch is {}, uploads are only accepted while IN_PROGRESS",
      batch.status
    )));
  }
  let exists: bool = sqlx::query_scalar(
    "SELECT EXISTS (
       SELECT 1 FROM uploaded_files
       WHERE batch_id = $1 AND original_file_name = $2
     )",
  )
  .bind(batch_id)
  .bind(file_name)
  .fetch_one(&db_client().pool)
  .await?;
  if exists {
    return Err(DomainError::Conflict(format!(
      "File {file_name} was already uploaded in this batch"
    )));
  }
  Ok(batch)
}

/// The file name becomes the last storage key segment, so anything
/// that could escape the batch prefix is rejected outright.
pub fn validate_file_name(name: &str) -> DomainResult<()> {
  let valid = !name.is_empty()
    && name.len() <= 255
    && !name.contains(['/', '\\'])
    && name != "."
    && name != ".."
    && !name.contains('\0');
  if valid {
    Ok(())
  } else {
    Err(DomainError::Validation(format!(
      "Invalid file name: {name:?}"
    )))
  }
}

/// Phase A, part two: the request body streams through here, feeding
/// the checksum digest and a spooled temp file while the size cap is
/// enforced.
pub struct Spool {
  file: SpooledTempFile,
  digest: Sha256,
  size: u64,
  max_size: u64,
}

impl Spool {
  pub fn new() -> Spool {
    Spool {
      file: SpooledTempFile::new(SPOOL_THRESHOLD),
      digest: Sha256::new(),
      size: 0,
      max_size: core_config().max_file_size,
    }
  }

  pub fn write_chunk(&mut self, chunk: &[u8]) -> DomainResult<()> {
    self.size += chunk.len() as u64;
    if self.size > self.max_size {
      return Err(DomainError::PayloadTooLarge(format!(
        "File exceeds the {} byte limit",
        self.max_size
      )));
    }
    self.digest.update(chunk);
    self
      .file
      .write_all(chunk)
      .context("Failed to spool upload body")?;
    Ok(())
  }

  /// Closes the spool: returns the body, its hex SHA-256 and size.
  pub fn finish(mut self) -> DomainResult<(Bytes, String, i64)> {
    if self.size == 0 {
      return Err(DomainError::Validation(String::from(
        "Uploaded file is empty",
      )));
    }
    let checksum = hex::encode(self.digest.finalize());
    let mut buffer = Vec::with_capacity(self.size as usize);
    self
      .file
      .seek(SeekFrom::Start(0))
      .and_then(|_| self.file.read_to_end(&mut buffer))
      .context("Failed to read back spooled upload body")?;
    Ok((Bytes::from(buffer), checksum, self.size as i64))
  }
}

/// Phases B and C for one validated, fully-spooled file.
///
/// B: object PUT with retry, no transaction held. C: re-read the
/// batch under a row lock, re-check IN_PROGRESS (it may have been
/// reaped while B ran), insert the metadata row and bump the
/// counters atomically. A failure in C after a successful B leaves
/// an orphan blob, which is the accepted residue; the inverse
/// (metadata without blob) cannot happen.
pub async fn ingest_file(
  batch: &Batch,
  file_name: &str,
  content_type: &str,
  spool: Spool,
) -> DomainResult<UploadedFile> {
  let (payload, checksum, file_size) = spool.finish()?;
  let storage_key =
    format!("{}{file_name}", batch.storage_path);

  // Phase B
  store::put_with_retry(&storage_key, payload).await?;

  // Phase C
  let mut tx = db_client().pool.begin().await?;
  let current = sqlx::query_as::<_, Batch>(
    "SELECT * FROM batches WHERE id = $1 FOR UPDATE",
  )
  .bind(batch.id)
  .fetch_optional(&mut *tx)
  .await?
  .ok_or(DomainError::NotFound("Batch"))?;
  if current.status != BatchStatus::InProgress {
    // Blob stays behind as an acceptable orphan.
    return Err(DomainError::InvalidState(format!(
      "Batch transitioned to {} during the upload",
      current.status
    )));
  }
  let file = sqlx::query_as::<_, UploadedFile>(
    "INSERT INTO uploaded_files
       (id, batch_id, original_file_name, storage_key,
        file_size, content_type, checksum, uploaded_at)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
     RETURNING *",
  )
  .bind(Uuid::new_v4())
  .bind(batch.id)
  .bind(file_name)
  .bind(&storage_key)
  .bind(file_size)
  .bind(content_type)
  .bind(&checksum)
  .bind(depot_timestamp())
  .fetch_one(&mut *tx)
  .await
  .map_err(|e| {
    if unique_violation(&e, None) {
      DomainError::Conflict(format!(
        "File {file_name} was already uploaded in this batch"
      ))
    } else {
      DomainError::from(e)
    }
  })?;
  sqlx::query(
    "UPDATE batches
     SET uploaded_files_count = uploaded_files_count + 1,
         total_size = total_size + $2
     WHERE id = $1",
  )
  .bind(batch.id)
  .bind(file_size)
  .execute(&mut *tx)
  .await?;
  tx.commit().await?;

  Counters::increment(&counters().uploads_committed);
  Counters::add(&counters().upload_bytes, file_size as u64);
  debug!(
    "Upload committed | batch: {} | key: {storage_key} | bytes: {file_size}",
    batch.id
  );
  Ok(file)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_names_cannot_escape_the_prefix() {
    assert!(validate_file_name("sales.csv.gz").is_ok());
    assert!(validate_file_name("2025-03-07 export.json").is_ok());
    assert!(validate_file_name("").is_err());
    assert!(validate_file_name("..").is_err());
    assert!(validate_file_name("a/b.csv").is_err());
    assert!(validate_file_name("a\\b.csv").is_err());
    assert!(validate_file_name(&"x".repeat(256)).is_err());
  }
}
