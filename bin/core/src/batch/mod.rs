use chrono::Duration;
use depot_client::{
  api::admin::{BatchDetail, BatchQuery, Paginated},
  entities::{
    Batch, BatchStatus, UploadedFile, batch_storage_path,
    depot_timestamp,
  },
};
use uuid::Uuid;

use crate::{
  auth::AgentPrincipal,
  config::core_config,
  error::{DomainError, DomainResult},
  helpers::unique_violation,
  state::{Counters, counters, db_client},
};

/// Client-driven transitions out of IN_PROGRESS. Reaping is separate
/// ([reap_expired]) and reserved for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Complete,
  Fail,
  Cancel,
}

impl Transition {
  fn target(self) -> BatchStatus {
    match self {
      Transition::Complete => BatchStatus::Completed,
      Transition::Fail => BatchStatus::Failed,
      Transition::Cancel => BatchStatus::Cancelled,
    }
  }
}

/// Opens a batch for the calling site.
///
/// One transaction covering the only read-then-write span in the
/// system: the account row is locked, the IN_PROGRESS count checked
/// against the per-account cap, then the row inserted. The partial
/// unique index on `(site_id) WHERE IN_PROGRESS` is the correctness
/// backstop for the one-per-site rule; a violation there surfaces as
/// ActiveBatchExists.
pub async fn start_batch(
  principal: &AgentPrincipal,
) -> DomainResult<Batch> {
  let config = core_config();
  let mut tx = db_client().pool.begin().await?;

  // Pessimistic lock on the aggregate: serializes starts per account.
  sqlx::query_scalar::<_, Uuid>(
    "SELECT id FROM accounts WHERE id = $1 FOR UPDATE",
  )
  .bind(principal.account_id)
  .fetch_optional(&mut *tx)
  .await?
  .ok_or(DomainError::NotFound("Account"))?;

  let in_progress: i64 = sqlx::query_scalar(
    "SELECT count(*) FROM batches
     WHERE account_id = $1 AND status = 'IN_PROGRESS'",
  )
  .bind(principal.account_id)
  .fetch_one(&mut *tx)
  .await?;
  if in_progress >= config.max_concurrent_batches_per_account {
    return Err(DomainError::ConcurrencyLimit);
  }

  let started_at = depot_timestamp();
  let storage_path = batch_storage_path(
    principal.account_id,
    &principal.domain,
    started_at,
  );
  let batch = sqlx::query_as::<_, Batch>(
    "INSERT INTO batches
       (id, account_id, site_id, status, storage_path,
        uploaded_files_count, total_size, has_errors,
        started_at, completed_at, created_at)
     VALUES ($1, $2, $3, 'IN_PROGRESS', $4, 0, 0, FALSE, $5, NULL, $5)
     RETURNING *",
  )
  .bind(Uuid::new_v4())
  .bind(principal.account_id)
  .bind(principal.site_id)
  .bind(&storage_path)
  .bind(started_at)
  .fetch_one(&mut *tx)
  .await
  .map_err(|e| {
    if unique_violation(&e, Some("batches_one_in_progress_per_site"))
    {
      DomainError::ActiveBatchExists
    } else {
      DomainError::from(e)
    }
  })?;
  tx.commit().await?;

  Counters::increment(&counters().batches_started);
  debug!(
    "Batch {} started | site: {} | path: {storage_path}",
    batch.id, principal.domain
  );
  Ok(batch)
}

pub async fn get_batch(id: Uuid) -> DomainResult<Batch> {
  sqlx::query_as::<_, Batch>("SELECT * FROM batches WHERE id = $1")
    .bind(id)
    .fetch_optional(&db_client().pool)
    .await?
    .ok_or(DomainError::NotFound("Batch"))
}

/// Re-derives the owning site from the batch row and compares it to
/// the principal. A mismatch is 403, never 404, so agents cannot
/// probe for foreign batch ids.
pub fn ensure_owned(
  batch: &Batch,
  principal: &AgentPrincipal,
) -> DomainResult<()> {
  if batch.site_id == principal.site_id {
    Ok(())
  } else {
    Err(DomainError::OwnershipDenied)
  }
}

/// Applies a client-driven terminal transition. Terminal states are
/// absorbing: anything but IN_PROGRESS fails with InvalidState inside
/// the same transaction that applies the update.
pub async fn transition_batch(
  id: Uuid,
  transition: Transition,
) -> DomainResult<Batch> {
  let mut tx = db_client().pool.begin().await?;
  let batch = sqlx::query_as::<_, Batch>(
    "SELECT * FROM batches WHERE id = $1 FOR UPDATE",
  )
  .bind(id)
  .fetch_optional(&mut *tx)
  .await?
  .ok_or(DomainError::NotFound("Batch"))?;
  if batch.status != BatchStatus::InProgress {
    return Err(DomainError::InvalidState(format!(
      "Batch is {}, only IN_PROGRESS batches can transition",
      batch.status
    )));
  }
  let batch = sqlx::query_as::<_, Batch>(
    "UPDATE batches
     SET status = $2,
         completed_at = $3,
         has_errors = has_errors OR $4
     WHERE id = $1
     RETURNING *",
  )
  .bind(id)
  .bind(transition.target())
  .bind(depot_timestamp())
  .bind(transition == Transition::Fail)
  .fetch_one(&mut *tx)
  .await?;
  tx.commit().await?;

  Counters::increment(&counters().batches_finalized);
  debug!("Batch {id} transitioned to {}", batch.status);
  Ok(batch)
}

/// Transitions every IN_PROGRESS batch older than the configured
/// timeout to NOT_COMPLETED. Each batch gets its own transaction, and
/// the guarded UPDATE skips any batch that raced to a terminal state,
/// so reaping is idempotent and never holds a long lock.
pub async fn reap_expired() -> DomainResult<u64> {
  let config = core_config();
  let cutoff = depot_timestamp()
    - Duration::minutes(config.batch_timeout as i64);
  let expired = sqlx::query_scalar::<_, Uuid>(
    "SELECT id FROM batches
     WHERE status = 'IN_PROGRESS' AND started_at < $1",
  )
  .bind(cutoff)
  .fetch_all(&db_client().pool)
  .await?;

  let mut reaped = 0;
  for id in expired {
    let updated = sqlx::query(
      "UPDATE batches
       SET status = 'NOT_COMPLETED', completed_at = $2
       WHERE id = $1 AND status = 'IN_PROGRESS'",
    )
    .bind(id)
    .bind(depot_timestamp())
    .execute(&db_client().pool)
    .await?
    .rows_affected();
    if updated == 1 {
      info!("Batch {id} timed out, moved to NOT_COMPLETED");
      Counters::increment(&counters().batches_reaped);
      reaped += 1;
    }
  }
  Ok(reaped)
}

pub async fn list_batches(
  query: BatchQuery,
) -> DomainResult<Paginated<Batch>> {
  let pool = &db_client().pool;
  let total: i64 = sqlx::query_scalar(
    "SELECT count(*) FROM batches
     WHERE ($1::uuid IS NULL OR site_id = $1)
       AND ($2::batch_status IS NULL OR status = $2)",
  )
  .bind(query.site_id)
  .bind(query.status)
  .fetch_one(pool)
  .await?;
  let items = sqlx::query_as::<_, Batch>(
    "SELECT * FROM batches
     WHERE ($1::uuid IS NULL OR site_id = $1)
       AND ($2::batch_status IS NULL OR status = $2)
     ORDER BY started_at DESC
     LIMIT $3 OFFSET $4",
  )
  .bind(query.site_id)
  .bind(query.status)
  .bind(query.pagination().limit())
  .bind(query.pagination().offset())
  .fetch_all(pool)
  .await?;
  Ok(Paginated {
    items,
    page: query.page.max(0),
    page_size: query.pagination().limit(),
    total,
  })
}

pub async fn batch_detail(id: Uuid) -> DomainResult<BatchDetail> {
  let batch = get_batch(id).await?;
  let domain: String =
    sqlx::query_scalar("SELECT domain FROM sites WHERE id = $1")
      .bind(batch.site_id)
      .fetch_one(&db_client().pool)
      .await?;
  let files = files_for_batch(id).await?;
  Ok(BatchDetail {
    batch,
    domain,
    files,
  })
}

pub async fn files_for_batch(
  batch_id: Uuid,
) -> DomainResult<Vec<UploadedFile>> {
  let files = sqlx::query_as::<_, UploadedFile>(
    "SELECT * FROM uploaded_files
     WHERE batch_id = $1
     ORDER BY uploaded_at",
  )
  .bind(batch_id)
  .fetch_all(&db_client().pool)
  .await?;
  Ok(files)
}

/// Deletes the batch row; uploaded_files rows go with it via the
/// schema cascade. Objects in the store are deliberately untouched,
/// removing blobs is a separate explicit action.
pub async fn delete_batch(id: Uuid) -> DomainResult<Batch> {
  sqlx::query_as::<_, Batch>(
    "DELETE FROM batches WHERE id = $1 RETURNING *",
  )
  .bind(id)
  .fetch_optional(&db_client().pool)
  .await?
  .ok_or(DomainError::NotFound("Batch"))
}
