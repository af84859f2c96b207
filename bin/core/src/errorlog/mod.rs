use anyhow::Context;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use depot_client::{
  api::{
    admin::{ErrorLogQuery, Paginated},
    agent::ErrorReport,
  },
  entities::{ErrorLog, depot_timestamp},
};
use uuid::Uuid;

use crate::{
  error::{DomainError, DomainResult},
  state::{Counters, counters, db_client},
};

/// Appends one error log row.
///
/// Batch-associated writes also flip the batch `has_errors` flag,
/// best effort: if the batch row is already gone the error is still
/// recorded with its batch id.
pub async fn append(
  site_id: Uuid,
  batch_id: Option<Uuid>,
  report: ErrorReport,
) -> DomainResult<ErrorLog> {
  if report.r#type.trim().is_empty() {
    return Err(DomainError::Validation(String::from(
      "Error type must not be empty",
    )));
  }
  if report.message.is_empty() {
    return Err(DomainError::Validation(String::from(
      "Error message must not be empty",
    )));
  }
  let now = depot_timestamp();
  let occurred_at = report.occurred_at.unwrap_or(now);

  let log = match
    insert(site_id, batch_id, &report, occurred_at, now).await
  {
    Ok(log) => log,
    Err(first) => {
      // The target partition may not exist yet (eg a backdated
      // occurred_at). Create it and retry once; the DDL is
      // idempotent.
      debug!(
        "Error log insert failed, ensuring partition and retrying | {first:?}"
      );
      ensure_partition(occurred_at).await?;
      insert(site_id, batch_id, &report, occurred_at, now)
        .await
        .map_err(DomainError::from)?
    }
  };

  if let Some(batch_id) = batch_id {
    let updated = sqlx::query(
      "UPDATE batches SET has_errors = TRUE WHERE id = $1",
    )
    .bind(batch_id)
    .execute(&db_client().pool)
    .await?
    .rows_affected();
    if updated == 0 {
      debug!(
        "Error log {} references missing batch {batch_id}",
        log.id
      );
    }
  }

  Counters::increment(&counters().errors_recorded);
  Ok(log)
}

async fn insert(
  site_id: Uuid,
  batch_id: Option<Uuid>,
  report: &ErrorReport,
  occurred_at: DateTime<Utc>,
  created_at: DateTime<Utc>,
) -> Result<ErrorLog, sqlx::Error> {
  sqlx::query_as::<_, ErrorLog>(
    "INSERT INTO error_logs
       (id, site_id, batch_id, type, title, message,
        stack_trace, client_version, metadata, occurred_at, created_at)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
     RETURNING *",
  )
  .bind(Uuid::new_v4())
  .bind(site_id)
  .bind(batch_id)
  .bind(report.r#type.trim())
  .bind(&report.title)
  .bind(&report.message)
  .bind(&report.stack_trace)
  .bind(&report.client_version)
  .bind(&report.metadata)
  .bind(occurred_at)
  .bind(created_at)
  .fetch_one(&db_client().pool)
  .await
}

pub async fn get_error_log(
  id: Uuid,
) -> DomainResult<Option<ErrorLog>> {
  let log = sqlx::query_as::<_, ErrorLog>(
    "SELECT * FROM error_logs WHERE id = $1",
  )
  .bind(id)
  .fetch_optional(&db_client().pool)
  .await?;
  Ok(log)
}

const FILTER: &str = "($1::uuid IS NULL OR site_id = $1)
  AND ($2::text IS NULL OR type = $2)
  AND ($3::timestamptz IS NULL OR occurred_at >= $3)
  AND ($4::timestamptz IS NULL OR occurred_at <= $4)";

pub async fn list(
  query: &ErrorLogQuery,
) -> DomainResult<Paginated<ErrorLog>> {
  let pool = &db_client().pool;
  let total: i64 = sqlx::query_scalar(&format!(
    "SELECT count(*) FROM error_logs WHERE {FILTER}"
  ))
  .bind(query.site_id)
  .bind(query.r#type.as_deref())
  .bind(query.from)
  .bind(query.to)
  .fetch_one(pool)
  .await?;
  let items = sqlx::query_as::<_, ErrorLog>(&format!(
    "SELECT * FROM error_logs WHERE {FILTER}
     ORDER BY occurred_at DESC
     LIMIT $5 OFFSET $6"
  ))
  .bind(query.site_id)
  .bind(query.r#type.as_deref())
  .bind(query.from)
  .bind(query.to)
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

/// Unpaginated export; callers are expected to bound the range.
pub async fn export_csv(
  query: &ErrorLogQuery,
) -> DomainResult<Vec<u8>> {
  let logs = sqlx::query_as::<_, ErrorLog>(&format!(
    "SELECT * FROM error_logs WHERE {FILTER}
     ORDER BY occurred_at"
  ))
  .bind(query.site_id)
  .bind(query.r#type.as_deref())
  .bind(query.from)
  .bind(query.to)
  .fetch_all(&db_client().pool)
  .await?;
  render_csv(&logs)
}

/// Fixed column order; RFC 4180 quoting (fields containing commas,
/// quotes or newlines are quoted, internal quotes doubled).
fn render_csv(logs: &[ErrorLog]) -> DomainResult<Vec<u8>> {
  fn render(logs: &[ErrorLog]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
      "id",
      "batchId",
      "siteId",
      "type",
      "message",
      "metadata",
      "occurredAt",
    ])?;
    for log in logs {
      writer.write_record([
        log.id.to_string(),
        log
          .batch_id
          .map(|id| id.to_string())
          .unwrap_or_default(),
        log.site_id.to_string(),
        log.r#type.clone(),
        log.message.clone(),
        serde_json::to_string(&log.metadata)
          .unwrap_or_else(|_| String::from("{}")),
        log.occurred_at.to_rfc3339(),
      ])?;
    }
    writer
      .into_inner()
      .map_err(|e| anyhow::anyhow!("{e}"))
  }
  render(logs)
    .context("Failed to render error log CSV")
    .map_err(DomainError::from)
}

/// `error_logs_YYYY_MM`.
pub fn partition_name(at: DateTime<Utc>) -> String {
  format!("error_logs_{}_{:02}", at.year(), at.month())
}

/// Creates the month partition covering `at` if it does not exist.
pub async fn ensure_partition(
  at: DateTime<Utc>,
) -> DomainResult<()> {
  let (from, to) = month_bounds(at)?;
  let name = partition_name(at);
  sqlx::query(&format!(
    "CREATE TABLE IF NOT EXISTS {name} PARTITION OF error_logs
     FOR VALUES FROM ('{}') TO ('{}')",
    from.to_rfc3339(),
    to.to_rfc3339(),
  ))
  .execute(&db_client().pool)
  .await?;
  debug!("Ensured error log partition {name}");
  Ok(())
}

/// First instants of the month containing `at` and of the next
/// month.
fn month_bounds(
  at: DateTime<Utc>,
) -> DomainResult<(DateTime<Utc>, DateTime<Utc>)> {
  let start = NaiveDate::from_ymd_opt(at.year(), at.month(), 1)
    .context("Invalid timestamp")?;
  let next = if at.month() == 12 {
    NaiveDate::from_ymd_opt(at.year() + 1, 1, 1)
  } else {
    NaiveDate::from_ymd_opt(at.year(), at.month() + 1, 1)
  }
  .context("Invalid timestamp")?;
  let as_utc = |date: NaiveDate| {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
  };
  Ok((as_utc(start), as_utc(next)))
}

/// The instant the partition maintainer pre-creates the next
/// partition: used both at bootstrap and by the monthly tick.
pub fn next_month(at: DateTime<Utc>) -> DateTime<Utc> {
  month_bounds(at)
    .map(|(_, next)| next)
    .expect("month arithmetic cannot fail for valid timestamps")
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  fn log(message: &str, metadata: serde_json::Value) -> ErrorLog {
    ErrorLog {
      id: Uuid::nil(),
      site_id: Uuid::nil(),
      batch_id: None,
      r#type: String::from("UPLOAD_FAILED"),
      title: String::from("upload failed"),
      message: message.to_string(),
      stack_trace: None,
      client_version: None,
      metadata,
      occurred_at: Utc
        .with_ymd_and_hms(2025, 3, 7, 9, 5, 0)
        .unwrap(),
      created_at: Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap(),
    }
  }

  #[test]
  fn csv_has_fixed_header_and_quotes_specials() {
    let logs = [
      log("plain", json!({})),
      log("with, comma", json!({})),
      log("with \"quotes\"", json!({})),
      log("with\nnewline", json!({ "attempt": 2, "file": "a.gz" })),
    ];
    let csv = String::from_utf8(render_csv(&logs).unwrap()).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
      lines.next().unwrap(),
      "id,batchId,siteId,type,message,metadata,occurredAt"
    );
    assert!(csv.contains("\"with, comma\""));
    assert!(csv.contains("\"with \"\"quotes\"\"\""));
    assert!(csv.contains("\"with\nnewline\""));
    // Non-empty metadata serializes as JSON, which the writer quotes
    // and whose inner quotes it doubles.
    assert!(
      csv.contains("\"{\"\"attempt\"\":2,\"\"file\"\":\"\"a.gz\"\"}\"")
    );
  }

  #[test]
  fn partition_names_and_bounds() {
    let at = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
    assert_eq!(partition_name(at), "error_logs_2025_12");
    let (from, to) = month_bounds(at).unwrap();
    assert_eq!(from.to_rfc3339(), "2025-12-01T00:00:00+00:00");
    assert_eq!(to.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    assert_eq!(
      partition_name(next_month(at)),
      "error_logs_2026_01"
    );
  }
}
