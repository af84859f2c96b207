use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One error reported by a site agent.
///
/// Error logs are append-only and immutable after insert. The backing
/// table is range-partitioned by `occurred_at` on month boundaries
/// (`error_logs_YYYY_MM`), so the primary key is `(id, occurred_at)`.
///
/// `batch_id` is null for site-level errors. A batch-associated write
/// also flips the batch `has_errors` flag (best effort: the error is
/// recorded even if the batch row is already gone).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ErrorLog {
  pub id: Uuid,
  pub site_id: Uuid,
  pub batch_id: Option<Uuid>,
  /// Coarse classification chosen by the agent, eg `UPLOAD_FAILED`.
  #[cfg_attr(feature = "sqlx", sqlx(rename = "type"))]
  pub r#type: String,
  pub title: String,
  pub message: String,
  pub stack_trace: Option<String>,
  pub client_version: Option<String>,
  /// Free-form structured context.
  pub metadata: serde_json::Value,
  pub occurred_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
}
