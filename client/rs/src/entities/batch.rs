use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A bounded upload session owned by a Site.
///
/// Lifecycle: a batch starts IN_PROGRESS and moves exactly once into
/// one of the terminal states. Terminal states are absorbing.
/// At most one batch per site is IN_PROGRESS at any instant; this is
/// backed by a partial unique index, not in-process coordination, so
/// it holds across any number of Core processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Batch {
  pub id: Uuid,
  pub account_id: Uuid,
  pub site_id: Uuid,
  pub status: BatchStatus,
  /// `{account_id}/{domain}/{YYYY-MM-DD}/{HH-MM}/`, derived once at
  /// creation from `started_at` (UTC). Immutable.
  pub storage_path: String,
  /// Number of committed UploadedFile rows. Updated only while
  /// IN_PROGRESS, serialized by the row lock taken at commit.
  pub uploaded_files_count: i64,
  /// Sum of committed file sizes in bytes.
  pub total_size: i64,
  /// Monotonic false -> true. Set by batch-associated error reports
  /// and by the `fail` transition.
  pub has_errors: bool,
  pub started_at: DateTime<Utc>,
  /// Set iff `status` is terminal.
  pub completed_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
  feature = "sqlx",
  sqlx(type_name = "batch_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
  InProgress,
  Completed,
  NotCompleted,
  Failed,
  Cancelled,
}

impl BatchStatus {
  /// Any status other than IN_PROGRESS. Once entered, immutable.
  pub fn is_terminal(self) -> bool {
    self != BatchStatus::InProgress
  }
}

/// Metadata for one committed upload inside a Batch.
///
/// A row exists only if the object was written to the store first;
/// the inverse does not hold (a crash between the store write and the
/// metadata commit leaves an orphan blob, which is acceptable).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
  pub id: Uuid,
  pub batch_id: Uuid,
  /// Unique within the batch. A committed name cannot be re-uploaded;
  /// a failed upload leaves no row, so retrying the name is allowed.
  pub original_file_name: String,
  /// `storage_path + original_file_name`. Immutable.
  pub storage_key: String,
  /// Strictly positive.
  pub file_size: i64,
  pub content_type: String,
  /// SHA-256 of the request body, hex encoded, computed while the
  /// body was streamed in.
  pub checksum: String,
  pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_serializes_screaming_snake() {
    assert_eq!(
      serde_json::to_string(&BatchStatus::InProgress).unwrap(),
      "\"IN_PROGRESS\""
    );
    assert_eq!(
      serde_json::to_string(&BatchStatus::NotCompleted).unwrap(),
      "\"NOT_COMPLETED\""
    );
    assert_eq!(BatchStatus::Cancelled.to_string(), "CANCELLED");
  }

  #[test]
  fn only_in_progress_is_non_terminal() {
    assert!(!BatchStatus::InProgress.is_terminal());
    for status in [
      BatchStatus::Completed,
      BatchStatus::NotCompleted,
      BatchStatus::Failed,
      BatchStatus::Cancelled,
    ] {
      assert!(status.is_terminal());
    }
  }
}
