use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod admin;
pub mod agent;

/// The structured body every Depot error response carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
  /// HTTP status code.
  pub status: u16,
  /// Stable machine-readable code, eg `ACTIVE_BATCH_EXISTS`.
  pub error: String,
  /// Human-readable detail. Intentionally generic for
  /// authentication failures.
  pub message: String,
  /// Path of the failing request.
  pub path: String,
  pub timestamp: DateTime<Utc>,
}
