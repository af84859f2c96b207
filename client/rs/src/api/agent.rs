use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::UploadedFile;

/// Response of `POST /auth/token` (HTTP Basic `domain:clientSecret`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
  /// Bearer token to attach to subsequent agent requests.
  pub token: String,
  pub expires_at: DateTime<Utc>,
  pub site_id: Uuid,
  pub domain: String,
}

/// Response of `POST /batch/{id}/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
  /// Batch-wide committed file count after this call.
  pub uploaded_files: i64,
  /// The files committed by this call, in commit order.
  pub files: Vec<UploadedFile>,
}

/// Body of `POST /error` (site-level) and `POST /error/{batchId}`
/// (batch-associated).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
  /// Coarse classification, eg `UPLOAD_FAILED`.
  pub r#type: String,
  pub title: String,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stack_trace: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_version: Option<String>,
  /// Free-form structured context.
  #[serde(default = "empty_metadata")]
  pub metadata: serde_json::Value,
  /// When the error occurred at the site. Defaults to receipt time.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub occurred_at: Option<DateTime<Utc>>,
}

fn empty_metadata() -> serde_json::Value {
  serde_json::Value::Object(Default::default())
}
