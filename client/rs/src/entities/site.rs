use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A data source belonging to exactly one Account.
///
/// The `domain` is the public identifier agents authenticate with
/// (`domain:clientSecret` over HTTP Basic) and is embedded in every
/// batch storage path. The account relationship is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Site {
  pub id: Uuid,
  /// Immutable owner.
  pub account_id: Uuid,
  /// Globally unique agent identity, eg `store-01.example.com`.
  pub domain: String,
  /// bcrypt hash of the server-generated client secret.
  /// The plaintext is returned exactly once, on creation.
  /// Never serialized.
  #[serde(skip)]
  pub client_secret_hash: String,
  pub display_name: String,
  /// Inactive sites cannot mint tokens or start new batches.
  /// In-flight batches are left to finish or expire.
  pub active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
