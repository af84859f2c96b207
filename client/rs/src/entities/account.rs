use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant. Accounts own Sites, and Sites own Batches.
///
/// Accounts are created by administrators and are only ever
/// soft-deleted: `active` flips to false and every owned Site is
/// deactivated in the same transaction. Destruction is forbidden at
/// the domain level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Account {
  pub id: Uuid,
  /// Globally unique. Stored lowercase, matched case-insensitively.
  pub email: String,
  pub name: String,
  /// False after deactivation. Inactive accounts cannot own new
  /// batches because all their sites are inactive.
  pub active: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
