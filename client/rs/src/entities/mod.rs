use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;

pub mod account;
pub mod batch;
pub mod config;
pub mod error_log;
pub mod logger;
pub mod site;

pub use account::Account;
pub use batch::{Batch, BatchStatus, UploadedFile};
pub use error_log::ErrorLog;
pub use site::Site;

/// The current time as stored on every Depot timestamp field.
/// All timestamps in the system are UTC; serialization is RFC 3339.
pub fn depot_timestamp() -> DateTime<Utc> {
  Utc::now()
}

/// Random alphanumeric string of the given length.
/// Used for server-generated site client secrets.
pub fn random_string(length: usize) -> String {
  rand::rng()
    .sample_iter(&Alphanumeric)
    .take(length)
    .map(char::from)
    .collect()
}

/// Derives the immutable object-store prefix for a batch:
/// `{account_id}/{domain}/{YYYY-MM-DD}/{HH-MM}/`.
///
/// The date parts are the UTC components of the batch `started_at`.
/// Every object the batch uploads lands under this prefix, and the
/// system never writes outside it.
pub fn batch_storage_path(
  account_id: uuid::Uuid,
  domain: &str,
  started_at: DateTime<Utc>,
) -> String {
  format!(
    "{account_id}/{domain}/{}/{}/",
    started_at.format("%Y-%m-%d"),
    started_at.format("%H-%M"),
  )
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn storage_path_uses_utc_components_of_started_at() {
    let account_id = uuid::Uuid::nil();
    let started_at =
      Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 59).unwrap();
    assert_eq!(
      batch_storage_path(account_id, "store-01.example.com", started_at),
      format!("{account_id}/store-01.example.com/2025-03-07/09-05/")
    );
  }

  #[test]
  fn random_string_has_requested_length() {
    assert_eq!(random_string(40).len(), 40);
    assert_ne!(random_string(40), random_string(40));
  }
}
