use sqlx::error::ErrorKind;

/// Whether the error is a unique-constraint violation, optionally on
/// one specific constraint. Uniqueness violations encode correctness
/// (they are how races surface) and are never retried.
pub fn unique_violation(
  e: &sqlx::Error,
  constraint: Option<&str>,
) -> bool {
  match e {
    sqlx::Error::Database(db) => {
      db.kind() == ErrorKind::UniqueViolation
        && match constraint {
          Some(constraint) => db.constraint() == Some(constraint),
          None => true,
        }
    }
    _ => false,
  }
}
