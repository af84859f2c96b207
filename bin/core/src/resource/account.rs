use depot_client::{
  api::admin::{CreateAccount, Paginated, Pagination, UpdateAccount},
  entities::{Account, depot_timestamp},
};
use uuid::Uuid;

use crate::{
  error::{DomainError, DomainResult},
  helpers::unique_violation,
  state::db_client,
};

pub async fn create_account(
  request: CreateAccount,
) -> DomainResult<Account> {
  let email = normalize_email(&request.email)?;
  if request.name.trim().is_empty() {
    return Err(DomainError::Validation(
      String::from("Account name must not be empty"),
    ));
  }
  let now = depot_timestamp();
  sqlx::query_as::<_, Account>(
    "INSERT INTO accounts (id, email, name, active, created_at, updated_at)
     VALUES ($1, $2, $3, TRUE, $4, $4)
     RETURNING *",
  )
  .bind(Uuid::new_v4())
  .bind(&email)
  .bind(request.name.trim())
  .bind(now)
  .fetch_one(&db_client().pool)
  .await
  .map_err(|e| {
    if unique_violation(&e, Some("accounts_email_key")) {
      DomainError::Conflict(format!(
        "An account with email {email} already exists"
      ))
    } else {
      e.into()
    }
  })
}

pub async fn get_account(
  id: Uuid,
) -> DomainResult<Option<Account>> {
  let account = sqlx::query_as::<_, Account>(
    "SELECT * FROM accounts WHERE id = $1",
  )
  .bind(id)
  .fetch_optional(&db_client().pool)
  .await?;
  Ok(account)
}

pub async fn list_accounts(
  pagination: Pagination,
) -> DomainResult<Paginated<Account>> {
  let pool = &db_client().pool;
  let total: i64 =
    sqlx::query_scalar("SELECT count(*) FROM accounts")
      .fetch_one(pool)
      .await?;
  let items = sqlx::query_as::<_, Account>(
    "SELECT * FROM accounts ORDER BY created_at DESC LIMIT $1 OFFSET $2",
  )
  .bind(pagination.limit())
  .bind(pagination.offset())
  .fetch_all(pool)
  .await?;
  Ok(Paginated {
    items,
    page: pagination.page.max(0),
    page_size: pagination.limit(),
    total,
  })
}

pub async fn update_account(
  id: Uuid,
  update: UpdateAccount,
) -> DomainResult<Account> {
  let email = update
    .email
    .as_deref()
    .map(normalize_email)
    .transpose()?;
  if let Some(name) = &update.name
    && name.trim().is_empty()
  {
    return Err(DomainError::Validation(
      String::from("Account name must not be empty"),
    ));
  }
  sqlx::query_as::<_, Account>(
    "UPDATE accounts
     SET email = coalesce($2, email),
         name = coalesce($3, name),
         updated_at = $4
     WHERE id = $1
     RETURNING *",
  )
  .bind(id)
  .bind(email)
  .bind(update.name.as_deref().map(str::trim))
  .bind(depot_timestamp())
  .fetch_optional(&db_client().pool)
  .await
  .map_err(|e| {
    if unique_violation(&e, Some("accounts_email_key")) {
      DomainError::Conflict(String::from(
        "Another account already uses this email",
      ))
    } else {
      DomainError::from(e)
    }
  })?
  .ok_or(DomainError::NotFound("Account"))
}

/// Soft delete. In the same transaction, every active site owned by
/// the account is deactivated, which is what blocks new token mints
/// and new batches. In-flight batches are left to complete or
/// expire.
pub async fn deactivate_account(id: Uuid) -> DomainResult<Account> {
  let mut tx = db_client().pool.begin().await?;
  let now = depot_timestamp();
  let account = sqlx::query_as::<_, Account>(
    "UPDATE accounts SET active = FALSE, updated_at = $2
     WHERE id = $1
     RETURNING *",
  )
  .bind(id)
  .bind(now)
  .fetch_optional(&mut *tx)
  .await?
  .ok_or(DomainError::NotFound("Account"))?;
  let sites = sqlx::query(
    "UPDATE sites SET active = FALSE, updated_at = $2
     WHERE account_id = $1 AND active",
  )
  .bind(id)
  .bind(now)
  .execute(&mut *tx)
  .await?
  .rows_affected();
  tx.commit().await?;
  info!(
    "Account {id} deactivated | {sites} owned site(s) deactivated"
  );
  Ok(account)
}

fn normalize_email(email: &str) -> DomainResult<String> {
  let email = email.trim().to_lowercase();
  let valid = email
    .split_once('@')
    .is_some_and(|(local, host)| {
      !local.is_empty() && host.contains('.') && !host.ends_with('.')
    })
    && !email.contains(char::is_whitespace);
  if valid {
    Ok(email)
  } else {
    Err(DomainError::Validation(format!(
      "Invalid email address: {email}"
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn email_normalization() {
    assert_eq!(
      normalize_email(" A@X.com ").unwrap(),
      "a@x.com"
    );
    assert!(normalize_email("not-an-email").is_err());
    assert!(normalize_email("a b@x.com").is_err());
    assert!(normalize_email("a@nodot").is_err());
    assert!(normalize_email("@x.com").is_err());
  }
}
