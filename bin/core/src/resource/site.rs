use depot_client::{
  api::admin::{
    CreateSite, CreateSiteResponse, Paginated, Pagination, UpdateSite,
  },
  entities::{Site, depot_timestamp, random_string},
};
use uuid::Uuid;

use crate::{
  error::{DomainError, DomainResult},
  helpers::unique_violation,
  resource::account::get_account,
  state::db_client,
};

/// Length of the generated plaintext client secret.
const CLIENT_SECRET_LENGTH: usize = 48;

/// Creates the site with a server-generated client secret. Only the
/// bcrypt hash is stored; the plaintext in the response is the one
/// time it is ever visible.
pub async fn create_site(
  request: CreateSite,
) -> DomainResult<CreateSiteResponse> {
  let domain = normalize_domain(&request.domain)?;
  let account = get_account(request.account_id)
    .await?
    .ok_or(DomainError::NotFound("Account"))?;
  if !account.active {
    return Err(DomainError::InvalidState(String::from(
      "Cannot create a site under a deactivated account",
    )));
  }

  let client_secret = random_string(CLIENT_SECRET_LENGTH);
  let client_secret_hash =
    bcrypt::hash(&client_secret, bcrypt::DEFAULT_COST)
      .map_err(|e| anyhow::Error::from(e).context("bcrypt failed"))?;

  let now = depot_timestamp();
  let site = sqlx::query_as::<_, Site>(
    "INSERT INTO sites
       (id, account_id, domain, client_secret_hash, display_name, active, created_at, updated_at)
     VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6)
     RETURNING *",
  )
  .bind(Uuid::new_v4())
  .bind(account.id)
  .bind(&domain)
  .bind(&client_secret_hash)
  .bind(request.display_name.trim())
  .bind(now)
  .fetch_one(&db_client().pool)
  .await
  .map_err(|e| {
    if unique_violation(&e, Some("sites_domain_key")) {
      DomainError::Conflict(format!(
        "A site with domain {domain} already exists"
      ))
    } else {
      e.into()
    }
  })?;

  Ok(CreateSiteResponse {
    site,
    client_secret,
  })
}

pub async fn get_site(id: Uuid) -> DomainResult<Option<Site>> {
  let site =
    sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = $1")
      .bind(id)
      .fetch_optional(&db_client().pool)
      .await?;
  Ok(site)
}

pub async fn find_by_domain(
  domain: &str,
) -> DomainResult<Option<Site>> {
  let site = sqlx::query_as::<_, Site>(
    "SELECT * FROM sites WHERE domain = lower($1)",
  )
  .bind(domain.trim())
  .fetch_optional(&db_client().pool)
  .await?;
  Ok(site)
}

pub async fn list_sites(
  pagination: Pagination,
) -> DomainResult<Paginated<Site>> {
  let pool = &db_client().pool;
  let total: i64 = sqlx::query_scalar("SELECT count(*) FROM sites")
    .fetch_one(pool)
    .await?;
  let items = sqlx::query_as::<_, Site>(
    "SELECT * FROM sites ORDER BY created_at DESC LIMIT $1 OFFSET $2",
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

pub async fn update_site(
  id: Uuid,
  update: UpdateSite,
) -> DomainResult<Site> {
  sqlx::query_as::<_, Site>(
    "UPDATE sites
     SET display_name = coalesce($2, display_name),
         updated_at = $3
     WHERE id = $1
     RETURNING *",
  )
  .bind(id)
  .bind(update.display_name.as_deref().map(str::trim))
  .bind(depot_timestamp())
  .fetch_optional(&db_client().pool)
  .await?
  .ok_or(DomainError::NotFound("Site"))
}

/// Blocks future token mints and batch starts. In-flight batches are
/// untouched and run to completion or expiry.
pub async fn deactivate_site(id: Uuid) -> DomainResult<Site> {
  sqlx::query_as::<_, Site>(
    "UPDATE sites SET active = FALSE, updated_at = $2
     WHERE id = $1
     RETURNING *",
  )
  .bind(id)
  .bind(depot_timestamp())
  .fetch_optional(&db_client().pool)
  .await?
  .ok_or(DomainError::NotFound("Site"))
}

fn normalize_domain(domain: &str) -> DomainResult<String> {
  let domain = domain.trim().to_lowercase();
  let valid = !domain.is_empty()
    && domain.len() <= 253
    && domain.split('.').all(|label| {
      !label.is_empty()
        && label
          .chars()
          .all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
    });
  if valid {
    Ok(domain)
  } else {
    Err(DomainError::Validation(format!(
      "Invalid site domain: {domain}"
    )))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn domain_normalization() {
    assert_eq!(
      normalize_domain(" Store-01.Example.COM ").unwrap(),
      "store-01.example.com"
    );
    assert_eq!(normalize_domain("localhost").unwrap(), "localhost");
    assert!(normalize_domain("").is_err());
    assert!(normalize_domain("bad domain.com").is_err());
    assert!(normalize_domain("trailing-.com").is_err());
    assert!(normalize_domain("double..dot").is_err());
  }
}
