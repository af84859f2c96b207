use axum::{Json, http::HeaderMap};
use axum_extra::headers::{
  Authorization, HeaderMapExt, authorization::Basic,
};
use depot_client::api::agent::TokenResponse;

use crate::{
  error::{DomainError, DomainResult},
  resource,
  state::token_client,
};

/// `POST /auth/token` with HTTP Basic `domain:clientSecret`.
///
/// Every failure mode (unknown domain, wrong secret, inactive site,
/// malformed header) gets the same 401 with the same message, so the
/// endpoint cannot be used to probe which domains exist.
pub async fn mint(
  headers: HeaderMap,
) -> DomainResult<Json<TokenResponse>> {
  let Authorization(basic) = headers
    .typed_get::<Authorization<Basic>>()
    .ok_or(DomainError::Auth)?;

  let site = resource::site::find_by_domain(basic.username())
    .await?
    .ok_or(DomainError::Auth)?;
  if !site.active {
    return Err(DomainError::Auth);
  }
  let secret_matches =
    bcrypt::verify(basic.password(), &site.client_secret_hash)
      .map_err(|_| DomainError::Auth)?;
  if !secret_matches {
    return Err(DomainError::Auth);
  }

  let (token, expires_at) = token_client()
    .mint(&site)
    .map_err(DomainError::from)?;
  debug!("Minted agent token | site: {}", site.domain);
  Ok(Json(TokenResponse {
    token,
    expires_at,
    site_id: site.id,
    domain: site.domain,
  }))
}
