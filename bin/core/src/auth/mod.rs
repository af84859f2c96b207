use axum::{
  extract::Request,
  http::{HeaderMap, header::AUTHORIZATION},
  middleware::Next,
  response::Response,
};
use uuid::Uuid;

use crate::{
  auth::{admin::AdminPrincipal, token::AGENT_TOKEN_ISSUER},
  error::{DomainError, DomainResult},
  resource,
  state::{admin_token_verifier, token_client},
};

pub mod admin;
pub mod token;

/// A site agent verified through its bearer token plus a live check
/// that the site still exists and is active.
#[derive(Debug, Clone)]
pub struct AgentPrincipal {
  pub site_id: Uuid,
  /// Taken from the site row, not the claims, so a (hypothetical)
  /// stale claim can never cross tenants.
  pub account_id: Uuid,
  pub domain: String,
}

/// Principal attached to routes that accept either token type.
#[derive(Debug, Clone)]
pub enum Principal {
  Agent(AgentPrincipal),
  Admin(AdminPrincipal),
}

/// Middleware for agent-only (write) routes.
pub async fn agent_request(
  headers: HeaderMap,
  mut req: Request,
  next: Next,
) -> DomainResult<Response> {
  let principal = authenticate_agent(&headers).await?;
  req.extensions_mut().insert(principal);
  Ok(next.run(req).await)
}

/// Middleware for admin-only routes.
pub async fn admin_request(
  headers: HeaderMap,
  mut req: Request,
  next: Next,
) -> DomainResult<Response> {
  let principal = authenticate_admin(&headers).await?;
  req.extensions_mut().insert(principal);
  Ok(next.run(req).await)
}

/// Middleware for agent read routes, which also accept admin tokens.
pub async fn agent_or_admin_request(
  headers: HeaderMap,
  mut req: Request,
  next: Next,
) -> DomainResult<Response> {
  let principal = match classify_bearer_tokens(&headers)? {
    ClassifiedTokens {
      agent: Some(token), ..
    } => Principal::Agent(verify_agent(&token).await?),
    ClassifiedTokens {
      admin: Some(token), ..
    } => Principal::Admin(
      admin_token_verifier()
        .verify(&token)
        .await
        .map_err(|_| DomainError::Auth)?,
    ),
    _ => return Err(DomainError::Auth),
  };
  req.extensions_mut().insert(principal);
  Ok(next.run(req).await)
}

async fn authenticate_agent(
  headers: &HeaderMap,
) -> DomainResult<AgentPrincipal> {
  match classify_bearer_tokens(headers)? {
    ClassifiedTokens {
      agent: Some(token), ..
    } => verify_agent(&token).await,
    ClassifiedTokens {
      admin: Some(token), ..
    } => {
      // A verified admin on an agent write route is the wrong token
      // type; an unverifiable one is just invalid credentials.
      match admin_token_verifier().verify(&token).await {
        Ok(_) => Err(DomainError::WrongTokenType),
        Err(_) => Err(DomainError::Auth),
      }
    }
    _ => Err(DomainError::Auth),
  }
}

async fn authenticate_admin(
  headers: &HeaderMap,
) -> DomainResult<AdminPrincipal> {
  match classify_bearer_tokens(headers)? {
    ClassifiedTokens {
      admin: Some(token), ..
    } => admin_token_verifier()
      .verify(&token)
      .await
      .map_err(|_| DomainError::Auth),
    ClassifiedTokens {
      agent: Some(token), ..
    } => match verify_agent(&token).await {
      Ok(_) => Err(DomainError::WrongTokenType),
      Err(_) => Err(DomainError::Auth),
    },
    _ => Err(DomainError::Auth),
  }
}

/// Verifies the MAC / expiry / issuer, then confirms the site behind
/// the claims still exists and is active.
pub async fn verify_agent(
  token: &str,
) -> DomainResult<AgentPrincipal> {
  let claims = token_client()
    .decode(token)
    .map_err(|_| DomainError::Auth)?;
  let site = resource::site::get_site(claims.sub)
    .await?
    .ok_or(DomainError::Auth)?;
  if !site.active {
    return Err(DomainError::InactivePrincipal);
  }
  Ok(AgentPrincipal {
    site_id: site.id,
    account_id: site.account_id,
    domain: site.domain,
  })
}

#[derive(Debug, Default)]
struct ClassifiedTokens {
  agent: Option<String>,
  admin: Option<String>,
}

/// Sorts every presented bearer token by its (unverified) issuer
/// claim. Presenting both an agent and an admin token at once is an
/// ambiguous principal and rejected outright.
fn classify_bearer_tokens(
  headers: &HeaderMap,
) -> DomainResult<ClassifiedTokens> {
  let mut classified = ClassifiedTokens::default();
  for value in headers.get_all(AUTHORIZATION) {
    let Ok(value) = value.to_str() else {
      continue;
    };
    let Some(token) = value
      .strip_prefix("Bearer ")
      .or_else(|| value.strip_prefix("bearer "))
    else {
      continue;
    };
    let token = token.trim();
    match token::read_unverified_issuer(token).as_deref() {
      Some(AGENT_TOKEN_ISSUER) => {
        classified.agent.get_or_insert_with(|| token.to_string());
      }
      // Foreign issuers and unreadable tokens go to the admin
      // verifier, which rejects anything it did not issue.
      _ => {
        classified.admin.get_or_insert_with(|| token.to_string());
      }
    }
  }
  if classified.agent.is_some() && classified.admin.is_some() {
    return Err(DomainError::AmbiguousPrincipal);
  }
  Ok(classified)
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;
  use depot_client::entities::{
    config::CoreConfig, depot_timestamp, site::Site,
  };
  use jsonwebtoken::{EncodingKey, Header, encode};
  use serde_json::json;

  use super::{token::TokenClient, *};

  fn agent_token() -> String {
    let client = TokenClient::new(&CoreConfig {
      signing_key: String::from("0123456789abcdef0123456789abcdef"),
      ..Default::default()
    })
    .unwrap();
    let site = Site {
      id: Uuid::new_v4(),
      account_id: Uuid::new_v4(),
      domain: String::from("store-01.example.com"),
      client_secret_hash: Default::default(),
      display_name: Default::default(),
      active: true,
      created_at: depot_timestamp(),
      updated_at: depot_timestamp(),
    };
    client.mint(&site).unwrap().0
  }

  fn admin_token() -> String {
    encode(
      &Header::default(),
      &json!({
        "iss": "https://idp.example.com",
        "sub": "operator-1",
        "exp": depot_timestamp().timestamp() + 600,
      }),
      &EncodingKey::from_secret(b"external"),
    )
    .unwrap()
  }

  fn headers(tokens: &[&str]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for token in tokens {
      headers.append(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
      );
    }
    headers
  }

  #[test]
  fn classifies_by_issuer_claim() {
    let agent = agent_token();
    let classified =
      classify_bearer_tokens(&headers(&[&agent])).unwrap();
    assert_eq!(classified.agent.as_deref(), Some(agent.as_str()));
    assert!(classified.admin.is_none());

    let admin = admin_token();
    let classified =
      classify_bearer_tokens(&headers(&[&admin])).unwrap();
    assert!(classified.agent.is_none());
    assert_eq!(classified.admin.as_deref(), Some(admin.as_str()));
  }

  #[test]
  fn dual_presentation_is_ambiguous() {
    let result = classify_bearer_tokens(&headers(&[
      &agent_token(),
      &admin_token(),
    ]));
    assert!(matches!(result, Err(DomainError::AmbiguousPrincipal)));
  }

  #[test]
  fn missing_or_malformed_credentials_classify_empty() {
    let classified =
      classify_bearer_tokens(&HeaderMap::new()).unwrap();
    assert!(classified.agent.is_none() && classified.admin.is_none());

    // Not a bearer scheme at all.
    let mut basic = HeaderMap::new();
    basic.insert(
      AUTHORIZATION,
      HeaderValue::from_static("Basic c3RvcmU6c2VjcmV0"),
    );
    let classified = classify_bearer_tokens(&basic).unwrap();
    assert!(classified.agent.is_none() && classified.admin.is_none());
  }
}
