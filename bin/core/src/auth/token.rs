use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use depot_client::entities::{
  config::CoreConfig, depot_timestamp, random_string, site::Site,
};
use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode,
  encode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `iss` claim on every agent token. Tokens with any other issuer
/// are dispatched to the admin verifier instead.
pub const AGENT_TOKEN_ISSUER: &str = "depot-core";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AgentClaims {
  pub iss: String,
  /// Site id.
  pub sub: Uuid,
  pub account_id: Uuid,
  pub domain: String,
  pub iat: i64,
  pub exp: i64,
}

/// Mints and verifies the symmetric-signed agent bearer tokens.
pub struct TokenClient {
  header: Header,
  validation: Validation,
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  ttl_seconds: u64,
}

impl TokenClient {
  pub fn new(config: &CoreConfig) -> anyhow::Result<TokenClient> {
    // Empty only under the test profile; the startup gate refuses
    // to boot otherwise. A random key keeps test tokens unforgeable.
    let secret = if config.signing_key.is_empty() {
      random_string(40)
    } else {
      config.signing_key.clone()
    };
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[AGENT_TOKEN_ISSUER]);
    Ok(TokenClient {
      header: Header::default(),
      validation,
      encoding_key: EncodingKey::from_secret(secret.as_bytes()),
      decoding_key: DecodingKey::from_secret(secret.as_bytes()),
      ttl_seconds: config.token_ttl,
    })
  }

  /// Signs a fresh token for the site. Returns the token and its
  /// expiry.
  pub fn mint(
    &self,
    site: &Site,
  ) -> anyhow::Result<(String, DateTime<Utc>)> {
    let iat = depot_timestamp().timestamp();
    let exp = iat + self.ttl_seconds as i64;
    let claims = AgentClaims {
      iss: AGENT_TOKEN_ISSUER.to_string(),
      sub: site.id,
      account_id: site.account_id,
      domain: site.domain.clone(),
      iat,
      exp,
    };
    let token = encode(&self.header, &claims, &self.encoding_key)
      .context("Failed at signing claims")?;
    let expires_at = Utc
      .timestamp_opt(exp, 0)
      .single()
      .context("Token expiry out of range")?;
    Ok((token, expires_at))
  }

  /// Recomputes the MAC and checks expiry + issuer. Whether the site
  /// behind the claims still exists and is active is the caller's
  /// concern.
  pub fn decode(&self, token: &str) -> anyhow::Result<AgentClaims> {
    decode::<AgentClaims>(token, &self.decoding_key, &self.validation)
      .map(|data| data.claims)
      .context("Failed to decode token claims")
  }
}

/// Reads the `iss` claim without verifying the signature. Only used
/// to dispatch a bearer token to the right verifier; nothing is
/// trusted from the result.
pub fn read_unverified_issuer(token: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct Issuer {
    iss: Option<String>,
  }
  let mut validation = Validation::new(Algorithm::HS256);
  validation.insecure_disable_signature_validation();
  validation.validate_exp = false;
  validation.required_spec_claims.clear();
  decode::<Issuer>(token, &DecodingKey::from_secret(&[]), &validation)
    .ok()
    .and_then(|data| data.claims.iss)
}

#[cfg(test)]
mod tests {
  use depot_client::entities::depot_timestamp;

  use super::*;

  fn test_site() -> Site {
    Site {
      id: Uuid::new_v4(),
      account_id: Uuid::new_v4(),
      domain: String::from("store-01.example.com"),
      client_secret_hash: Default::default(),
      display_name: String::from("Store 01"),
      active: true,
      created_at: depot_timestamp(),
      updated_at: depot_timestamp(),
    }
  }

  fn test_config(signing_key: &str) -> CoreConfig {
    CoreConfig {
      signing_key: signing_key.to_string(),
      ..Default::default()
    }
  }

  #[test]
  fn minted_token_round_trips() {
    let client =
      TokenClient::new(&test_config("0123456789abcdef0123456789abcdef"))
        .unwrap();
    let site = test_site();
    let (token, expires_at) = client.mint(&site).unwrap();
    let claims = client.decode(&token).unwrap();
    assert_eq!(claims.sub, site.id);
    assert_eq!(claims.account_id, site.account_id);
    assert_eq!(claims.domain, site.domain);
    assert_eq!(claims.iss, AGENT_TOKEN_ISSUER);
    assert_eq!(claims.exp, expires_at.timestamp());
    assert!(expires_at > depot_timestamp());
  }

  #[test]
  fn expired_token_is_rejected() {
    let config = test_config("0123456789abcdef0123456789abcdef");
    let client = TokenClient::new(&config).unwrap();
    let site = test_site();
    // Far enough in the past to clear the default leeway.
    let iat = depot_timestamp().timestamp() - 7200;
    let claims = AgentClaims {
      iss: AGENT_TOKEN_ISSUER.to_string(),
      sub: site.id,
      account_id: site.account_id,
      domain: site.domain,
      iat,
      exp: iat + 60,
    };
    let token = encode(
      &Header::default(),
      &claims,
      &EncodingKey::from_secret(config.signing_key.as_bytes()),
    )
    .unwrap();
    assert!(client.decode(&token).is_err());
  }

  #[test]
  fn foreign_key_or_issuer_is_rejected() {
    let client =
      TokenClient::new(&test_config("0123456789abcdef0123456789abcdef"))
        .unwrap();
    let other =
      TokenClient::new(&test_config("fedcba9876543210fedcba9876543210"))
        .unwrap();
    let (token, _) = other.mint(&test_site()).unwrap();
    assert!(client.decode(&token).is_err());

    // Right key, wrong issuer.
    let mut claims = other.decode(&token).unwrap();
    claims.iss = String::from("https://idp.example.com");
    let token = encode(
      &Header::default(),
      &claims,
      &EncodingKey::from_secret(
        "0123456789abcdef0123456789abcdef".as_bytes(),
      ),
    )
    .unwrap();
    assert!(client.decode(&token).is_err());
    assert_eq!(
      read_unverified_issuer(&token).as_deref(),
      Some("https://idp.example.com")
    );
  }
}
