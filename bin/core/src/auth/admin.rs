use anyhow::{Context, anyhow};
use arc_swap::ArcSwap;
use depot_client::entities::config::{AdminAuthConfig, CoreConfig};
use jsonwebtoken::{
  Algorithm, DecodingKey, Validation, decode, decode_header,
  jwk::JwkSet,
};

/// An operator verified against the external identity provider.
#[derive(Debug, Clone)]
pub struct AdminPrincipal {
  /// `sub` claim, logged as the acting principal on every admin
  /// mutation.
  pub subject: String,
}

/// Verifies externally-issued administrator tokens against the
/// provider's JWKS. The key set is cached and refreshed when a token
/// arrives with an unknown `kid`.
pub struct AdminTokenVerifier {
  config: AdminAuthConfig,
  jwks: ArcSwap<Option<JwkSet>>,
  http: reqwest::Client,
}

/// Signature algorithms accepted on admin tokens.
const ADMIN_TOKEN_ALGORITHMS: [Algorithm; 3] =
  [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

impl AdminTokenVerifier {
  pub fn new(config: &CoreConfig) -> AdminTokenVerifier {
    let config = config.admin_auth.clone();
    if config.jwks_url.is_empty() || config.issuer.is_empty() {
      warn!(
        "Admin auth is not configured (DEPOT_ADMIN_JWKS_URL / DEPOT_ADMIN_ISSUER) | admin routes will reject all tokens"
      );
    }
    AdminTokenVerifier {
      config,
      jwks: ArcSwap::from_pointee(None),
      http: Default::default(),
    }
  }

  pub fn enabled(&self) -> bool {
    !self.config.jwks_url.is_empty()
      && !self.config.issuer.is_empty()
  }

  /// Issuer expected on admin tokens; used by the auth dispatch to
  /// classify bearer tokens.
  pub fn issuer(&self) -> &str {
    &self.config.issuer
  }

  pub async fn verify(
    &self,
    token: &str,
  ) -> anyhow::Result<AdminPrincipal> {
    if !self.enabled() {
      return Err(anyhow!("Admin auth is not configured"));
    }

    let header =
      decode_header(token).context("Invalid token header")?;
    if !ADMIN_TOKEN_ALGORITHMS.contains(&header.alg) {
      return Err(anyhow!(
        "Unsupported admin token algorithm: {:?}",
        header.alg
      ));
    }
    let kid =
      header.kid.context("Admin token header is missing kid")?;

    let key = match self.decoding_key(&kid) {
      Some(key) => key,
      None => {
        // Unknown kid: the provider may have rotated. Refetch once.
        self.refresh_jwks().await?;
        self
          .decoding_key(&kid)
          .context("No JWKS key matches the token kid")?
      }
    };

    let mut validation = Validation::new(header.alg);
    validation.set_issuer(&[&self.config.issuer]);
    validation.validate_aud = false;
    let claims = decode::<serde_json::Value>(token, &key, &validation)
      .context("Failed to verify admin token")?
      .claims;

    let roles = claim_path(&claims, &self.config.role_claim)
      .and_then(|value| value.as_array())
      .context("Admin token is missing the role claim")?;
    if !roles
      .iter()
      .any(|role| role.as_str() == Some(&self.config.role))
    {
      return Err(anyhow!("Admin token does not carry the admin role"));
    }

    let subject = claims
      .get("sub")
      .and_then(|sub| sub.as_str())
      .context("Admin token is missing sub")?
      .to_string();

    Ok(AdminPrincipal { subject })
  }

  fn decoding_key(&self, kid: &str) -> Option<DecodingKey> {
    let jwks = self.jwks.load();
    let jwk = jwks.as_ref().as_ref()?.find(kid)?;
    DecodingKey::from_jwk(jwk)
      .inspect_err(|e| {
        warn!("Failed to build decoding key from JWK {kid} | {e:?}")
      })
      .ok()
  }

  async fn refresh_jwks(&self) -> anyhow::Result<()> {
    let jwks = self
      .http
      .get(&self.config.jwks_url)
      .send()
      .await
      .context("Failed to fetch JWKS from identity provider")?
      .error_for_status()
      .context("Identity provider returned error for JWKS")?
      .json::<JwkSet>()
      .await
      .context("Failed to parse JWKS document")?;
    self.jwks.store(std::sync::Arc::new(Some(jwks)));
    Ok(())
  }
}

/// Walks a dot-separated path into the claims object,
/// eg `realm_access.roles`.
fn claim_path<'a>(
  claims: &'a serde_json::Value,
  path: &str,
) -> Option<&'a serde_json::Value> {
  path
    .split('.')
    .try_fold(claims, |value, segment| value.get(segment))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn claim_path_walks_nested_objects() {
    let claims = json!({
      "sub": "operator-1",
      "realm_access": { "roles": ["admin", "viewer"] }
    });
    assert_eq!(
      claim_path(&claims, "realm_access.roles"),
      Some(&json!(["admin", "viewer"]))
    );
    assert_eq!(claim_path(&claims, "sub"), Some(&json!("operator-1")));
    assert_eq!(claim_path(&claims, "realm_access.missing"), None);
    assert_eq!(claim_path(&claims, "missing.roles"), None);
  }
}
