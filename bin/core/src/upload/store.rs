use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use depot_client::entities::config::ObjectStoreConfig;
use object_store::{
  ObjectStore, PutPayload, aws::AmazonS3Builder, path::Path,
};

use crate::{error::DomainError, state::object_store};

/// Attempts per object PUT, with a fixed delay in between.
const PUT_ATTEMPTS: u32 = 3;
const PUT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub fn build_object_store(
  config: &ObjectStoreConfig,
) -> anyhow::Result<Box<dyn ObjectStore>> {
  if config.bucket.is_empty() {
    return Err(anyhow::anyhow!(
      "DEPOT_OBJECT_STORE_BUCKET must be configured"
    ));
  }
  let region = if config.region.is_empty() {
    // S3-compatible stores accept any region but the client
    // requires one.
    "us-east-1"
  } else {
    &config.region
  };
  let mut builder = AmazonS3Builder::new()
    .with_bucket_name(&config.bucket)
    .with_region(region);
  if !config.access_key_id.is_empty() {
    builder = builder
      .with_access_key_id(&config.access_key_id)
      .with_secret_access_key(&config.secret_access_key);
  }
  if !config.endpoint.is_empty() {
    builder = builder
      .with_endpoint(&config.endpoint)
      .with_allow_http(config.endpoint.starts_with("http://"));
  }
  let store = builder
    .build()
    .context("Failed to build object store client")?;
  Ok(Box::new(store))
}

/// Phase B of the upload pipeline. Holds no database connection.
///
/// Transient failures are retried up to [PUT_ATTEMPTS] times with a
/// fixed [PUT_RETRY_DELAY]; permanent failures (bad path, auth,
/// preconditions) fail fast. A failure here has no DB side effects,
/// so the client may retry with the same filename.
pub async fn put_with_retry(
  key: &str,
  payload: Bytes,
) -> Result<(), DomainError> {
  let path = Path::from(key);
  let mut attempt = 1;
  loop {
    match object_store()
      .put(&path, PutPayload::from(payload.clone()))
      .await
    {
      Ok(_) => return Ok(()),
      Err(e) if is_transient(&e) && attempt < PUT_ATTEMPTS => {
        warn!(
          "Object store put failed (attempt {attempt}/{PUT_ATTEMPTS}) | key: {key} | {e}"
        );
        attempt += 1;
        tokio::time::sleep(PUT_RETRY_DELAY).await;
      }
      Err(e) => {
        error!(
          "Object store put failed permanently | key: {key} | attempts: {attempt} | {e}"
        );
        return Err(DomainError::Storage(e.to_string()));
      }
    }
  }
}

/// Probe used by the health tap. A missing sentinel object still
/// proves the store answered.
pub async fn store_reachable() -> bool {
  match object_store().head(&Path::from(".depot-health")).await {
    Ok(_) | Err(object_store::Error::NotFound { .. }) => true,
    Err(e) => {
      warn!("Object store health probe failed | {e}");
      false
    }
  }
}

/// Client/config errors will fail identically on every attempt, so
/// only infrastructure-shaped failures are worth retrying.
fn is_transient(e: &object_store::Error) -> bool {
  !matches!(
    e,
    object_store::Error::NotFound { .. }
      | object_store::Error::InvalidPath { .. }
      | object_store::Error::NotSupported { .. }
      | object_store::Error::NotImplemented
      | object_store::Error::AlreadyExists { .. }
      | object_store::Error::Precondition { .. }
      | object_store::Error::NotModified { .. }
      | object_store::Error::PermissionDenied { .. }
      | object_store::Error::Unauthenticated { .. }
      | object_store::Error::UnknownConfigurationKey { .. }
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  fn source() -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::other("boom"))
  }

  #[test]
  fn generic_errors_are_transient() {
    assert!(is_transient(&object_store::Error::Generic {
      store: "S3",
      source: source(),
    }));
  }

  #[test]
  fn auth_and_path_errors_are_permanent() {
    assert!(!is_transient(&object_store::Error::PermissionDenied {
      path: String::from("a/b"),
      source: source(),
    }));
    assert!(!is_transient(&object_store::Error::Unauthenticated {
      path: String::from("a/b"),
      source: source(),
    }));
    assert!(!is_transient(&object_store::Error::NotFound {
      path: String::from("a/b"),
      source: source(),
    }));
  }
}
