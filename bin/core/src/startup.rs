use anyhow::anyhow;
use chrono::Duration;
use depot_client::entities::{
  config::CoreConfig, depot_timestamp,
};

use crate::errorlog;

/// Signing keys that ship in docs, examples and compose files.
/// Booting with one of these would make every agent token forgeable.
const PLACEHOLDER_SIGNING_KEYS: [&str; 6] = [
  "change-me",
  "changeme",
  "test-secret",
  "secret",
  "password",
  "depot-signing-key",
];

const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Refuses to boot on a missing or weak agent-token signing key.
/// Only the explicit test profile skips the check.
pub fn startup_gate(config: &CoreConfig) -> anyhow::Result<()> {
  if config.test_profile {
    warn!(
      "TEST PROFILE ENABLED | signing key gate skipped | never run production like this"
    );
    return Ok(());
  }
  if config.signing_key.is_empty() {
    return Err(anyhow!(
      "DEPOT_SIGNING_KEY is required. Refusing to start."
    ));
  }
  if PLACEHOLDER_SIGNING_KEYS.iter().any(|placeholder| {
    config.signing_key.eq_ignore_ascii_case(placeholder)
  }) {
    return Err(anyhow!(
      "DEPOT_SIGNING_KEY is a known placeholder value. Refusing to start."
    ));
  }
  if config.signing_key.len() < MIN_SIGNING_KEY_BYTES {
    return Err(anyhow!(
      "DEPOT_SIGNING_KEY must be at least {MIN_SIGNING_KEY_BYTES} bytes. Refusing to start."
    ));
  }
  Ok(())
}

/// Runs after the db client is initialized: make sure the error log
/// partitions around now exist, so appends (including slightly
/// backdated ones) cannot race the monthly maintainer.
pub async fn on_startup() {
  let now = depot_timestamp();
  for at in
    [now - Duration::days(1), now, errorlog::next_month(now)]
  {
    if let Err(e) = errorlog::ensure_partition(at).await {
      error!(
        "Failed to ensure error log partition {} on startup | {e:?}",
        errorlog::partition_name(at)
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(signing_key: &str, test_profile: bool) -> CoreConfig {
    CoreConfig {
      signing_key: signing_key.to_string(),
      test_profile,
      ..Default::default()
    }
  }

  #[test]
  fn refuses_missing_short_and_placeholder_keys() {
    assert!(startup_gate(&config("", false)).is_err());
    assert!(startup_gate(&config("too-short", false)).is_err());
    assert!(startup_gate(&config("change-me", false)).is_err());
    assert!(startup_gate(&config("Test-Secret", false)).is_err());
  }

  #[test]
  fn accepts_a_real_key() {
    assert!(
      startup_gate(&config(
        "5d41402abc4b2a76b9719d911017c592aabbccdd",
        false
      ))
      .is_ok()
    );
  }

  #[test]
  fn test_profile_skips_the_gate() {
    assert!(startup_gate(&config("", true)).is_ok());
  }
}
