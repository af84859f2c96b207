use std::sync::{
  OnceLock,
  atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, anyhow};

use crate::{
  auth::{admin::AdminTokenVerifier, token::TokenClient},
  config::core_config,
  upload::store::build_object_store,
};

static DB_CLIENT: OnceLock<database::Client> = OnceLock::new();

pub fn db_client() -> &'static database::Client {
  DB_CLIENT.get().unwrap_or_else(|| {
    error!(
      "FATAL: db_client accessed before initialized | Ensure init_db_client() is called during startup | Exiting..."
    );
    std::process::exit(1)
  })
}

/// Must be called in app startup sequence.
pub async fn init_db_client() {
  let init = async {
    let client = database::Client::new(&core_config().database)
      .await
      .context("failed to initialize database client")?;
    DB_CLIENT.set(client).map_err(|_| {
      anyhow!(
        "db_client initialized more than once - this should not happen"
      )
    })?;
    anyhow::Ok(())
  }
  .await;
  if let Err(e) = init {
    error!(
      "FATAL: Failed to initialize database::Client | {e:#} | Exiting..."
    );
    std::process::exit(1)
  }
}

pub fn object_store() -> &'static dyn object_store::ObjectStore {
  static OBJECT_STORE: OnceLock<Box<dyn object_store::ObjectStore>> =
    OnceLock::new();
  OBJECT_STORE
    .get_or_init(|| {
      match build_object_store(&core_config().object_store) {
        Ok(store) => store,
        Err(e) => {
          error!(
            "FATAL: Failed to initialize object store client | {e:#} | Exiting..."
          );
          std::process::exit(1)
        }
      }
    })
    .as_ref()
}

pub fn token_client() -> &'static TokenClient {
  static TOKEN_CLIENT: OnceLock<TokenClient> = OnceLock::new();
  TOKEN_CLIENT.get_or_init(|| {
    match TokenClient::new(core_config()) {
      Ok(client) => client,
      Err(e) => {
        error!(
          "FATAL: Failed to initialize TokenClient | {e:#} | Exiting..."
        );
        std::process::exit(1)
      }
    }
  })
}

pub fn admin_token_verifier() -> &'static AdminTokenVerifier {
  static ADMIN_TOKEN_VERIFIER: OnceLock<AdminTokenVerifier> =
    OnceLock::new();
  ADMIN_TOKEN_VERIFIER
    .get_or_init(|| AdminTokenVerifier::new(core_config()))
}

/// Process-lifetime counters exposed on `GET /metrics`.
#[derive(Default)]
pub struct Counters {
  pub batches_started: AtomicU64,
  /// Client-driven terminal transitions (complete, fail, cancel).
  pub batches_finalized: AtomicU64,
  pub batches_reaped: AtomicU64,
  pub uploads_committed: AtomicU64,
  pub upload_bytes: AtomicU64,
  pub errors_recorded: AtomicU64,
}

impl Counters {
  pub fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  pub fn add(counter: &AtomicU64, amount: u64) {
    counter.fetch_add(amount, Ordering::Relaxed);
  }
}

pub fn counters() -> &'static Counters {
  static COUNTERS: OnceLock<Counters> = OnceLock::new();
  COUNTERS.get_or_init(Default::default)
}
