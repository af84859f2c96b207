use std::{path::PathBuf, sync::OnceLock};

use axum::http::HeaderValue;
use depot_client::entities::{
  config::{
    AdminAuthConfig, CoreConfig, DatabaseConfig, Env,
    ObjectStoreConfig,
  },
  logger::LogConfig,
};
use tower_http::cors::CorsLayer;

/// Creates a CORS layer from the Core configuration.
///
/// - If `cors_allowed_origins` is empty: allows all origins.
/// - Otherwise only the listed origins are allowed.
pub fn cors_layer() -> CorsLayer {
  let config = core_config();
  let allowed_origins = if config.cors_allowed_origins.is_empty() {
    vec![HeaderValue::from_static("*")]
  } else {
    config
      .cors_allowed_origins
      .iter()
      .filter_map(|origin| {
        HeaderValue::from_str(origin)
          .inspect_err(|e| {
            warn!("Invalid CORS allowed origin: {origin} | {e:?}")
          })
          .ok()
      })
      .collect()
  };
  CorsLayer::new()
    .allow_origin(allowed_origins)
    .allow_methods(tower_http::cors::Any)
    .allow_headers(tower_http::cors::Any)
}

pub fn core_config() -> &'static CoreConfig {
  static CORE_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
  CORE_CONFIG.get_or_init(|| {
    let env: Env = match envy::from_env() {
      Ok(env) => env,
      Err(e) => {
        panic!("Failed to parse Depot Core environment | {e:?}");
      }
    };
    let config = CoreConfig::default();

    // Rebuild CoreConfig field by field so every env override
    // (including the *_FILE secret variants) is applied.
    CoreConfig {
      // Secret things, overridable with files
      signing_key: maybe_read_item_from_file(
        env.depot_signing_key_file,
        env.depot_signing_key,
      )
      .unwrap_or(config.signing_key),
      database: DatabaseConfig {
        uri: maybe_read_item_from_file(
          env.depot_database_uri_file,
          env.depot_database_uri,
        )
        .unwrap_or(config.database.uri),
        pool_size: env
          .depot_database_pool_size
          .unwrap_or(config.database.pool_size),
      },
      object_store: ObjectStoreConfig {
        endpoint: env
          .depot_object_store_endpoint
          .unwrap_or(config.object_store.endpoint),
        bucket: env
          .depot_object_store_bucket
          .unwrap_or(config.object_store.bucket),
        region: env
          .depot_object_store_region
          .unwrap_or(config.object_store.region),
        access_key_id: maybe_read_item_from_file(
          env.depot_object_store_access_key_id_file,
          env.depot_object_store_access_key_id,
        )
        .unwrap_or(config.object_store.access_key_id),
        secret_access_key: maybe_read_item_from_file(
          env.depot_object_store_secret_access_key_file,
          env.depot_object_store_secret_access_key,
        )
        .unwrap_or(config.object_store.secret_access_key),
      },

      // Non secrets
      bind_ip: env.depot_bind_ip.unwrap_or(config.bind_ip),
      port: env.depot_port.unwrap_or(config.port),
      token_ttl: env.depot_token_ttl.unwrap_or(config.token_ttl),
      batch_timeout: env
        .depot_batch_timeout
        .unwrap_or(config.batch_timeout),
      max_concurrent_batches_per_account: env
        .depot_max_concurrent_batches_per_account
        .unwrap_or(config.max_concurrent_batches_per_account),
      max_file_size: env
        .depot_max_file_size
        .unwrap_or(config.max_file_size),
      admin_auth: AdminAuthConfig {
        issuer: env
          .depot_admin_issuer
          .unwrap_or(config.admin_auth.issuer),
        jwks_url: env
          .depot_admin_jwks_url
          .unwrap_or(config.admin_auth.jwks_url),
        role_claim: env
          .depot_admin_role_claim
          .unwrap_or(config.admin_auth.role_claim),
        role: env.depot_admin_role.unwrap_or(config.admin_auth.role),
      },
      cors_allowed_origins: if env
        .depot_cors_allowed_origins
        .is_empty()
      {
        config.cors_allowed_origins
      } else {
        env.depot_cors_allowed_origins
      },
      test_profile: env
        .depot_test_profile
        .unwrap_or(config.test_profile),
      pretty_startup_config: env
        .depot_pretty_startup_config
        .unwrap_or(config.pretty_startup_config),
      logging: LogConfig {
        level: env
          .depot_logging_level
          .unwrap_or(config.logging.level),
        stdio: env
          .depot_logging_stdio
          .unwrap_or(config.logging.stdio),
        pretty: env
          .depot_logging_pretty
          .unwrap_or(config.logging.pretty),
        location: env
          .depot_logging_location
          .unwrap_or(config.logging.location),
        ansi: env.depot_logging_ansi.unwrap_or(config.logging.ansi),
        otlp_endpoint: env
          .depot_logging_otlp_endpoint
          .unwrap_or(config.logging.otlp_endpoint),
        opentelemetry_service_name: env
          .depot_logging_opentelemetry_service_name
          .unwrap_or(config.logging.opentelemetry_service_name),
      },
    }
  })
}

/// Reads a secret from a file when the `*_FILE` variant is set,
/// falling back to the directly-passed value.
fn maybe_read_item_from_file(
  path: Option<PathBuf>,
  item: Option<String>,
) -> Option<String> {
  match path {
    Some(path) => match std::fs::read_to_string(&path) {
      Ok(contents) => Some(contents.trim().to_string()),
      Err(e) => {
        warn!("Failed to read secret file at {path:?} | {e:?}");
        item
      }
    },
    None => item,
  }
}
