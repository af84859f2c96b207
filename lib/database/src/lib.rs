use anyhow::Context;
use depot_client::entities::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;

pub use sqlx;

/// Handle on the metadata store. Construct once at startup; the
/// inner pool is cheap to clone and shared across all request tasks.
#[derive(Clone)]
pub struct Client {
  pub pool: sqlx::PgPool,
}

impl Client {
  /// Connects the pool and brings the schema up to date.
  pub async fn new(
    config: &DatabaseConfig,
  ) -> anyhow::Result<Client> {
    let pool = PgPoolOptions::new()
      .max_connections(config.pool_size)
      .connect(&config.uri)
      .await
      .context("Failed to connect to Postgres")?;
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations")
      .run(&pool)
      .await
      .context("Failed to run database migrations")?;
    Ok(Client { pool })
  }
}
