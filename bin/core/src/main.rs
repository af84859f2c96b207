use anyhow::Context;

#[macro_use]
extern crate tracing;

mod api;
mod auth;
mod batch;
mod config;
mod error;
mod errorlog;
mod helpers;
mod resource;
mod schedule;
mod startup;
mod state;
mod upload;

async fn app() -> anyhow::Result<()> {
  let config = config::core_config();
  logger::init(&config.logging)?;

  info!("Depot Core version: v{}", env!("CARGO_PKG_VERSION"));
  if config.pretty_startup_config {
    info!("{:#?}", config.sanitized());
  } else {
    info!("{:?}", config.sanitized());
  }

  // Refuses to boot on a weak or placeholder signing key.
  startup::startup_gate(config)?;

  state::init_db_client().await;
  // Fail fast on unusable object store / token configuration.
  state::object_store();
  state::token_client();
  state::admin_token_verifier();

  startup::on_startup().await;
  schedule::spawn_schedulers();

  let address = format!("{}:{}", config.bind_ip, config.port);
  let listener = tokio::net::TcpListener::bind(&address)
    .await
    .with_context(|| format!("Failed to bind {address}"))?;
  info!("Depot Core listening on {address}");
  axum::serve(listener, api::app())
    .await
    .context("HTTP server crashed")?;
  Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  let mut term_signal = tokio::signal::unix::signal(
    tokio::signal::unix::SignalKind::terminate(),
  )?;

  let app = tokio::spawn(app());

  tokio::select! {
    res = app => return res?,
    _ = term_signal.recv() => {
      info!("Depot Core shutting down");
    },
  }

  Ok(())
}
