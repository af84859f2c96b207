//! Reference site agent: bundles every file in a directory into one
//! batch and pushes it to Depot Core.
//!
//! Intended both as a working one-shot uploader (run it from cron or
//! a systemd timer at the site) and as executable documentation of
//! the agent contract: mint a token over HTTP Basic, start a batch,
//! upload, report errors against the batch, then complete or fail.

use std::path::PathBuf;

use anyhow::Context;
use depot_client::{
  DepotClient, api::agent::ErrorReport,
  entities::logger::LogConfig,
};
use serde::Deserialize;
use serde_json::json;

#[macro_use]
extern crate tracing;

/// # Depot Agent Environment Variables
#[derive(Deserialize)]
struct Env {
  /// Address of Depot Core, eg `https://depot.example.com`.
  depot_agent_core_url: String,
  /// The site domain this agent authenticates as.
  depot_agent_domain: String,
  depot_agent_client_secret: Option<String>,
  depot_agent_client_secret_file: Option<PathBuf>,
  /// Directory whose regular files are uploaded.
  depot_agent_directory: PathBuf,
  /// Agent version reported with error logs.
  depot_agent_client_version: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  logger::init(&LogConfig::default())?;

  let env: Env = envy::from_env()
    .context("Failed to parse Depot Agent environment")?;
  let secret = match &env.depot_agent_client_secret_file {
    Some(path) => std::fs::read_to_string(path)
      .with_context(|| {
        format!("Failed to read client secret file at {path:?}")
      })?
      .trim()
      .to_string(),
    None => env
      .depot_agent_client_secret
      .clone()
      .context("DEPOT_AGENT_CLIENT_SECRET is required")?,
  };

  let mut depot = DepotClient::new(&env.depot_agent_core_url);
  depot
    .authenticate(&env.depot_agent_domain, &secret)
    .await
    .context("Failed to authenticate with Depot Core")?;
  info!("Authenticated as {}", env.depot_agent_domain);

  let batch = depot
    .start_batch()
    .await
    .context("Failed to start batch")?;
  info!("Batch {} started", batch.id);

  match push_directory(&depot, &env, batch.id).await {
    Ok(uploaded) => {
      let batch = depot.complete_batch(batch.id).await?;
      info!(
        "Batch {} completed | files: {} | bytes: {}",
        batch.id, uploaded, batch.total_size
      );
      Ok(())
    }
    Err(e) => {
      error!("Upload run failed | {e:#}");
      // Best effort: record the failure against the batch before
      // marking it FAILED. The batch would otherwise be reaped.
      let report = ErrorReport {
        r#type: String::from("AGENT_PUSH_FAILED"),
        title: String::from("Agent push failed"),
        message: format!("{e:#}"),
        stack_trace: None,
        client_version: env.depot_agent_client_version.clone(),
        metadata: json!({
          "directory": env.depot_agent_directory,
        }),
        occurred_at: None,
      };
      if let Err(e) =
        depot.report_batch_error(batch.id, &report).await
      {
        warn!("Failed to report batch error | {e:#}");
      }
      if let Err(e) = depot.fail_batch(batch.id).await {
        warn!("Failed to mark batch FAILED | {e:#}");
      }
      Err(e)
    }
  }
}

async fn push_directory(
  depot: &DepotClient,
  env: &Env,
  batch_id: uuid::Uuid,
) -> anyhow::Result<u64> {
  let entries = std::fs::read_dir(&env.depot_agent_directory)
    .with_context(|| {
      format!(
        "Failed to read directory {:?}",
        env.depot_agent_directory
      )
    })?;

  let mut uploaded = 0;
  for entry in entries {
    let entry = entry?;
    if !entry.file_type()?.is_file() {
      continue;
    }
    let file_name = entry.file_name();
    let file_name = file_name.to_string_lossy();
    let bytes = std::fs::read(entry.path()).with_context(|| {
      format!("Failed to read {:?}", entry.path())
    })?;
    depot
      .upload_file(
        batch_id,
        &file_name,
        "application/octet-stream",
        bytes,
      )
      .await
      .with_context(|| format!("Failed to upload {file_name}"))?;
    debug!("Uploaded {file_name}");
    uploaded += 1;
  }
  Ok(uploaded)
}
