//! # Depot Client
//!
//! Agent-side client for the Depot ingest API, plus all entity and
//! API type definitions shared with Core.
//!
//! ```ignore
//! let mut depot = DepotClient::new("https://depot.example.com");
//! depot.authenticate("store-01.example.com", secret).await?;
//! let batch = depot.start_batch().await?;
//! depot
//!   .upload_file(batch.id, "sales.csv.gz", "application/gzip", bytes)
//!   .await?;
//! depot.complete_batch(batch.id).await?;
//! ```

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
  api::{
    ErrorEnvelope,
    agent::{ErrorReport, TokenResponse, UploadResponse},
  },
  entities::{Batch, ErrorLog},
};

pub mod api;
pub mod entities;

/// Base path of the agent surface. `/api/ingest` is a deprecated
/// alias Core also serves.
pub const AGENT_BASE_PATH: &str = "/api/v1";

pub struct DepotClient {
  address: String,
  token: Option<String>,
  http: reqwest::Client,
}

impl DepotClient {
  pub fn new(address: impl Into<String>) -> DepotClient {
    let mut address: String = address.into();
    while address.ends_with('/') {
      address.pop();
    }
    DepotClient {
      address,
      token: None,
      http: Default::default(),
    }
  }

  /// Client with an already-minted agent token attached.
  pub fn with_token(
    address: impl Into<String>,
    token: impl Into<String>,
  ) -> DepotClient {
    let mut client = DepotClient::new(address);
    client.token = Some(token.into());
    client
  }

  /// `POST /auth/token` with HTTP Basic `domain:clientSecret`.
  /// Stores the minted token on the client and returns it.
  pub async fn authenticate(
    &mut self,
    domain: &str,
    client_secret: &str,
  ) -> anyhow::Result<TokenResponse> {
    let response = self
      .http
      .post(self.url("/auth/token"))
      .basic_auth(domain, Some(client_secret))
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    let response: TokenResponse = handle(response).await?;
    self.token = Some(response.token.clone());
    Ok(response)
  }

  pub async fn start_batch(&self) -> anyhow::Result<Batch> {
    self.post_empty("/batch/start").await
  }

  pub async fn get_batch(&self, id: Uuid) -> anyhow::Result<Batch> {
    let response = self
      .http
      .get(self.url(&format!("/batch/{id}")))
      .bearer_auth(self.token()?)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }

  pub async fn complete_batch(
    &self,
    id: Uuid,
  ) -> anyhow::Result<Batch> {
    self.post_empty(&format!("/batch/{id}/complete")).await
  }

  pub async fn fail_batch(&self, id: Uuid) -> anyhow::Result<Batch> {
    self.post_empty(&format!("/batch/{id}/fail")).await
  }

  pub async fn cancel_batch(
    &self,
    id: Uuid,
  ) -> anyhow::Result<Batch> {
    self.post_empty(&format!("/batch/{id}/cancel")).await
  }

  /// Uploads a single file into the batch as one multipart part.
  pub async fn upload_file(
    &self,
    batch_id: Uuid,
    file_name: &str,
    content_type: &str,
    bytes: Vec<u8>,
  ) -> anyhow::Result<UploadResponse> {
    let part = reqwest::multipart::Part::bytes(bytes)
      .file_name(file_name.to_string())
      .mime_str(content_type)
      .context("Invalid content type")?;
    let form = reqwest::multipart::Form::new().part("file", part);
    let response = self
      .http
      .post(self.url(&format!("/batch/{batch_id}/upload")))
      .bearer_auth(self.token()?)
      .multipart(form)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }

  /// Site-level error report. Core stores it and returns no body.
  pub async fn report_error(
    &self,
    report: &ErrorReport,
  ) -> anyhow::Result<()> {
    let response = self
      .http
      .post(self.url("/error"))
      .bearer_auth(self.token()?)
      .json(report)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    if response.status().is_success() {
      Ok(())
    } else {
      Err(error_for(response).await)
    }
  }

  /// Batch-associated error report. Also flips the batch
  /// `hasErrors` flag on Core.
  pub async fn report_batch_error(
    &self,
    batch_id: Uuid,
    report: &ErrorReport,
  ) -> anyhow::Result<ErrorLog> {
    let response = self
      .http
      .post(self.url(&format!("/error/{batch_id}")))
      .bearer_auth(self.token()?)
      .json(report)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }

  pub async fn get_error_log(
    &self,
    id: Uuid,
  ) -> anyhow::Result<ErrorLog> {
    let response = self
      .http
      .get(self.url(&format!("/error/log/{id}")))
      .bearer_auth(self.token()?)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }

  fn url(&self, path: &str) -> String {
    format!("{}{AGENT_BASE_PATH}{path}", self.address)
  }

  fn token(&self) -> anyhow::Result<&str> {
    self
      .token
      .as_deref()
      .context("Not authenticated. Call authenticate() first.")
  }

  async fn post_empty<T: DeserializeOwned>(
    &self,
    path: &str,
  ) -> anyhow::Result<T> {
    let response = self
      .http
      .post(self.url(path))
      .bearer_auth(self.token()?)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }
}

/// Operator-side client for the `/api/admin` surface. Requires a
/// token from the external identity provider carrying the admin
/// role.
pub struct DepotAdminClient {
  address: String,
  token: String,
  http: reqwest::Client,
}

impl DepotAdminClient {
  pub fn new(
    address: impl Into<String>,
    token: impl Into<String>,
  ) -> DepotAdminClient {
    let mut address: String = address.into();
    while address.ends_with('/') {
      address.pop();
    }
    DepotAdminClient {
      address,
      token: token.into(),
      http: Default::default(),
    }
  }

  pub async fn create_account(
    &self,
    request: &api::admin::CreateAccount,
  ) -> anyhow::Result<entities::Account> {
    self.post("/account", request).await
  }

  pub async fn list_accounts(
    &self,
    pagination: api::admin::Pagination,
  ) -> anyhow::Result<api::admin::Paginated<entities::Account>> {
    self.get("/account", &pagination).await
  }

  pub async fn get_account(
    &self,
    id: Uuid,
  ) -> anyhow::Result<entities::Account> {
    self.get_plain(&format!("/account/{id}")).await
  }

  pub async fn update_account(
    &self,
    id: Uuid,
    request: &api::admin::UpdateAccount,
  ) -> anyhow::Result<entities::Account> {
    self.patch(&format!("/account/{id}"), request).await
  }

  pub async fn deactivate_account(
    &self,
    id: Uuid,
  ) -> anyhow::Result<entities::Account> {
    self.post(&format!("/account/{id}/deactivate"), &()).await
  }

  pub async fn create_site(
    &self,
    request: &api::admin::CreateSite,
  ) -> anyhow::Result<api::admin::CreateSiteResponse> {
    self.post("/site", request).await
  }

  pub async fn list_sites(
    &self,
    pagination: api::admin::Pagination,
  ) -> anyhow::Result<api::admin::Paginated<entities::Site>> {
    self.get("/site", &pagination).await
  }

  pub async fn get_site(
    &self,
    id: Uuid,
  ) -> anyhow::Result<entities::Site> {
    self.get_plain(&format!("/site/{id}")).await
  }

  pub async fn update_site(
    &self,
    id: Uuid,
    request: &api::admin::UpdateSite,
  ) -> anyhow::Result<entities::Site> {
    self.patch(&format!("/site/{id}"), request).await
  }

  pub async fn deactivate_site(
    &self,
    id: Uuid,
  ) -> anyhow::Result<entities::Site> {
    self.post(&format!("/site/{id}/deactivate"), &()).await
  }

  pub async fn list_batches(
    &self,
    query: api::admin::BatchQuery,
  ) -> anyhow::Result<api::admin::Paginated<entities::Batch>> {
    self.get("/batch", &query).await
  }

  pub async fn get_batch_detail(
    &self,
    id: Uuid,
  ) -> anyhow::Result<api::admin::BatchDetail> {
    self.get_plain(&format!("/batch/{id}")).await
  }

  /// Deletes batch metadata (the batch row and its file rows).
  /// Objects in the store are left in place.
  pub async fn delete_batch(
    &self,
    id: Uuid,
  ) -> anyhow::Result<entities::Batch> {
    let response = self
      .http
      .delete(self.url(&format!("/batch/{id}")))
      .bearer_auth(&self.token)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }

  pub async fn list_error_logs(
    &self,
    query: &api::admin::ErrorLogQuery,
  ) -> anyhow::Result<api::admin::Paginated<entities::ErrorLog>> {
    self.get("/error", query).await
  }

  /// Raw CSV bytes of the export endpoint. Pass a bounded
  /// occurredAt range; the export is not paginated.
  pub async fn export_error_logs(
    &self,
    query: &api::admin::ErrorLogQuery,
  ) -> anyhow::Result<Vec<u8>> {
    let response = self
      .http
      .get(self.url("/error/export"))
      .query(query)
      .bearer_auth(&self.token)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    if response.status().is_success() {
      Ok(response.bytes().await?.to_vec())
    } else {
      Err(error_for(response).await)
    }
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api/admin{path}", self.address)
  }

  async fn get<Q: serde::Serialize, T: DeserializeOwned>(
    &self,
    path: &str,
    query: &Q,
  ) -> anyhow::Result<T> {
    let response = self
      .http
      .get(self.url(path))
      .query(query)
      .bearer_auth(&self.token)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }

  async fn get_plain<T: DeserializeOwned>(
    &self,
    path: &str,
  ) -> anyhow::Result<T> {
    let response = self
      .http
      .get(self.url(path))
      .bearer_auth(&self.token)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }

  async fn post<B: serde::Serialize, T: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
  ) -> anyhow::Result<T> {
    let response = self
      .http
      .post(self.url(path))
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }

  async fn patch<B: serde::Serialize, T: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
  ) -> anyhow::Result<T> {
    let response = self
      .http
      .patch(self.url(path))
      .bearer_auth(&self.token)
      .json(body)
      .send()
      .await
      .context("Failed to reach Depot Core")?;
    handle(response).await
  }
}

async fn handle<T: DeserializeOwned>(
  response: reqwest::Response,
) -> anyhow::Result<T> {
  if response.status().is_success() {
    response
      .json()
      .await
      .context("Failed to parse Depot Core response")
  } else {
    Err(error_for(response).await)
  }
}

async fn error_for(response: reqwest::Response) -> anyhow::Error {
  let status = response.status();
  match response.json::<ErrorEnvelope>().await {
    Ok(envelope) => anyhow!(
      "{} | {}: {}",
      envelope.status,
      envelope.error,
      envelope.message
    ),
    Err(_) => anyhow!("Request failed with status {status}"),
  }
}
