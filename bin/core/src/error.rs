use axum::{
  extract::Request,
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
};
use depot_client::{api::ErrorEnvelope, entities::depot_timestamp};
use uuid::Uuid;

/// The closed sum of domain failures. These cross the application
/// layer unchanged and are mapped to HTTP exactly once, in
/// [error_envelope].
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
  /// Input shape or field constraint violation.
  #[error("{0}")]
  Validation(String),
  /// Missing or invalid credentials. The message is intentionally
  /// the same for every authentication failure cause.
  #[error("Invalid credentials")]
  Auth,
  /// Request carries both an agent token and an admin token.
  #[error("Ambiguous principal: multiple token types presented")]
  AmbiguousPrincipal,
  /// A valid token of the wrong type for this route.
  #[error("Token type not accepted on this route")]
  WrongTokenType,
  /// Principal does not own the referenced resource. Deliberately a
  /// 403 rather than 404, so existence is not revealed.
  #[error("Access denied")]
  OwnershipDenied,
  /// Token is valid but the site behind it has been deactivated.
  #[error("Invalid credentials")]
  InactivePrincipal,
  #[error("{0} not found")]
  NotFound(&'static str),
  /// The site already has an IN_PROGRESS batch.
  #[error("An active batch already exists for this site")]
  ActiveBatchExists,
  /// The account is at its IN_PROGRESS batch cap.
  #[error("Concurrent batch limit exceeded for this account")]
  ConcurrencyLimit,
  /// A lifecycle operation on a batch that is not IN_PROGRESS.
  #[error("{0}")]
  InvalidState(String),
  /// Object store call failed after retries.
  #[error("Object storage failure: {0}")]
  Storage(String),
  /// Unique-constraint race not otherwise classified, eg a filename
  /// already committed in the batch.
  #[error("{0}")]
  Conflict(String),
  #[error("{0}")]
  PayloadTooLarge(String),
  /// Anything unexpected. The cause is logged with a correlation id
  /// and never surfaced to the caller.
  #[error("Internal server error")]
  Internal,
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
  pub fn status(&self) -> StatusCode {
    use DomainError::*;
    match self {
      Validation(_) | AmbiguousPrincipal | InvalidState(_)
      | Conflict(_) => StatusCode::BAD_REQUEST,
      Auth => StatusCode::UNAUTHORIZED,
      WrongTokenType | OwnershipDenied | InactivePrincipal => {
        StatusCode::FORBIDDEN
      }
      NotFound(_) => StatusCode::NOT_FOUND,
      ActiveBatchExists => StatusCode::CONFLICT,
      PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      ConcurrencyLimit => StatusCode::TOO_MANY_REQUESTS,
      Storage(_) | Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Stable machine-readable code carried in the envelope.
  pub fn code(&self) -> &'static str {
    use DomainError::*;
    match self {
      Validation(_) => "VALIDATION",
      Auth => "AUTHENTICATION",
      AmbiguousPrincipal => "AMBIGUOUS_PRINCIPAL",
      WrongTokenType => "WRONG_TOKEN_TYPE",
      OwnershipDenied => "OWNERSHIP_DENIED",
      InactivePrincipal => "INACTIVE_PRINCIPAL",
      NotFound(_) => "NOT_FOUND",
      ActiveBatchExists => "ACTIVE_BATCH_EXISTS",
      ConcurrencyLimit => "CONCURRENCY_LIMIT",
      InvalidState(_) => "INVALID_STATE",
      Storage(_) => "STORAGE",
      Conflict(_) => "CONFLICT",
      PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
      Internal => "INTERNAL",
    }
  }
}

impl From<anyhow::Error> for DomainError {
  fn from(e: anyhow::Error) -> DomainError {
    let correlation_id = Uuid::new_v4();
    error!("Internal error | correlation: {correlation_id} | {e:#}");
    DomainError::Internal
  }
}

impl From<sqlx::Error> for DomainError {
  fn from(e: sqlx::Error) -> DomainError {
    anyhow::Error::from(e)
      .context("Database query failed")
      .into()
  }
}

/// Status + envelope fields, minus the request path which only the
/// [error_envelope] middleware knows.
#[derive(Debug, Clone)]
struct ErrorBody {
  error: String,
  message: String,
}

impl IntoResponse for DomainError {
  fn into_response(self) -> Response {
    let mut response = self.status().into_response();
    response.extensions_mut().insert(ErrorBody {
      error: self.code().to_string(),
      message: self.to_string(),
    });
    response
  }
}

/// Maps every error response onto the structured envelope
/// `{ status, error, message, path, timestamp }`.
///
/// Responses produced by [DomainError] carry their body in an
/// extension; anything else with an error status (extractor
/// rejections, fallback 404s) gets a generic envelope so the wire
/// shape is uniform.
pub async fn error_envelope(req: Request, next: Next) -> Response {
  let path = req.uri().path().to_string();
  let response = next.run(req).await;
  let status = response.status();
  if !status.is_client_error() && !status.is_server_error() {
    return response;
  }
  let (mut parts, _body) = response.into_parts();
  let ErrorBody { error, message } =
    match parts.extensions.remove::<ErrorBody>() {
      Some(body) => body,
      None => ErrorBody {
        error: status
          .canonical_reason()
          .unwrap_or("ERROR")
          .to_uppercase()
          .replace(' ', "_"),
        message: status
          .canonical_reason()
          .unwrap_or("Request failed")
          .to_string(),
      },
    };
  (
    status,
    axum::Json(ErrorEnvelope {
      status: status.as_u16(),
      error,
      message,
      path,
      timestamp: depot_timestamp(),
    }),
  )
    .into_response()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_follow_the_contract() {
    assert_eq!(
      DomainError::Validation("bad".into()).status(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(DomainError::Auth.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      DomainError::WrongTokenType.status(),
      StatusCode::FORBIDDEN
    );
    assert_eq!(
      DomainError::OwnershipDenied.status(),
      StatusCode::FORBIDDEN
    );
    assert_eq!(
      DomainError::NotFound("Batch").status(),
      StatusCode::NOT_FOUND
    );
    assert_eq!(
      DomainError::ActiveBatchExists.status(),
      StatusCode::CONFLICT
    );
    assert_eq!(
      DomainError::ConcurrencyLimit.status(),
      StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(
      DomainError::PayloadTooLarge("too big".into()).status(),
      StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(
      DomainError::InvalidState("terminal".into()).status(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      DomainError::Internal.status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[test]
  fn auth_failures_share_a_generic_message() {
    assert_eq!(
      DomainError::Auth.to_string(),
      DomainError::InactivePrincipal.to_string(),
    );
  }

  #[tokio::test]
  async fn envelope_carries_code_message_and_path() {
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    let app = Router::new()
      .route(
        "/boom",
        get(|| async {
          Err::<(), DomainError>(DomainError::ActiveBatchExists)
        }),
      )
      .layer(axum::middleware::from_fn(error_envelope));
    let response = app
      .oneshot(
        axum::http::Request::builder()
          .uri("/boom")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let bytes =
      axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let envelope: ErrorEnvelope =
      serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope.status, 409);
    assert_eq!(envelope.error, "ACTIVE_BATCH_EXISTS");
    assert_eq!(envelope.path, "/boom");
    assert!(!envelope.message.is_empty());
  }

  #[tokio::test]
  async fn framework_rejections_get_the_envelope_too() {
    use axum::{Router, body::Body};
    use tower::ServiceExt;

    let app = Router::new()
      .layer(axum::middleware::from_fn(error_envelope));
    let response = app
      .oneshot(
        axum::http::Request::builder()
          .uri("/no/such/route")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes =
      axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let envelope: ErrorEnvelope =
      serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope.error, "NOT_FOUND");
    assert_eq!(envelope.path, "/no/such/route");
  }
}
