//! Error types for the gate

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// A required secret or allow-list is missing from the environment.
  #[error("{0} is not set.")]
  Config(&'static str),

  #[error(transparent)]
  Redemption(#[from] Redemption),

  #[error("Free limit reached ({used}/{limit})")]
  LimitReached { used: u64, limit: u64 },

  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Redemption {
  #[error("Invalid license key format.")]
  InvalidFormat,

  #[error("Server is not configured with LICENSE_KEYS.")]
  ServerMisconfigured,

  #[error("License key not recognized.")]
  NotRecognized,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      Error::Config(_) | Error::Internal(_) => {
        error!("Request failed: {self:#}");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          json::json!({ "error": "Server error", "details": self.to_string() }),
        )
      }
      Error::Redemption(kind) => {
        let status = match kind {
          Redemption::InvalidFormat => StatusCode::BAD_REQUEST,
          Redemption::NotRecognized => StatusCode::UNAUTHORIZED,
          Redemption::ServerMisconfigured => {
            error!("License redemption attempted without LICENSE_KEYS");
            StatusCode::INTERNAL_SERVER_ERROR
          }
        };
        (status, json::json!({ "error": kind.to_string() }))
      }
      Error::LimitReached { .. } => (
        StatusCode::PAYMENT_REQUIRED,
        json::json!({
          "error": "Free limit reached",
          "code": "FREE_LIMIT_REACHED",
        }),
      ),
    };

    (status, Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
