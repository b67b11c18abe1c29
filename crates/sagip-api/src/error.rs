//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sagip_dispatch::ActivateError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("missing or invalid x-requester-id header")]
  NotAuthenticated,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("{0}")]
  LocationUnavailable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<ActivateError> for ApiError {
  fn from(e: ActivateError) -> Self {
    match e {
      ActivateError::NotAuthenticated => Self::NotAuthenticated,
      ActivateError::LocationUnavailable(e) => Self::LocationUnavailable(e.to_string()),
      ActivateError::Store(e) => Self::Store(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::LocationUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let message = match self {
      ApiError::NotFound(m) | ApiError::BadRequest(m) | ApiError::Conflict(m) => m,
      other => other.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
