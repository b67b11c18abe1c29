//! Requester identity, taken from the `x-requester-id` header.
//!
//! Whatever sits in front of the API (a gateway, a session layer) is trusted
//! to have authenticated the caller and set the header.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const REQUESTER_HEADER: &str = "x-requester-id";

/// The calling requester, or `None` when the header is missing or is not a
/// UUID.
#[derive(Debug, Clone, Copy)]
pub struct Requester(pub Option<Uuid>);

impl Requester {
  pub fn require(self) -> Result<Uuid, ApiError> { self.0.ok_or(ApiError::NotAuthenticated) }
}

impl<S: Send + Sync> FromRequestParts<S> for Requester {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
    let id = parts
      .headers
      .get(REQUESTER_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|s| Uuid::parse_str(s.trim()).ok());
    Ok(Requester(id))
  }
}
