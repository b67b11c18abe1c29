//! Error types for `sagip-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown emergency kind: {0:?}")]
  UnknownKind(String),

  #[error("unknown emergency status: {0:?}")]
  UnknownStatus(String),
}

/// The device could not produce a position fix at activation time.
#[derive(Debug, Clone, Error)]
#[error("location unavailable: {reason}")]
pub struct LocationUnavailable {
  pub reason: String,
}

impl LocationUnavailable {
  pub fn new(reason: impl Into<String>) -> Self { Self { reason: reason.into() } }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
