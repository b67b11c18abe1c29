use sagip_core::LocationUnavailable;
use thiserror::Error;

/// Boxed backend error, so callers need not name the store's error type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why an activation was refused.
#[derive(Debug, Error)]
pub enum ActivateError {
  #[error("no authenticated requester")]
  NotAuthenticated,

  #[error(transparent)]
  LocationUnavailable(#[from] LocationUnavailable),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl ActivateError {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

/// Failure of one assignment commit. Never surfaced to the requester; the
/// session logs it and keeps searching.
#[derive(Debug, Error)]
pub(crate) enum CommitError {
  #[error("responder {0} was claimed by another emergency first")]
  ClaimConflict(uuid::Uuid),

  #[error("persistence failure: {0}")]
  Persistence(#[source] BoxError),
}

pub type Result<T, E = ActivateError> = std::result::Result<T, E>;
