//! Error type for `sagip-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sagip_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("responder not found: {0}")]
  ResponderNotFound(uuid::Uuid),

  /// A responder tried to go on duty while an emergency still holds it.
  #[error("responder {0} is assigned to an emergency")]
  ResponderAssigned(uuid::Uuid),

  #[error("invalid location ({latitude}, {longitude})")]
  InvalidLocation { latitude: f64, longitude: f64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
