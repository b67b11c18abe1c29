//! SQLite backend for the Sagip dispatch engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime, and layers in-process change
//! notifications on top so the live queries of
//! [`sagip_core::directory::ResponderDirectory`] can push.

mod encode;
mod feed;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
