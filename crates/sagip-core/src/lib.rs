//! Core types and collaborator traits for the Sagip dispatch engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the pure pieces (geodistance, ETA, nearest-responder selection) and the
//! traits that storage backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod directory;
pub mod emergency;
pub mod error;
pub mod geo;
pub mod responder;
pub mod selector;
pub mod subscription;

pub use error::{Error, LocationUnavailable, Result};
