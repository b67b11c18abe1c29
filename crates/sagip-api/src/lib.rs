//! JSON REST API for sagip.
//!
//! Exposes an axum [`Router`] backed by a [`Dispatcher`] over any
//! [`EmergencyStore`]. Authentication happens upstream; requesters are
//! identified by the `x-requester-id` header (see [`requester`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", sagip_api::api_router(dispatcher.clone()))
//! ```

pub mod emergencies;
pub mod error;
pub mod requester;
pub mod responders;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use sagip_core::directory::EmergencyStore;
use sagip_dispatch::Dispatcher;

pub use error::ApiError;
pub use requester::{REQUESTER_HEADER, Requester};

/// Build a fully-materialised API router for `dispatcher`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(dispatcher: Arc<Dispatcher<S>>) -> Router<()>
where
  S: EmergencyStore + 'static,
{
  Router::new()
    // Requester side
    .route("/emergencies", post(emergencies::activate::<S>))
    .route(
      "/emergencies/current",
      get(emergencies::current::<S>).delete(emergencies::cancel::<S>),
    )
    .route("/emergencies/history", get(emergencies::history::<S>))
    .route("/emergencies/{id}/complete", post(emergencies::complete::<S>))
    // Responder side
    .route("/responders", get(responders::list::<S>).post(responders::register::<S>))
    .route("/responders/{id}", get(responders::get_one::<S>))
    .route("/responders/{id}/location", put(responders::update_location::<S>))
    .route("/responders/{id}/availability", put(responders::set_availability::<S>))
    .with_state(dispatcher)
}
