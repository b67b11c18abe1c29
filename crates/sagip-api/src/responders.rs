//! Handlers for `/responders` endpoints, used by responder clients and
//! admin tooling.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/responders` | Optional `?kind=police\|medical\|fire\|flood` |
//! | `POST` | `/responders` | Body: `{"name":"Unit 7","kind":"medical"}` |
//! | `GET`  | `/responders/:id` | 404 if not found |
//! | `PUT`  | `/responders/:id/location` | Body: `{"location":{...}}` or `{"location":null}` |
//! | `PUT`  | `/responders/:id/availability` | Body: `{"available":true}`; 409 while assigned |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use sagip_core::{
  directory::EmergencyStore,
  emergency::EmergencyKind,
  geo::GeoPoint,
  responder::{NewResponder, Responder},
};
use sagip_dispatch::Dispatcher;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

fn check_location(location: Option<GeoPoint>) -> Result<(), ApiError> {
  match location {
    Some(p) if !p.is_valid() => Err(ApiError::BadRequest(format!(
      "invalid location ({}, {})",
      p.latitude, p.longitude
    ))),
    _ => Ok(()),
  }
}

async fn require<S: EmergencyStore>(store: &S, id: Uuid) -> Result<Responder, ApiError> {
  store
    .get_responder(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("responder {id} not found")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub kind: Option<EmergencyKind>,
}

/// `GET /responders[?kind=<kind>]`
pub async fn list<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Responder>>, ApiError>
where
  S: EmergencyStore + 'static,
{
  let responders = dispatcher
    .store()
    .list_responders(params.kind)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(responders))
}

// ─── Register ─────────────────────────────────────────────────────────────────

/// `POST /responders`
pub async fn register<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  Json(body): Json<NewResponder>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EmergencyStore + 'static,
{
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  check_location(body.location)?;
  let responder = dispatcher
    .store()
    .register_responder(body)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(responder)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /responders/:id`
pub async fn get_one<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Responder>, ApiError>
where
  S: EmergencyStore + 'static,
{
  Ok(Json(require(&**dispatcher.store(), id).await?))
}

// ─── Location ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LocationBody {
  pub location: Option<GeoPoint>,
}

/// `PUT /responders/:id/location`
pub async fn update_location<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<LocationBody>,
) -> Result<Json<Responder>, ApiError>
where
  S: EmergencyStore + 'static,
{
  let store = dispatcher.store();
  check_location(body.location)?;
  require(&**store, id).await?;
  let responder = store
    .update_responder_location(id, body.location)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(responder))
}

// ─── Availability ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AvailabilityBody {
  pub available: bool,
}

/// `PUT /responders/:id/availability`
pub async fn set_availability<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AvailabilityBody>,
) -> Result<Json<Responder>, ApiError>
where
  S: EmergencyStore + 'static,
{
  let store = dispatcher.store();
  let current = require(&**store, id).await?;
  if body.available
    && let Some(emergency_id) = current.assigned_emergency
  {
    return Err(ApiError::Conflict(format!(
      "responder {id} is assigned to emergency {emergency_id}"
    )));
  }
  let responder = store
    .set_responder_availability(id, body.available)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(responder))
}
