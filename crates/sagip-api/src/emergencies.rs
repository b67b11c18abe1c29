//! Handlers for `/emergencies` endpoints. All of them act on behalf of the
//! requester named by the `x-requester-id` header.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/emergencies` | Body: `{"kind":"medical","location":{...}}`; reuses an active request |
//! | `GET`    | `/emergencies/current` | Live dispatch view; 404 if none |
//! | `DELETE` | `/emergencies/current` | Cancel; 204 even when there is nothing to cancel |
//! | `GET`    | `/emergencies/history` | Archived requests, newest first |
//! | `POST`   | `/emergencies/:id/complete` | Responder or admin tooling; 409 unless `assigned` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use sagip_core::{
  directory::{EmergencyStore, ReportedLocation},
  emergency::{ArchivedEmergency, EmergencyKind, EmergencyRequest, EmergencyStatus},
  geo::GeoPoint,
};
use sagip_dispatch::{DispatchView, Dispatcher};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, requester::Requester};

// ─── Activate ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActivateBody {
  pub kind:     EmergencyKind,
  /// The device's position fix. Absent when the device has none.
  #[serde(default)]
  pub location: Option<GeoPoint>,
}

/// `POST /emergencies`
pub async fn activate<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  requester: Requester,
  Json(body): Json<ActivateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EmergencyStore + 'static,
{
  let emergency = dispatcher
    .activate(requester.0, body.kind, &ReportedLocation(body.location))
    .await?;
  Ok((StatusCode::CREATED, Json(emergency)))
}

// ─── Current ──────────────────────────────────────────────────────────────────

/// `GET /emergencies/current`
pub async fn current<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  requester: Requester,
) -> Result<Json<DispatchView>, ApiError>
where
  S: EmergencyStore + 'static,
{
  let requester_id = requester.require()?;
  let view = dispatcher
    .view(requester_id)
    .await
    .map_err(ApiError::Store)?
    .ok_or_else(|| ApiError::NotFound("no emergency for this requester".into()))?;
  Ok(Json(view))
}

/// `DELETE /emergencies/current`
pub async fn cancel<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  requester: Requester,
) -> Result<StatusCode, ApiError>
where
  S: EmergencyStore + 'static,
{
  let requester_id = requester.require()?;
  dispatcher.cancel(requester_id).await;
  Ok(StatusCode::NO_CONTENT)
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /emergencies/history`
pub async fn history<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  requester: Requester,
) -> Result<Json<Vec<ArchivedEmergency>>, ApiError>
where
  S: EmergencyStore + 'static,
{
  let requester_id = requester.require()?;
  let archived = dispatcher.store().archived_for(requester_id).await.map_err(ApiError::store)?;
  Ok(Json(archived))
}

// ─── Complete ─────────────────────────────────────────────────────────────────

/// `POST /emergencies/:id/complete`
///
/// Only flips the status; the running session releases the responder and
/// archives the record once it sees the change.
pub async fn complete<S>(
  State(dispatcher): State<Arc<Dispatcher<S>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<EmergencyRequest>, ApiError>
where
  S: EmergencyStore + 'static,
{
  let store = dispatcher.store();
  let Some(current) = store.get_emergency(id).await.map_err(ApiError::store)? else {
    return Err(ApiError::NotFound(format!("emergency {id} not found")));
  };
  let conflict =
    || ApiError::Conflict(format!("emergency {id} is {}, not assigned", current.status));
  if !current.status.can_transition_to(EmergencyStatus::Completed) {
    return Err(conflict());
  }
  // The status can still move between the read and the guarded write.
  store.complete_emergency(id).await.map_err(ApiError::store)?.map(Json).ok_or_else(conflict)
}
