//! Collaborator traits the dispatch engine is written against.
//!
//! [`ResponderDirectory`] and [`EmergencyStore`] are implemented by storage
//! backends (e.g. `sagip-store-sqlite`); [`LocationSource`] by whatever knows
//! where the requester is. Nothing in `sagip-dispatch` depends on a concrete
//! backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  emergency::{ArchivedEmergency, EmergencyKind, EmergencyRequest, NewEmergency},
  error::LocationUnavailable,
  geo::GeoPoint,
  responder::{NewResponder, Responder},
  subscription::Subscription,
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of a conditional claim on a responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
  Claimed,
  /// The responder was no longer available when the write ran.
  AlreadyClaimed,
}

/// Result of [`EmergencyStore::open_emergency`].
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
  Opened(EmergencyRequest),
  /// The requester already had a non-terminal request; nothing was written.
  Existing(EmergencyRequest),
}

impl OpenOutcome {
  pub fn into_inner(self) -> EmergencyRequest {
    match self {
      Self::Opened(r) | Self::Existing(r) => r,
    }
  }
}

// ─── Responders ──────────────────────────────────────────────────────────────

/// Read/write access to responder records plus live queries over them.
///
/// All methods return `Send` futures so implementations can be driven from
/// spawned tokio tasks.
pub trait ResponderDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Responder client side ─────────────────────────────────────────────

  fn register_responder(
    &self,
    input: NewResponder,
  ) -> impl Future<Output = Result<Responder, Self::Error>> + Send + '_;

  fn get_responder(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Responder>, Self::Error>> + Send + '_;

  /// List responders, optionally restricted to one kind.
  fn list_responders(
    &self,
    kind: Option<EmergencyKind>,
  ) -> impl Future<Output = Result<Vec<Responder>, Self::Error>> + Send + '_;

  /// Report a new position, or `None` when the device lost its fix.
  fn update_responder_location(
    &self,
    id: Uuid,
    location: Option<GeoPoint>,
  ) -> impl Future<Output = Result<Responder, Self::Error>> + Send + '_;

  /// Go on or off duty. Going on duty is refused while an emergency holds
  /// the responder.
  fn set_responder_availability(
    &self,
    id: Uuid,
    available: bool,
  ) -> impl Future<Output = Result<Responder, Self::Error>> + Send + '_;

  // ── Live queries ──────────────────────────────────────────────────────

  /// Push the full set of available responders of `kind`: once on
  /// subscription, then whenever that set (or a member's location) changes.
  fn subscribe_available_responders(
    &self,
    kind: EmergencyKind,
  ) -> impl Future<Output = Result<Subscription<Vec<Responder>>, Self::Error>> + Send + '_;

  /// Push one responder's location: once on subscription, then on every
  /// change. `None` means the responder has no location on record.
  fn subscribe_responder_location(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Subscription<Option<GeoPoint>>, Self::Error>> + Send + '_;

  // ── Dispatch writes ───────────────────────────────────────────────────

  /// Mark the responder unavailable and held by `emergency_id`, but only if
  /// it is still available. Both fields change in one write.
  fn try_claim_responder(
    &self,
    id: Uuid,
    emergency_id: Uuid,
  ) -> impl Future<Output = Result<ClaimOutcome, Self::Error>> + Send + '_;

  /// Make the responder available again and clear its assignment. Only
  /// touches a responder still held by `emergency_id`; returns whether it did.
  fn release_responder(
    &self,
    id: Uuid,
    emergency_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Emergencies ─────────────────────────────────────────────────────────────

/// Durable emergency records.
///
/// Shares its error type with [`ResponderDirectory`]: both live in the same
/// document store. Every status change is conditional on the prior status,
/// which is what serialises assignment commits against cancellation.
pub trait EmergencyStore: ResponderDirectory {
  /// Insert a `searching` request unless the requester already has a
  /// non-terminal one, in which case that one is returned untouched.
  fn open_emergency(
    &self,
    input: NewEmergency,
  ) -> impl Future<Output = Result<OpenOutcome, Self::Error>> + Send + '_;

  fn get_emergency(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<EmergencyRequest>, Self::Error>> + Send + '_;

  fn active_emergency_for(
    &self,
    requester_id: Uuid,
  ) -> impl Future<Output = Result<Option<EmergencyRequest>, Self::Error>> + Send + '_;

  /// All non-terminal requests, oldest first.
  fn list_active_emergencies(
    &self,
  ) -> impl Future<Output = Result<Vec<EmergencyRequest>, Self::Error>> + Send + '_;

  /// `searching → assigned` with the responder and initial distance.
  /// Returns `None` when the request is no longer `searching`.
  fn mark_assigned(
    &self,
    id: Uuid,
    responder_id: Uuid,
    distance_km: f64,
  ) -> impl Future<Output = Result<Option<EmergencyRequest>, Self::Error>> + Send + '_;

  /// Overwrite the last known distance while the request is `assigned`.
  fn record_distance(
    &self,
    id: Uuid,
    distance_km: f64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// `searching | assigned → cancelled`. Returns the cancelled record, or
  /// `None` when it was already terminal or does not exist.
  fn mark_cancelled(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<EmergencyRequest>, Self::Error>> + Send + '_;

  /// `assigned → completed`, driven by responder or admin tooling.
  fn complete_emergency(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<EmergencyRequest>, Self::Error>> + Send + '_;

  /// Move a terminal request out of the active set. Returns `false` when
  /// there was nothing to move.
  fn archive_emergency(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Archived requests for one requester, newest first.
  fn archived_for(
    &self,
    requester_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ArchivedEmergency>, Self::Error>> + Send + '_;

  /// Push the record on subscription and after every change. `None` means it
  /// has left the active set.
  fn watch_emergency(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Subscription<Option<EmergencyRequest>>, Self::Error>> + Send + '_;
}

// ─── Requester location ──────────────────────────────────────────────────────

/// Where the requester is right now. Called once per activation.
pub trait LocationSource: Send + Sync {
  fn current_location(
    &self,
  ) -> impl Future<Output = Result<GeoPoint, LocationUnavailable>> + Send + '_;
}

/// A position already obtained by the requester's device and handed over
/// with the activation call.
#[derive(Debug, Clone, Copy)]
pub struct ReportedLocation(pub Option<GeoPoint>);

impl LocationSource for ReportedLocation {
  async fn current_location(&self) -> Result<GeoPoint, LocationUnavailable> {
    match self.0 {
      Some(point) if point.is_valid() => Ok(point),
      Some(point) => Err(LocationUnavailable::new(format!(
        "invalid fix ({}, {})",
        point.latitude, point.longitude
      ))),
      None => Err(LocationUnavailable::new("no position fix reported")),
    }
  }
}
