//! Responders: the emergency-service actors that can be dispatched.
//!
//! A responder's location and duty status belong to the responder's own
//! client. The dispatch core only flips `available` and `assigned_emergency`,
//! and always flips them together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{emergency::EmergencyKind, geo::GeoPoint};

/// One emergency-service actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responder {
  pub responder_id:        Uuid,
  pub name:                String,
  /// The emergency kind this responder answers.
  pub kind:                EmergencyKind,
  pub available:           bool,
  /// Not every responder reports GPS.
  pub location:            Option<GeoPoint>,
  pub location_updated_at: Option<DateTime<Utc>>,
  /// The emergency currently holding this responder, if any.
  pub assigned_emergency:  Option<Uuid>,
}

impl Responder {
  /// The reported location, if it is usable for distance computations.
  pub fn valid_location(&self) -> Option<GeoPoint> {
    self.location.filter(GeoPoint::is_valid)
  }

  /// `available` and `assigned_emergency` agree, or the responder is merely
  /// off duty (unavailable with no assignment).
  pub fn is_consistent(&self) -> bool { !(self.available && self.assigned_emergency.is_some()) }
}

/// Input to [`crate::directory::ResponderDirectory::register_responder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResponder {
  pub name:     String,
  pub kind:     EmergencyKind,
  #[serde(default)]
  pub location: Option<GeoPoint>,
}

/// The slice of a responder that requesters get to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderSummary {
  pub responder_id: Uuid,
  pub name:         String,
  pub kind:         EmergencyKind,
}

impl From<&Responder> for ResponderSummary {
  fn from(r: &Responder) -> Self {
    Self { responder_id: r.responder_id, name: r.name.clone(), kind: r.kind }
  }
}
