//! The emergency record. One active alert per requester.
//!
//! Status only moves forward:
//!
//! ```text
//! searching ──▶ assigned ──▶ completed
//!     │             │
//!     └──────┬──────┘
//!            ▼
//!        cancelled
//! ```
//!
//! A request never goes back to `searching` once assigned; a requester who
//! wants a new responder cancels and activates again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::geo::GeoPoint;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The closed set of emergency categories. A responder's kind matches the
/// category it answers.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmergencyKind {
  Police,
  Medical,
  Fire,
  Flood,
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmergencyStatus {
  Searching,
  Assigned,
  Cancelled,
  Completed,
}

impl EmergencyStatus {
  pub fn is_terminal(&self) -> bool { matches!(self, Self::Cancelled | Self::Completed) }

  /// Whether the status diagram allows moving from `self` to `next`.
  pub fn can_transition_to(&self, next: EmergencyStatus) -> bool {
    use EmergencyStatus::*;
    matches!(
      (self, next),
      (Searching, Assigned) | (Assigned, Completed) | (Searching | Assigned, Cancelled)
    )
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// One alert raised by a requester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyRequest {
  pub emergency_id: Uuid,
  pub requester_id: Uuid,
  pub kind:         EmergencyKind,
  pub status:       EmergencyStatus,
  /// Requester location, captured once at activation and never refreshed.
  pub origin:       GeoPoint,
  pub responder_id: Option<Uuid>,
  /// Last known distance between the assigned responder and `origin`.
  pub distance_km:  Option<f64>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// Input to [`crate::directory::EmergencyStore::open_emergency`]. The store
/// assigns the id and timestamps; the status always starts at `searching`.
#[derive(Debug, Clone)]
pub struct NewEmergency {
  pub requester_id: Uuid,
  pub kind:         EmergencyKind,
  pub origin:       GeoPoint,
}

/// A request that reached a terminal status and left the active table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedEmergency {
  #[serde(flatten)]
  pub emergency:   EmergencyRequest,
  pub archived_at: DateTime<Utc>,
}
