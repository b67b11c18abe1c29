//! [`DispatchView`]: what the map and home screens render.

use chrono::{DateTime, Utc};
use sagip_core::{
  emergency::{EmergencyKind, EmergencyRequest, EmergencyStatus},
  geo::{eta_from_distance, format_distance},
  responder::ResponderSummary,
};
use serde::Serialize;
use uuid::Uuid;

/// Why a request ended up `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
  Requester,
  /// The configured maximum search duration ran out.
  SearchTimeout,
}

/// Observable state of one emergency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchView {
  pub emergency_id:   Uuid,
  pub kind:           EmergencyKind,
  pub status:         EmergencyStatus,
  pub responder:      Option<ResponderSummary>,
  pub distance_km:    Option<f64>,
  /// e.g. `850m`, `1.5km`
  pub distance_label: Option<String>,
  /// e.g. `3 mins`, `1h 5m`
  pub eta:            Option<String>,
  pub eta_minutes:    Option<u32>,
  pub cancel_reason:  Option<CancelReason>,
  pub updated_at:     DateTime<Utc>,
}

impl DispatchView {
  pub fn new(emergency: &EmergencyRequest, responder: Option<ResponderSummary>) -> Self {
    let mut view = Self {
      emergency_id: emergency.emergency_id,
      kind: emergency.kind,
      status: emergency.status,
      responder,
      distance_km: None,
      distance_label: None,
      eta: None,
      eta_minutes: None,
      cancel_reason: None,
      updated_at: emergency.updated_at,
    };
    if let Some(km) = emergency.distance_km {
      view.set_distance(km);
    }
    view
  }

  pub fn set_distance(&mut self, km: f64) {
    let eta = eta_from_distance(km);
    self.distance_km = Some(km);
    self.distance_label = Some(format_distance(km));
    self.eta = Some(eta.to_string());
    self.eta_minutes = Some(eta.minutes());
  }

  pub fn is_searching(&self) -> bool { self.status == EmergencyStatus::Searching }
}
