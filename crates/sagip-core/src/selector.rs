//! Nearest-responder selection over one snapshot.

use serde::Serialize;

use crate::{geo::GeoPoint, responder::Responder};

/// Distance assumed for a candidate that has not reported a location yet.
///
/// Keeps GPS-less responders reachable at the cost of an imprecise ETA. The
/// ETA and distance labels shown downstream are calibrated against this exact
/// figure.
pub const NO_LOCATION_DISTANCE_KM: f64 = 5.0;

/// The responder chosen by one selection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
  pub responder:    Responder,
  pub distance_km:  f64,
  /// `true` when `distance_km` is [`NO_LOCATION_DISTANCE_KM`] rather than a
  /// measured distance.
  pub estimated:    bool,
}

/// Pick the candidate closest to `origin`.
///
/// `candidates` must already be filtered to the right kind and to available
/// responders; nothing is filtered here. Exact ties go to the candidate seen
/// first. A candidate without a usable location is taken at
/// [`NO_LOCATION_DISTANCE_KM`] only while no located candidate has been seen,
/// and any located candidate replaces it.
pub fn select_nearest(candidates: &[Responder], origin: GeoPoint) -> Option<CandidateResult> {
  let mut best: Option<(&Responder, f64, bool)> = None;

  for candidate in candidates {
    match candidate.valid_location() {
      Some(location) => {
        let distance = origin.distance_to(&location);
        let better = match best {
          None => true,
          Some((_, _, true)) => true,
          Some((_, best_distance, false)) => distance < best_distance,
        };
        if better {
          best = Some((candidate, distance, false));
        }
      }
      None => {
        if best.is_none() {
          best = Some((candidate, NO_LOCATION_DISTANCE_KM, true));
        }
      }
    }
  }

  best.map(|(responder, distance_km, estimated)| CandidateResult {
    responder: responder.clone(),
    distance_km,
    estimated,
  })
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::*;
  use crate::{emergency::EmergencyKind, geo::eta_from_distance};

  const ORIGIN: GeoPoint = GeoPoint { latitude: 14.5378, longitude: 120.9893 };

  fn responder(name: &str, location: Option<(f64, f64)>) -> Responder {
    Responder {
      responder_id:        Uuid::new_v4(),
      name:                name.into(),
      kind:                EmergencyKind::Medical,
      available:           true,
      location:            location.map(|(lat, lon)| GeoPoint::new(lat, lon)),
      location_updated_at: None,
      assigned_emergency:  None,
    }
  }

  #[test]
  fn empty_snapshot_selects_nothing() {
    assert!(select_nearest(&[], ORIGIN).is_none());
  }

  #[test]
  fn picks_minimum_distance() {
    let candidates = vec![
      responder("far", Some((14.60, 121.05))),
      responder("near", Some((14.5478, 120.9993))),
      responder("middle", Some((14.57, 121.01))),
    ];
    let chosen = select_nearest(&candidates, ORIGIN).unwrap();
    assert_eq!(chosen.responder.name, "near");
    assert!(!chosen.estimated);
    assert!((chosen.distance_km - 1.5).abs() < 0.06);
    assert_eq!(eta_from_distance(chosen.distance_km).to_string(), "3 mins");
  }

  #[test]
  fn ties_go_to_first_seen() {
    let candidates = vec![
      responder("first", Some((14.5478, 120.9993))),
      responder("second", Some((14.5478, 120.9993))),
    ];
    let chosen = select_nearest(&candidates, ORIGIN).unwrap();
    assert_eq!(chosen.responder.name, "first");
  }

  #[test]
  fn unlocated_only_snapshot_falls_back_to_first() {
    let candidates = vec![responder("a", None), responder("b", None)];
    let chosen = select_nearest(&candidates, ORIGIN).unwrap();
    assert_eq!(chosen.responder.name, "a");
    assert_eq!(chosen.distance_km, NO_LOCATION_DISTANCE_KM);
    assert!(chosen.estimated);
  }

  #[test]
  fn located_candidate_beats_fallback_even_when_farther() {
    let candidates = vec![
      responder("gps-less", None),
      responder("twenty-km", Some((14.72, 120.9893))),
    ];
    let chosen = select_nearest(&candidates, ORIGIN).unwrap();
    assert_eq!(chosen.responder.name, "twenty-km");
    assert!(!chosen.estimated);
    assert!(chosen.distance_km > NO_LOCATION_DISTANCE_KM);
  }

  #[test]
  fn unlocated_ignored_after_located_found() {
    let candidates = vec![
      responder("located", Some((14.60, 121.05))),
      responder("gps-less", None),
    ];
    let chosen = select_nearest(&candidates, ORIGIN).unwrap();
    assert_eq!(chosen.responder.name, "located");
  }

  #[test]
  fn invalid_coordinates_count_as_unlocated() {
    let candidates = vec![
      responder("broken", Some((f64::NAN, 120.0))),
      responder("ok", Some((14.60, 121.05))),
    ];
    let chosen = select_nearest(&candidates, ORIGIN).unwrap();
    assert_eq!(chosen.responder.name, "ok");
    assert!(chosen.distance_km.is_finite());
  }
}
