//! Great-circle distance, travel-time estimate, and distance labels.
//!
//! The selector and the reconciliation loop both read "how close" and "how
//! soon" from here, so an initial assignment and a later live update always
//! agree on the numbers they show.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed responder speed in urban traffic.
pub const RESPONDER_SPEED_KMH: f64 = 30.0;

// ─── GeoPoint ────────────────────────────────────────────────────────────────

/// A WGS-84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub latitude:  f64,
  pub longitude: f64,
}

impl GeoPoint {
  pub fn new(latitude: f64, longitude: f64) -> Self { Self { latitude, longitude } }

  /// `true` when both components are finite and inside their ranges.
  pub fn is_valid(&self) -> bool {
    self.latitude.is_finite()
      && self.longitude.is_finite()
      && (-90.0..=90.0).contains(&self.latitude)
      && (-180.0..=180.0).contains(&self.longitude)
  }

  pub fn distance_to(&self, other: &GeoPoint) -> f64 {
    distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
  }
}

// ─── Distance ────────────────────────────────────────────────────────────────

/// Haversine distance in kilometres between two points given in degrees.
///
/// Total: NaN inputs yield NaN, so callers must guard untrusted coordinates
/// (see [`GeoPoint::is_valid`]).
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let d_lat = (lat2 - lat1).to_radians();
  let d_lon = (lon2 - lon1).to_radians();

  let a = (d_lat / 2.0).sin().powi(2)
    + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
  let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

  EARTH_RADIUS_KM * c
}

/// `850m` below one kilometre, `1.5km` from there on.
pub fn format_distance(km: f64) -> String {
  if km < 1.0 {
    format!("{}m", (km * 1000.0).round() as i64)
  } else {
    format!("{km:.1}km")
  }
}

// ─── ETA ─────────────────────────────────────────────────────────────────────

/// Estimated travel time in whole minutes, always rounded up.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Eta {
  minutes: u32,
}

impl Eta {
  pub fn minutes(&self) -> u32 { self.minutes }
}

impl fmt::Display for Eta {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.minutes {
      0 => f.write_str("< 1 min"),
      1 => f.write_str("1 min"),
      m if m < 60 => write!(f, "{m} mins"),
      m => {
        let (hours, rest) = (m / 60, m % 60);
        if rest == 0 {
          write!(f, "{hours}h")
        } else {
          write!(f, "{hours}h {rest}m")
        }
      }
    }
  }
}

/// Travel time at [`RESPONDER_SPEED_KMH`].
///
/// The distance is first rounded to the 0.1 km precision that
/// [`format_distance`] displays, so the ETA shown next to a distance label is
/// the one that label implies. That rounding can come in under a strict
/// ceiling of the raw distance: 1.549 km reads as 1.5 km and estimates
/// 3 mins, not 4. Negative and NaN distances estimate to zero.
pub fn eta_from_distance(km: f64) -> Eta {
  let shown_km = (km * 10.0).round() / 10.0;
  let minutes = (shown_km * 60.0 / RESPONDER_SPEED_KMH).ceil();

  let minutes = if minutes.is_nan() || minutes <= 0.0 {
    0
  } else if minutes >= f64::from(u32::MAX) {
    u32::MAX
  } else {
    minutes as u32
  };
  Eta { minutes }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn haversine_matches_known_distance() {
    // Intramuros to Makati CBD.
    let d = distance_km(14.5896, 120.9747, 14.5547, 121.0244);
    assert!((d - 6.61).abs() < 0.05, "got {d}");
  }

  #[test]
  fn zero_distance_to_self() {
    assert_eq!(distance_km(14.5, 121.0, 14.5, 121.0), 0.0);
  }

  #[test]
  fn nan_propagates() {
    assert!(distance_km(f64::NAN, 0.0, 0.0, 0.0).is_nan());
    assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    assert!(!GeoPoint::new(91.0, 0.0).is_valid());
    assert!(GeoPoint::new(-90.0, 180.0).is_valid());
  }

  #[test]
  fn eta_formatting() {
    assert_eq!(eta_from_distance(0.0).to_string(), "< 1 min");
    assert_eq!(eta_from_distance(0.3).to_string(), "1 min");
    assert_eq!(eta_from_distance(1.5).to_string(), "3 mins");
    assert_eq!(eta_from_distance(2.0).to_string(), "4 mins");
    assert_eq!(eta_from_distance(30.0).to_string(), "1h");
    assert_eq!(eta_from_distance(32.5).to_string(), "1h 5m");
    assert_eq!(eta_from_distance(100.0).to_string(), "3h 20m");
  }

  #[test]
  fn eta_rounds_up() {
    // 1.6 km at 30 km/h is 3.2 minutes.
    assert_eq!(eta_from_distance(1.6).minutes(), 4);
  }

  #[test]
  fn eta_follows_the_displayed_distance() {
    assert_eq!(format_distance(1.549), "1.5km");
    assert_eq!(eta_from_distance(1.549).minutes(), 3);
    assert_eq!(eta_from_distance(1.551).minutes(), 4);
  }

  #[test]
  fn eta_is_monotonic() {
    let mut last = eta_from_distance(0.0);
    for step in 0..5000 {
      let eta = eta_from_distance(f64::from(step) * 0.037);
      assert!(eta >= last, "eta decreased at step {step}");
      last = eta;
    }
  }

  #[test]
  fn eta_degenerate_inputs() {
    assert_eq!(eta_from_distance(-3.0).minutes(), 0);
    assert_eq!(eta_from_distance(f64::NAN).minutes(), 0);
    assert_eq!(eta_from_distance(f64::INFINITY).minutes(), u32::MAX);
  }

  #[test]
  fn distance_labels() {
    assert_eq!(format_distance(0.0), "0m");
    assert_eq!(format_distance(0.8504), "850m");
    assert_eq!(format_distance(1.0), "1.0km");
    assert_eq!(format_distance(1.5476), "1.5km");
    assert_eq!(format_distance(12.34), "12.3km");
    assert_eq!(format_distance(0.8504), format_distance(0.8504));
  }
}
