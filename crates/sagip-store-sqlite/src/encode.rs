//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Enums are stored as their
//! lowercase names. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sagip_core::{
  emergency::{ArchivedEmergency, EmergencyKind, EmergencyRequest, EmergencyStatus},
  geo::GeoPoint,
  responder::Responder,
};
use uuid::Uuid;

use crate::{Error, Result};

/// Column list shared by every responder `SELECT`, in [`responder_row`] order.
pub const RESPONDER_COLUMNS: &str = "responder_id, name, kind, available, latitude, longitude, \
                                     location_updated_at, assigned_emergency";

/// Column list shared by the active and archive tables, in [`emergency_row`]
/// order.
pub const EMERGENCY_COLUMNS: &str = "emergency_id, requester_id, kind, status, origin_latitude, \
                                     origin_longitude, responder_id, distance_km, created_at, \
                                     updated_at";

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> { s.map(decode_uuid).transpose() }

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn encode_kind(k: EmergencyKind) -> &'static str {
  match k {
    EmergencyKind::Police => "police",
    EmergencyKind::Medical => "medical",
    EmergencyKind::Fire => "fire",
    EmergencyKind::Flood => "flood",
  }
}

pub fn decode_kind(s: &str) -> Result<EmergencyKind> {
  EmergencyKind::from_str(s).map_err(|_| sagip_core::Error::UnknownKind(s.to_owned()).into())
}

pub fn decode_status(s: &str) -> Result<EmergencyStatus> {
  EmergencyStatus::from_str(s).map_err(|_| sagip_core::Error::UnknownStatus(s.to_owned()).into())
}

// ─── Raw row types ───────────────────────────────────────────────────────────

/// A `responders` row before decoding.
#[derive(Debug)]
pub struct RawResponder {
  pub responder_id:        String,
  pub name:                String,
  pub kind:                String,
  pub available:           bool,
  pub latitude:            Option<f64>,
  pub longitude:           Option<f64>,
  pub location_updated_at: Option<String>,
  pub assigned_emergency:  Option<String>,
}

pub fn responder_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawResponder> {
  Ok(RawResponder {
    responder_id:        row.get(0)?,
    name:                row.get(1)?,
    kind:                row.get(2)?,
    available:           row.get(3)?,
    latitude:            row.get(4)?,
    longitude:           row.get(5)?,
    location_updated_at: row.get(6)?,
    assigned_emergency:  row.get(7)?,
  })
}

impl RawResponder {
  pub fn into_responder(self) -> Result<Responder> {
    let location = match (self.latitude, self.longitude) {
      (Some(latitude), Some(longitude)) => Some(GeoPoint { latitude, longitude }),
      _ => None,
    };
    Ok(Responder {
      responder_id: decode_uuid(&self.responder_id)?,
      name: self.name,
      kind: decode_kind(&self.kind)?,
      available: self.available,
      location,
      location_updated_at: self.location_updated_at.as_deref().map(decode_dt).transpose()?,
      assigned_emergency: decode_opt_uuid(self.assigned_emergency.as_deref())?,
    })
  }
}

/// An `emergencies` (or `emergency_archive`) row before decoding.
#[derive(Debug)]
pub struct RawEmergency {
  pub emergency_id:     String,
  pub requester_id:     String,
  pub kind:             String,
  pub status:           String,
  pub origin_latitude:  f64,
  pub origin_longitude: f64,
  pub responder_id:     Option<String>,
  pub distance_km:      Option<f64>,
  pub created_at:       String,
  pub updated_at:       String,
}

pub fn emergency_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEmergency> {
  Ok(RawEmergency {
    emergency_id:     row.get(0)?,
    requester_id:     row.get(1)?,
    kind:             row.get(2)?,
    status:           row.get(3)?,
    origin_latitude:  row.get(4)?,
    origin_longitude: row.get(5)?,
    responder_id:     row.get(6)?,
    distance_km:      row.get(7)?,
    created_at:       row.get(8)?,
    updated_at:       row.get(9)?,
  })
}

impl RawEmergency {
  pub fn into_emergency(self) -> Result<EmergencyRequest> {
    Ok(EmergencyRequest {
      emergency_id: decode_uuid(&self.emergency_id)?,
      requester_id: decode_uuid(&self.requester_id)?,
      kind:         decode_kind(&self.kind)?,
      status:       decode_status(&self.status)?,
      origin:       GeoPoint {
        latitude:  self.origin_latitude,
        longitude: self.origin_longitude,
      },
      responder_id: decode_opt_uuid(self.responder_id.as_deref())?,
      distance_km:  self.distance_km,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

/// An archive row: the emergency columns followed by `archived_at`.
#[derive(Debug)]
pub struct RawArchived {
  pub emergency:   RawEmergency,
  pub archived_at: String,
}

pub fn archived_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawArchived> {
  Ok(RawArchived { emergency: emergency_row(row)?, archived_at: row.get(10)? })
}

impl RawArchived {
  pub fn into_archived(self) -> Result<ArchivedEmergency> {
    Ok(ArchivedEmergency {
      emergency:   self.emergency.into_emergency()?,
      archived_at: decode_dt(&self.archived_at)?,
    })
  }
}
