//! [`SqliteStore`], the SQLite implementation of [`ResponderDirectory`] and
//! [`EmergencyStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio::sync::broadcast;
use uuid::Uuid;

use sagip_core::{
  directory::{ClaimOutcome, EmergencyStore, OpenOutcome, ResponderDirectory},
  emergency::{
    ArchivedEmergency, EmergencyKind, EmergencyRequest, EmergencyStatus, NewEmergency,
  },
  geo::GeoPoint,
  responder::{NewResponder, Responder},
  subscription::Subscription,
};

use crate::{
  Error, Result,
  encode::{
    EMERGENCY_COLUMNS, RESPONDER_COLUMNS, RawArchived, RawEmergency, RawResponder, archived_row,
    emergency_row, encode_dt, encode_kind, encode_uuid, responder_row,
  },
  feed::{CHANGE_BUS_CAPACITY, Change, spawn_live_query},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Sagip store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and the change bus are both
/// reference-counted. Live queries only see writes made through this store
/// (or its clones).
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: broadcast::Sender<Change>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::from_connection(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::from_connection(conn).await
  }

  async fn from_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (changes, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
    let store = Self { conn, changes };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn notify(&self, change: Change) {
    // No listeners is fine.
    let _ = self.changes.send(change);
  }

  /// Available responders of one kind, in registration order.
  async fn available_responders(&self, kind: EmergencyKind) -> Result<Vec<Responder>> {
    let kind_str = encode_kind(kind);

    let raws: Vec<RawResponder> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RESPONDER_COLUMNS} FROM responders
           WHERE kind = ?1 AND available = 1
           ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![kind_str], responder_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResponder::into_responder).collect()
  }

  async fn require_responder(&self, id: Uuid) -> Result<Responder> {
    self.get_responder(id).await?.ok_or(Error::ResponderNotFound(id))
  }

  async fn emergency_by_id(&self, id: Uuid) -> Result<Option<EmergencyRequest>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEmergency> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {EMERGENCY_COLUMNS} FROM emergencies WHERE emergency_id = ?1"),
              rusqlite::params![id_str],
              emergency_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEmergency::into_emergency).transpose()
  }

  /// Run a status-guarded `UPDATE` on one emergency and return the row as it
  /// stands afterwards, or `None` if the guard did not match.
  async fn guarded_emergency_update(
    &self,
    id: Uuid,
    sql: &'static str,
    extra: Vec<rusqlite::types::Value>,
  ) -> Result<Option<EmergencyRequest>> {
    let id_str = encode_uuid(id);
    let now_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        let mut params: Vec<rusqlite::types::Value> = vec![id_str.into(), now_str.into()];
        params.extend(extra);
        Ok(conn.execute(sql, rusqlite::params_from_iter(params))?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    self.notify(Change::Emergency(id));
    self.emergency_by_id(id).await
  }
}

// ─── ResponderDirectory impl ─────────────────────────────────────────────────

impl ResponderDirectory for SqliteStore {
  type Error = Error;

  async fn register_responder(&self, input: NewResponder) -> Result<Responder> {
    if let Some(point) = input.location
      && !point.is_valid()
    {
      return Err(Error::InvalidLocation { latitude: point.latitude, longitude: point.longitude });
    }

    let now = Utc::now();
    let responder = Responder {
      responder_id:        Uuid::new_v4(),
      name:                input.name,
      kind:                input.kind,
      available:           true,
      location:            input.location,
      location_updated_at: input.location.map(|_| now),
      assigned_emergency:  None,
    };

    let id_str   = encode_uuid(responder.responder_id);
    let name     = responder.name.clone();
    let kind_str = encode_kind(responder.kind);
    let lat      = responder.location.map(|p| p.latitude);
    let lon      = responder.location.map(|p| p.longitude);
    let at_str   = responder.location_updated_at.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO responders (
             responder_id, name, kind, available, latitude, longitude, location_updated_at
           ) VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6)",
          rusqlite::params![id_str, name, kind_str, lat, lon, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.notify(Change::Responder(responder.responder_id));
    Ok(responder)
  }

  async fn get_responder(&self, id: Uuid) -> Result<Option<Responder>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawResponder> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RESPONDER_COLUMNS} FROM responders WHERE responder_id = ?1"),
              rusqlite::params![id_str],
              responder_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawResponder::into_responder).transpose()
  }

  async fn list_responders(&self, kind: Option<EmergencyKind>) -> Result<Vec<Responder>> {
    let kind_str = kind.map(encode_kind);

    let raws: Vec<RawResponder> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(k) = kind_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {RESPONDER_COLUMNS} FROM responders WHERE kind = ?1 ORDER BY rowid"
          ))?;
          stmt
            .query_map(rusqlite::params![k], responder_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt =
            conn.prepare(&format!("SELECT {RESPONDER_COLUMNS} FROM responders ORDER BY rowid"))?;
          stmt
            .query_map([], responder_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResponder::into_responder).collect()
  }

  async fn update_responder_location(
    &self,
    id:       Uuid,
    location: Option<GeoPoint>,
  ) -> Result<Responder> {
    if let Some(point) = location
      && !point.is_valid()
    {
      return Err(Error::InvalidLocation { latitude: point.latitude, longitude: point.longitude });
    }

    let id_str = encode_uuid(id);
    let lat    = location.map(|p| p.latitude);
    let lon    = location.map(|p| p.longitude);
    let at_str = location.map(|_| encode_dt(Utc::now()));

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE responders
           SET latitude = ?2, longitude = ?3, location_updated_at = ?4
           WHERE responder_id = ?1",
          rusqlite::params![id_str, lat, lon, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::ResponderNotFound(id));
    }
    self.notify(Change::Responder(id));
    self.require_responder(id).await
  }

  async fn set_responder_availability(&self, id: Uuid, available: bool) -> Result<Responder> {
    let id_str = encode_uuid(id);

    let changed = self
      .conn
      .call(move |conn| {
        let sql = if available {
          "UPDATE responders SET available = 1
           WHERE responder_id = ?1 AND assigned_emergency IS NULL"
        } else {
          "UPDATE responders SET available = 0 WHERE responder_id = ?1"
        };
        Ok(conn.execute(sql, rusqlite::params![id_str])?)
      })
      .await?;

    if changed == 0 {
      // Either missing or held by an emergency.
      return match self.get_responder(id).await? {
        None => Err(Error::ResponderNotFound(id)),
        Some(_) => Err(Error::ResponderAssigned(id)),
      };
    }
    self.notify(Change::Responder(id));
    self.require_responder(id).await
  }

  async fn subscribe_available_responders(
    &self,
    kind: EmergencyKind,
  ) -> Result<Subscription<Vec<Responder>>> {
    let changes = self.changes.subscribe();
    let initial = self.available_responders(kind).await?;
    let store = self.clone();

    Ok(spawn_live_query(
      "available_responders",
      changes,
      initial,
      |change| matches!(change, Change::Responder(_)),
      move || {
        let store = store.clone();
        async move { store.available_responders(kind).await }
      },
    ))
  }

  async fn subscribe_responder_location(
    &self,
    id: Uuid,
  ) -> Result<Subscription<Option<GeoPoint>>> {
    let changes = self.changes.subscribe();
    let initial = self.require_responder(id).await?.location;
    let store = self.clone();

    Ok(spawn_live_query(
      "responder_location",
      changes,
      initial,
      move |change| *change == Change::Responder(id),
      move || {
        let store = store.clone();
        async move { store.require_responder(id).await.map(|r| r.location) }
      },
    ))
  }

  async fn try_claim_responder(&self, id: Uuid, emergency_id: Uuid) -> Result<ClaimOutcome> {
    let id_str        = encode_uuid(id);
    let emergency_str = encode_uuid(emergency_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE responders SET available = 0, assigned_emergency = ?2
           WHERE responder_id = ?1 AND available = 1 AND assigned_emergency IS NULL",
          rusqlite::params![id_str, emergency_str],
        )?)
      })
      .await?;

    if changed == 0 {
      self.require_responder(id).await?;
      return Ok(ClaimOutcome::AlreadyClaimed);
    }
    self.notify(Change::Responder(id));
    Ok(ClaimOutcome::Claimed)
  }

  async fn release_responder(&self, id: Uuid, emergency_id: Uuid) -> Result<bool> {
    let id_str        = encode_uuid(id);
    let emergency_str = encode_uuid(emergency_id);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE responders SET available = 1, assigned_emergency = NULL
           WHERE responder_id = ?1 AND assigned_emergency = ?2",
          rusqlite::params![id_str, emergency_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(false);
    }
    self.notify(Change::Responder(id));
    Ok(true)
  }
}

// ─── EmergencyStore impl ─────────────────────────────────────────────────────

impl EmergencyStore for SqliteStore {
  async fn open_emergency(&self, input: NewEmergency) -> Result<OpenOutcome> {
    let now = Utc::now();
    let emergency = EmergencyRequest {
      emergency_id: Uuid::new_v4(),
      requester_id: input.requester_id,
      kind:         input.kind,
      status:       EmergencyStatus::Searching,
      origin:       input.origin,
      responder_id: None,
      distance_km:  None,
      created_at:   now,
      updated_at:   now,
    };

    let id_str        = encode_uuid(emergency.emergency_id);
    let requester_str = encode_uuid(emergency.requester_id);
    let kind_str      = encode_kind(emergency.kind);
    let lat           = emergency.origin.latitude;
    let lon           = emergency.origin.longitude;
    let now_str       = encode_dt(now);

    let existing: Option<RawEmergency> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let existing = tx
          .query_row(
            &format!(
              "SELECT {EMERGENCY_COLUMNS} FROM emergencies
               WHERE requester_id = ?1 AND status IN ('searching', 'assigned')"
            ),
            rusqlite::params![requester_str],
            emergency_row,
          )
          .optional()?;
        if existing.is_some() {
          return Ok(existing);
        }

        // A terminal row that never made it to the archive would block the
        // UNIQUE(requester_id) insert below.
        tx.execute(
          &format!(
            "INSERT INTO emergency_archive ({EMERGENCY_COLUMNS}, archived_at)
             SELECT {EMERGENCY_COLUMNS}, ?2 FROM emergencies
             WHERE requester_id = ?1 AND status IN ('cancelled', 'completed')"
          ),
          rusqlite::params![requester_str, now_str],
        )?;
        tx.execute(
          "DELETE FROM emergencies
           WHERE requester_id = ?1 AND status IN ('cancelled', 'completed')",
          rusqlite::params![requester_str],
        )?;

        tx.execute(
          "INSERT INTO emergencies (
             emergency_id, requester_id, kind, status, origin_latitude, origin_longitude,
             created_at, updated_at
           ) VALUES (?1, ?2, ?3, 'searching', ?4, ?5, ?6, ?6)",
          rusqlite::params![id_str, requester_str, kind_str, lat, lon, now_str],
        )?;
        tx.commit()?;
        Ok(None)
      })
      .await?;

    match existing {
      Some(raw) => Ok(OpenOutcome::Existing(raw.into_emergency()?)),
      None => {
        self.notify(Change::Emergency(emergency.emergency_id));
        Ok(OpenOutcome::Opened(emergency))
      }
    }
  }

  async fn get_emergency(&self, id: Uuid) -> Result<Option<EmergencyRequest>> {
    self.emergency_by_id(id).await
  }

  async fn active_emergency_for(&self, requester_id: Uuid) -> Result<Option<EmergencyRequest>> {
    let requester_str = encode_uuid(requester_id);

    let raw: Option<RawEmergency> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {EMERGENCY_COLUMNS} FROM emergencies
                 WHERE requester_id = ?1 AND status IN ('searching', 'assigned')"
              ),
              rusqlite::params![requester_str],
              emergency_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEmergency::into_emergency).transpose()
  }

  async fn list_active_emergencies(&self) -> Result<Vec<EmergencyRequest>> {
    let raws: Vec<RawEmergency> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EMERGENCY_COLUMNS} FROM emergencies
           WHERE status IN ('searching', 'assigned')
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map([], emergency_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEmergency::into_emergency).collect()
  }

  async fn mark_assigned(
    &self,
    id:           Uuid,
    responder_id: Uuid,
    distance_km:  f64,
  ) -> Result<Option<EmergencyRequest>> {
    self
      .guarded_emergency_update(
        id,
        "UPDATE emergencies
         SET status = 'assigned', updated_at = ?2, responder_id = ?3, distance_km = ?4
         WHERE emergency_id = ?1 AND status = 'searching'",
        vec![encode_uuid(responder_id).into(), distance_km.into()],
      )
      .await
  }

  async fn record_distance(&self, id: Uuid, distance_km: f64) -> Result<()> {
    self
      .guarded_emergency_update(
        id,
        "UPDATE emergencies SET updated_at = ?2, distance_km = ?3
         WHERE emergency_id = ?1 AND status = 'assigned'",
        vec![distance_km.into()],
      )
      .await?;
    Ok(())
  }

  async fn mark_cancelled(&self, id: Uuid) -> Result<Option<EmergencyRequest>> {
    self
      .guarded_emergency_update(
        id,
        "UPDATE emergencies SET status = 'cancelled', updated_at = ?2
         WHERE emergency_id = ?1 AND status IN ('searching', 'assigned')",
        Vec::new(),
      )
      .await
  }

  async fn complete_emergency(&self, id: Uuid) -> Result<Option<EmergencyRequest>> {
    self
      .guarded_emergency_update(
        id,
        "UPDATE emergencies SET status = 'completed', updated_at = ?2
         WHERE emergency_id = ?1 AND status = 'assigned'",
        Vec::new(),
      )
      .await
  }

  async fn archive_emergency(&self, id: Uuid) -> Result<bool> {
    let id_str  = encode_uuid(id);
    let now_str = encode_dt(Utc::now());

    let moved = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let moved = tx.execute(
          &format!(
            "INSERT INTO emergency_archive ({EMERGENCY_COLUMNS}, archived_at)
             SELECT {EMERGENCY_COLUMNS}, ?2 FROM emergencies
             WHERE emergency_id = ?1 AND status IN ('cancelled', 'completed')"
          ),
          rusqlite::params![id_str, now_str],
        )?;
        tx.execute(
          "DELETE FROM emergencies
           WHERE emergency_id = ?1 AND status IN ('cancelled', 'completed')",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(moved)
      })
      .await?;

    if moved == 0 {
      return Ok(false);
    }
    self.notify(Change::Emergency(id));
    Ok(true)
  }

  async fn archived_for(&self, requester_id: Uuid) -> Result<Vec<ArchivedEmergency>> {
    let requester_str = encode_uuid(requester_id);

    let raws: Vec<RawArchived> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EMERGENCY_COLUMNS}, archived_at FROM emergency_archive
           WHERE requester_id = ?1
           ORDER BY archived_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![requester_str], archived_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawArchived::into_archived).collect()
  }

  async fn watch_emergency(&self, id: Uuid) -> Result<Subscription<Option<EmergencyRequest>>> {
    let changes = self.changes.subscribe();
    let initial = self.emergency_by_id(id).await?;
    let store = self.clone();

    Ok(spawn_live_query(
      "emergency",
      changes,
      initial,
      move |change| *change == Change::Emergency(id),
      move || {
        let store = store.clone();
        async move { store.emergency_by_id(id).await }
      },
    ))
  }
}
