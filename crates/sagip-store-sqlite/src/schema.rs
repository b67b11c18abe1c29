//! SQL schema for the Sagip SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- `available = 1` never coexists with an assignment. The reverse
-- (unavailable, unassigned) is a responder who is off duty.
CREATE TABLE IF NOT EXISTS responders (
    responder_id        TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    kind                TEXT NOT NULL,   -- 'police' | 'medical' | 'fire' | 'flood'
    available           INTEGER NOT NULL DEFAULT 1,
    latitude            REAL,
    longitude           REAL,
    location_updated_at TEXT,
    assigned_emergency  TEXT,
    CHECK (available = 0 OR assigned_emergency IS NULL)
);

-- Active requests only. Terminal rows are moved to emergency_archive.
CREATE TABLE IF NOT EXISTS emergencies (
    emergency_id     TEXT PRIMARY KEY,
    requester_id     TEXT NOT NULL UNIQUE,
    kind             TEXT NOT NULL,
    status           TEXT NOT NULL,   -- 'searching' | 'assigned' | 'cancelled' | 'completed'
    origin_latitude  REAL NOT NULL,
    origin_longitude REAL NOT NULL,
    responder_id     TEXT,
    distance_km      REAL,
    created_at       TEXT NOT NULL,   -- ISO 8601 UTC
    updated_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS emergency_archive (
    emergency_id     TEXT PRIMARY KEY,
    requester_id     TEXT NOT NULL,
    kind             TEXT NOT NULL,
    status           TEXT NOT NULL,
    origin_latitude  REAL NOT NULL,
    origin_longitude REAL NOT NULL,
    responder_id     TEXT,
    distance_km      REAL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    archived_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS responders_kind_idx      ON responders(kind, available);
CREATE INDEX IF NOT EXISTS archive_requester_idx    ON emergency_archive(requester_id);

PRAGMA user_version = 1;
";
