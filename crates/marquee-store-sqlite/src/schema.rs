//! SQL schema for the Marquee SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Instants are stored as fixed-width `YYYY-MM-DDTHH:MM` text. The `GLOB`
/// checks keep that width invariant, which the range scans in
/// `find_showings_in_hall_overlapping` depend on.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS movies (
    movie_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    title         TEXT    NOT NULL,
    duration_min  INTEGER NOT NULL CHECK (duration_min > 0),
    default_price INTEGER NOT NULL CHECK (default_price >= 0),
    description   TEXT
);

-- Written only by the schedule apply unit (and the single-showing cascade).
CREATE TABLE IF NOT EXISTS showings (
    showing_id INTEGER PRIMARY KEY AUTOINCREMENT,
    movie_id   INTEGER NOT NULL REFERENCES movies(movie_id),
    hall       TEXT    NOT NULL,
    start_at   TEXT    NOT NULL
               CHECK (start_at GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]T[0-9][0-9]:[0-9][0-9]'),
    end_at     TEXT    NOT NULL
               CHECK (end_at GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]T[0-9][0-9]:[0-9][0-9]'),
    price      INTEGER NOT NULL CHECK (price >= 0),
    UNIQUE (hall, start_at),
    CHECK  (end_at > start_at)
);

CREATE TABLE IF NOT EXISTS tickets (
    ticket_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    uuid           TEXT    NOT NULL UNIQUE,
    showing_id     INTEGER NOT NULL REFERENCES showings(showing_id),
    user_name      TEXT,
    age            INTEGER,
    sex            TEXT,
    is_member      INTEGER NOT NULL DEFAULT 0,
    breakdown_json TEXT    NOT NULL DEFAULT '{}',
    total_price    INTEGER NOT NULL DEFAULT 0,
    issued_at      TEXT    NOT NULL,
    used_at        TEXT              -- NULL until admitted at the gate
);

-- The only concurrency control in the system: one row per (showing, seat).
CREATE TABLE IF NOT EXISTS ticket_seats (
    ticket_seat_id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id      INTEGER NOT NULL REFERENCES tickets(ticket_id),
    showing_id     INTEGER NOT NULL REFERENCES showings(showing_id),
    seat           TEXT    NOT NULL,
    CONSTRAINT uq_ticket_seats_show_seat UNIQUE (showing_id, seat)
);

CREATE INDEX IF NOT EXISTS showings_scope_idx   ON showings(movie_id, hall);
CREATE INDEX IF NOT EXISTS tickets_showing_idx  ON tickets(showing_id);
CREATE INDEX IF NOT EXISTS tickets_user_idx     ON tickets(user_name);
CREATE INDEX IF NOT EXISTS ticket_seats_tkt_idx ON ticket_seats(ticket_id);

PRAGMA user_version = 1;
";
