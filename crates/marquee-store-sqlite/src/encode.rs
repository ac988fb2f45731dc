//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Instants are stored in their fixed-width `YYYY-MM-DDTHH:MM` form. Seat
//! labels are stored as `A-1` text, the ticket breakdown as compact JSON and
//! UUIDs as hyphenated lowercase strings.

use std::collections::BTreeMap;

use marquee_core::{
  movie::Movie,
  showing::{HallOccupant, Showing},
  ticket::{Purchaser, SeatLabel, Ticket},
  time::Instant,
};
use uuid::Uuid;

use crate::Result;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_instant(i: Instant) -> String { i.to_string() }

pub fn decode_instant(s: &str) -> Result<Instant> { Ok(Instant::parse(s)?) }

pub fn encode_breakdown(b: &BTreeMap<String, u32>) -> Result<String> {
  Ok(serde_json::to_string(b)?)
}

pub fn decode_breakdown(s: &str) -> Result<BTreeMap<String, u32>> {
  Ok(serde_json::from_str(s)?)
}

/// True for a `UNIQUE` (or `PRIMARY KEY`) constraint failure.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
  )
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SHOWING_COLUMNS: &str = "showing_id, movie_id, hall, start_at, end_at, price";

/// Raw values read directly from a `showings` row.
pub struct RawShowing {
  pub showing_id: i64,
  pub movie_id:   i64,
  pub hall:       String,
  pub start_at:   String,
  pub end_at:     String,
  pub price:      i64,
}

impl RawShowing {
  /// Read the six [`SHOWING_COLUMNS`] starting at column `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      showing_id: row.get(offset)?,
      movie_id:   row.get(offset + 1)?,
      hall:       row.get(offset + 2)?,
      start_at:   row.get(offset + 3)?,
      end_at:     row.get(offset + 4)?,
      price:      row.get(offset + 5)?,
    })
  }

  pub fn into_showing(self) -> Result<Showing> {
    Ok(Showing {
      showing_id: self.showing_id,
      movie_id:   self.movie_id,
      hall:       self.hall,
      start:      decode_instant(&self.start_at)?,
      end:        decode_instant(&self.end_at)?,
      price:      self.price,
    })
  }
}

/// A `showings` row joined with its movie's title.
pub struct RawOccupant {
  pub showing:     RawShowing,
  pub movie_title: String,
}

impl RawOccupant {
  pub fn into_occupant(self) -> Result<HallOccupant> {
    Ok(HallOccupant {
      showing:     self.showing.into_showing()?,
      movie_title: self.movie_title,
    })
  }
}

pub const MOVIE_COLUMNS: &str = "movie_id, title, duration_min, default_price, description";

pub fn movie_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Movie> {
  Ok(Movie {
    movie_id:      row.get(0)?,
    title:         row.get(1)?,
    duration_min:  row.get(2)?,
    default_price: row.get(3)?,
    description:   row.get(4)?,
  })
}

pub const TICKET_COLUMNS: &str = "ticket_id, uuid, showing_id, user_name, age, sex, is_member, \
                                  breakdown_json, total_price, issued_at, used_at";

/// Raw values read from a `tickets` row plus its `ticket_seats` rows.
pub struct RawTicket {
  pub ticket_id:      i64,
  pub uuid:           String,
  pub showing_id:     i64,
  pub user_name:      Option<String>,
  pub age:            Option<u32>,
  pub sex:            Option<String>,
  pub is_member:      bool,
  pub breakdown_json: String,
  pub total_price:    i64,
  pub issued_at:      String,
  pub used_at:        Option<String>,
  pub seats:          Vec<String>,
}

impl RawTicket {
  /// Read the [`TICKET_COLUMNS`]; `seats` is left empty for the caller.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ticket_id:      row.get(0)?,
      uuid:           row.get(1)?,
      showing_id:     row.get(2)?,
      user_name:      row.get(3)?,
      age:            row.get(4)?,
      sex:            row.get(5)?,
      is_member:      row.get(6)?,
      breakdown_json: row.get(7)?,
      total_price:    row.get(8)?,
      issued_at:      row.get(9)?,
      used_at:        row.get(10)?,
      seats:          vec![],
    })
  }

  pub fn into_ticket(self) -> Result<Ticket> {
    let mut seats = self
      .seats
      .iter()
      .map(|s| SeatLabel::parse(s))
      .collect::<Result<Vec<_>, _>>()?;
    seats.sort();

    Ok(Ticket {
      ticket_id:   self.ticket_id,
      uuid:        decode_uuid(&self.uuid)?,
      showing_id:  self.showing_id,
      purchaser:   Purchaser {
        name:      self.user_name,
        age:       self.age,
        sex:       self.sex,
        is_member: self.is_member,
      },
      seats,
      breakdown:   decode_breakdown(&self.breakdown_json)?,
      total_price: self.total_price,
      issued_at:   decode_instant(&self.issued_at)?,
      used_at:     self.used_at.as_deref().map(decode_instant).transpose()?,
    })
  }
}
