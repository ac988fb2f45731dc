//! Tickets, seat labels and the seat admission outcome.
//!
//! A seat is held for a showing by exactly one ticket. The store enforces
//! this with a uniqueness constraint on `(showing, seat)`; a purchase that
//! loses the race is rejected whole and never retried with other seats.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::{Error, ValidationError},
  time::Instant,
};

// ─── Seat labels ─────────────────────────────────────────────────────────────

/// A seat such as `A-1`: a row letter and a 1-based position in the row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SeatLabel {
  row:    char,
  number: u32,
}

impl SeatLabel {
  pub fn new(row: char, number: u32) -> Self { Self { row, number } }

  pub fn parse(s: &str) -> Result<Self, ValidationError> {
    let bad = || ValidationError::SeatLabel(s.to_owned());
    let (row, number) = s.trim().split_once('-').ok_or_else(bad)?;
    let mut chars = row.chars();
    let (Some(row), None) = (chars.next(), chars.next()) else {
      return Err(bad());
    };
    if !row.is_ascii_uppercase() {
      return Err(bad());
    }
    let number: u32 = number.parse().map_err(|_| bad())?;
    if number == 0 {
      return Err(bad());
    }
    Ok(Self { row, number })
  }

  pub fn row(&self) -> char { self.row }

  pub fn number(&self) -> u32 { self.number }
}

impl fmt::Display for SeatLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.row, self.number)
  }
}

impl FromStr for SeatLabel {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<String> for SeatLabel {
  type Error = ValidationError;

  fn try_from(s: String) -> Result<Self, Self::Error> { Self::parse(&s) }
}

impl From<SeatLabel> for String {
  fn from(s: SeatLabel) -> Self { s.to_string() }
}

// ─── Tickets ─────────────────────────────────────────────────────────────────

/// Who bought a ticket. Everything is optional except membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchaser {
  pub name:      Option<String>,
  pub age:       Option<u32>,
  pub sex:       Option<String>,
  pub is_member: bool,
}

/// Input for [`CinemaStore::purchase`](crate::store::CinemaStore::purchase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
  pub showing_id:  i64,
  pub purchaser:   Purchaser,
  pub seats:       Vec<SeatLabel>,
  /// Tickets per category, e.g. `{"adult": 2, "child": 1}`. May be empty.
  pub breakdown:   BTreeMap<String, u32>,
  /// Computed by the caller; pricing is not this crate's concern.
  pub total_price: i64,
}

impl NewTicket {
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.seats.is_empty() {
      return Err(ValidationError::NoSeats);
    }
    let mut seen = std::collections::BTreeSet::new();
    for seat in &self.seats {
      if !seen.insert(seat) {
        return Err(ValidationError::DuplicateSeat(seat.to_string()));
      }
    }
    if !self.breakdown.is_empty() {
      let total: u64 = self.breakdown.values().map(|&n| u64::from(n)).sum();
      if total != self.seats.len() as u64 {
        return Err(ValidationError::BreakdownMismatch {
          breakdown: total,
          seats:     self.seats.len(),
        });
      }
    }
    if self.total_price < 0 {
      return Err(ValidationError::NegativePrice(self.total_price));
    }
    Ok(())
  }
}

/// An issued ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
  pub ticket_id:   i64,
  /// The identifier printed on the ticket and scanned at the gate.
  pub uuid:        Uuid,
  pub showing_id:  i64,
  pub purchaser:   Purchaser,
  pub seats:       Vec<SeatLabel>,
  pub breakdown:   BTreeMap<String, u32>,
  pub total_price: i64,
  pub issued_at:   Instant,
  /// Set once at the gate. A used ticket can be neither cancelled nor
  /// admitted again.
  pub used_at:     Option<Instant>,
}

impl Ticket {
  pub fn is_used(&self) -> bool { self.used_at.is_some() }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// A purchase lost a seat to another ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatConflict {
  pub showing_id: i64,
  pub seat:       SeatLabel,
}

impl fmt::Display for SeatConflict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "seat {} is no longer available for showing {}",
      self.seat, self.showing_id
    )
  }
}

/// The result of trying to reserve a set of seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
  /// Every seat was free; the ticket and all its seats are committed.
  Reserved(Ticket),
  /// At least one seat was taken; nothing was committed.
  Rejected(SeatConflict),
}

impl Admission {
  pub fn into_result(self) -> Result<Ticket, Error> {
    match self {
      Self::Reserved(ticket) => Ok(ticket),
      Self::Rejected(conflict) => Err(Error::SeatConflict(conflict)),
    }
  }
}

/// The result of scanning a ticket at the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResult {
  /// First scan; `used_at` is now set.
  Admitted(Ticket),
  /// Scanned before; returned unchanged.
  AlreadyUsed(Ticket),
}
