//! Showings: single scheduled screenings of a movie in a hall.

use serde::{Deserialize, Serialize};

use crate::time::{Instant, Interval};

/// The identity of a showing slot: a start instant in a hall.
///
/// Two showings never share a key, whichever movie or rule they came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
  pub start: Instant,
  pub hall:  String,
}

/// A persisted showing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Showing {
  pub showing_id: i64,
  pub movie_id:   i64,
  pub hall:       String,
  pub start:      Instant,
  pub end:        Instant,
  pub price:      i64,
}

impl Showing {
  pub fn key(&self) -> SlotKey {
    SlotKey { start: self.start, hall: self.hall.clone() }
  }

  pub fn interval(&self) -> Interval { Interval::new(self.start, self.end) }
}

/// A showing that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShowing {
  pub movie_id: i64,
  pub hall:     String,
  pub start:    Instant,
  pub end:      Instant,
  pub price:    i64,
}

impl NewShowing {
  pub fn interval(&self) -> Interval { Interval::new(self.start, self.end) }
}

/// A persisted showing together with its movie's title, as returned by hall
/// occupancy queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallOccupant {
  pub showing:     Showing,
  pub movie_title: String,
}
