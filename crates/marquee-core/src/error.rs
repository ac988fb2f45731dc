//! Error types for `marquee-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{conflict::InternalConflict, ticket::SeatConflict};

/// A scheduling rule, instant, or ticket request that is malformed.
///
/// Validation failures are raised before anything touches storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("invalid date {0:?}; expected YYYY-MM-DD")]
  Date(String),

  #[error("invalid time of day {0:?}; expected HH:MM")]
  Time(String),

  #[error("invalid instant {0:?}; expected YYYY-MM-DDTHH:MM")]
  Instant(String),

  #[error("instant year {0} cannot be written as four digits")]
  YearOutOfRange(i32),

  #[error("start date {start} is after end date {end}")]
  InvertedRange {
    start: chrono::NaiveDate,
    end:   chrono::NaiveDate,
  },

  #[error("weekly rule names no weekdays")]
  EmptyWeekdays,

  #[error("weekday {0} is outside 0 (Mon) ..= 6 (Sun)")]
  WeekdayOutOfRange(u8),

  #[error("weekday {0} has no start time")]
  WeekdayWithoutTimes(chrono::Weekday),

  #[error("repeat interval must be at least 1")]
  ZeroInterval,

  #[error("day of month {0} is outside 1..=31")]
  DayOfMonthOutOfRange(u32),

  #[error("movie duration must be positive, got {0} min")]
  NonPositiveDuration(i64),

  #[error("movie duration {0} min exceeds one day")]
  DurationTooLong(i64),

  #[error("price must not be negative, got {0}")]
  NegativePrice(i64),

  #[error("invalid seat label {0:?}; expected e.g. \"A-1\"")]
  SeatLabel(String),

  #[error("no seats selected")]
  NoSeats,

  #[error("seat {0} selected more than once")]
  DuplicateSeat(String),

  #[error("hall layout has {0} rows; at most 26 (A..=Z) are supported")]
  TooManyRows(usize),

  #[error("breakdown totals {breakdown} tickets but {seats} seats are selected")]
  BreakdownMismatch { breakdown: u64, seats: usize },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation error: {0}")]
  Validation(#[from] ValidationError),

  #[error("rule produces {} overlapping showing(s)", .0.len())]
  InternalConflicts(Vec<InternalConflict>),

  #[error("movie not found: {0}")]
  MovieNotFound(i64),

  #[error("showing not found: {0}")]
  ShowingNotFound(i64),

  #[error("ticket not found: {0}")]
  TicketNotFound(Uuid),

  #[error("ticket {0} has already been used")]
  TicketAlreadyUsed(Uuid),

  #[error("seat {seat} does not exist in hall {hall}")]
  UnknownSeat { hall: String, seat: String },

  #[error("{0}")]
  SeatConflict(SeatConflict),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The atomic apply unit failed; no part of the plan was written.
  #[error("reconciliation failed, no changes were made: {0}")]
  ApplyFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
