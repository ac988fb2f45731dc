//! Whole-minute instants and half-open intervals.
//!
//! Every instant that reaches storage goes through [`Instant`], whose text
//! form is always the 16-character `YYYY-MM-DDTHH:MM`. Because the width is
//! fixed, lexicographic order of the stored text equals chronological order,
//! which the SQLite backend relies on for its range scans.

use std::{fmt, str::FromStr};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike as _};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The storage and display format of an [`Instant`].
pub const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

// ─── Instant ─────────────────────────────────────────────────────────────────

/// A local wall-clock instant with minute precision.
///
/// Seconds are truncated on construction and the year is limited to
/// 1..=9999 so the text form never changes width.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Instant(NaiveDateTime);

impl Instant {
  pub fn new(dt: NaiveDateTime) -> Result<Self, ValidationError> {
    let year = chrono::Datelike::year(&dt);
    if !(1..=9999).contains(&year) {
      return Err(ValidationError::YearOutOfRange(year));
    }
    let truncated = dt
      .date()
      .and_hms_opt(dt.hour(), dt.minute(), 0)
      .ok_or_else(|| ValidationError::Instant(dt.to_string()))?;
    Ok(Self(truncated))
  }

  pub fn at(date: NaiveDate, time: NaiveTime) -> Result<Self, ValidationError> {
    Self::new(date.and_time(time))
  }

  /// Parse `YYYY-MM-DDTHH:MM`. A single space is accepted in place of the
  /// `T`; nothing else is.
  pub fn parse(s: &str) -> Result<Self, ValidationError> {
    let bad = || ValidationError::Instant(s.to_owned());
    let b = s.as_bytes();
    if b.len() != 16
      || b[4] != b'-'
      || b[7] != b'-'
      || !matches!(b[10], b'T' | b' ')
      || b[13] != b':'
    {
      return Err(bad());
    }
    let digits_ok = [0, 1, 2, 3, 5, 6, 8, 9, 11, 12, 14, 15]
      .iter()
      .all(|&i| b[i].is_ascii_digit());
    if !digits_ok {
      return Err(bad());
    }
    let normalized = format!("{}T{}", &s[..10], &s[11..]);
    let dt = NaiveDateTime::parse_from_str(&normalized, INSTANT_FORMAT)
      .map_err(|_| bad())?;
    Self::new(dt)
  }

  /// The current local time, truncated to the minute.
  pub fn now() -> Self {
    let now = chrono::Local::now().naive_local();
    // The local clock is always within the four-digit year range.
    Self::new(now).unwrap_or(Self(now))
  }

  pub fn date(&self) -> NaiveDate { self.0.date() }

  pub fn time(&self) -> NaiveTime { self.0.time() }

  pub fn as_datetime(&self) -> NaiveDateTime { self.0 }

  pub fn plus_minutes(&self, minutes: i64) -> Result<Self, ValidationError> {
    let overflow = || ValidationError::Instant(format!("{self} + {minutes}min"));
    let dt = Duration::try_minutes(minutes)
      .and_then(|d| self.0.checked_add_signed(d))
      .ok_or_else(overflow)?;
    Self::new(dt)
  }
}

impl fmt::Display for Instant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format(INSTANT_FORMAT))
  }
}

impl FromStr for Instant {
  type Err = ValidationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<String> for Instant {
  type Error = ValidationError;

  fn try_from(s: String) -> Result<Self, Self::Error> { Self::parse(&s) }
}

impl From<Instant> for String {
  fn from(i: Instant) -> Self { i.to_string() }
}

// ─── Interval ────────────────────────────────────────────────────────────────

/// The half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
  pub start: Instant,
  pub end:   Instant,
}

impl Interval {
  pub fn new(start: Instant, end: Instant) -> Self { Self { start, end } }

  /// `[a1, a2)` and `[b1, b2)` overlap iff `a1 < b2 && a2 > b1`.
  /// Touching intervals (one ends exactly when the next starts) do not.
  pub fn overlaps(&self, other: &Interval) -> bool {
    self.start < other.end && self.end > other.start
  }

  pub fn minutes(&self) -> i64 {
    (self.end.as_datetime() - self.start.as_datetime()).num_minutes()
  }
}

impl fmt::Display for Interval {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Same-day intervals print the end as a bare time.
    if self.start.date() == self.end.date() {
      write!(f, "{}–{}", self.start, self.end.time().format(TIME_FORMAT))
    } else {
      write!(f, "{}–{}", self.start, self.end)
    }
  }
}

// ─── Field parsers ───────────────────────────────────────────────────────────

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
  let s = s.trim();
  if s.len() != 10 {
    return Err(ValidationError::Date(s.to_owned()));
  }
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|_| ValidationError::Date(s.to_owned()))
}

/// Parse an `HH:MM` time of day.
pub fn parse_time(s: &str) -> Result<NaiveTime, ValidationError> {
  let s = s.trim();
  NaiveTime::parse_from_str(s, TIME_FORMAT)
    .map_err(|_| ValidationError::Time(s.to_owned()))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
