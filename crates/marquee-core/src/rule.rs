//! Scheduling rules and their expansion into candidate showings.
//!
//! A rule is declarative: "this movie, in this hall, at these times". It is
//! never persisted. Each reconciliation run expands it from scratch into a
//! [`CandidateSet`] keyed by [`SlotKey`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike as _, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants};

use crate::{
  error::ValidationError,
  movie::Movie,
  showing::SlotKey,
  time::{Instant, Interval},
};

// ─── Rule ────────────────────────────────────────────────────────────────────

/// A request to produce showings for one `(movie, hall)` scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRule {
  pub movie_id: i64,
  pub hall:     String,
  /// Ticket price for every produced showing; the movie's default when
  /// `None`.
  pub price:    Option<i64>,
  pub pattern:  Pattern,
}

/// When showings occur.
#[derive(Debug, Clone, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(RepeatKind), derive(Display, Hash))]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Pattern {
  /// Exactly one showing.
  Single { start: Instant },
  Weekly(WeeklyPattern),
  Monthly(MonthlyPattern),
}

/// Every `interval_weeks`-th week from `start_date`, on the configured
/// weekdays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPattern {
  pub start_date:     NaiveDate,
  pub end_date:       NaiveDate,
  pub interval_weeks: u32,
  /// Start times per weekday, keyed 0 (Monday) ..= 6 (Sunday).
  pub times:          BTreeMap<u8, BTreeSet<NaiveTime>>,
}

impl WeeklyPattern {
  /// The same start times on each of `weekdays`.
  pub fn uniform(
    start_date: NaiveDate,
    end_date: NaiveDate,
    interval_weeks: u32,
    weekdays: impl IntoIterator<Item = u8>,
    times: impl IntoIterator<Item = NaiveTime>,
  ) -> Self {
    let times: BTreeSet<NaiveTime> = times.into_iter().collect();
    Self {
      start_date,
      end_date,
      interval_weeks,
      times: weekdays.into_iter().map(|d| (d, times.clone())).collect(),
    }
  }
}

/// Every `interval_months`-th month from `start_date`'s month, on
/// `day_of_month`. Months lacking that day are skipped, not clamped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyPattern {
  pub start_date:      NaiveDate,
  pub end_date:        NaiveDate,
  pub interval_months: u32,
  pub day_of_month:    u32,
  pub start_time:      NaiveTime,
}

// ─── Candidates ──────────────────────────────────────────────────────────────

/// A showing slot produced by expansion; not yet reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
  pub start: Instant,
  pub end:   Instant,
  pub hall:  String,
  pub price: i64,
}

impl Candidate {
  pub fn key(&self) -> SlotKey {
    SlotKey { start: self.start, hall: self.hall.clone() }
  }

  pub fn interval(&self) -> Interval { Interval::new(self.start, self.end) }
}

/// The desired schedule for one `(movie, hall)` scope.
///
/// Iteration is in start order.
#[derive(Debug, Clone)]
pub struct CandidateSet {
  pub movie_id: i64,
  pub hall:     String,
  pub slots:    BTreeMap<SlotKey, Candidate>,
}

impl CandidateSet {
  fn new(movie_id: i64, hall: &str) -> Self {
    Self { movie_id, hall: hall.to_owned(), slots: BTreeMap::new() }
  }

  /// Insert with map semantics: a later candidate for an identical key
  /// replaces the earlier one.
  fn insert(&mut self, candidate: Candidate) {
    let key = candidate.key();
    if self.slots.insert(key, candidate).is_some() {
      tracing::debug!(hall = %self.hall, "duplicate candidate slot collapsed");
    }
  }

  pub fn len(&self) -> usize { self.slots.len() }

  pub fn is_empty(&self) -> bool { self.slots.is_empty() }

  pub fn contains(&self, key: &SlotKey) -> bool { self.slots.contains_key(key) }

  pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
    self.slots.values()
  }

  /// The smallest interval covering every candidate, if any.
  pub fn span(&self) -> Option<Interval> {
    let start = self.candidates().map(|c| c.start).min()?;
    let end = self.candidates().map(|c| c.end).max()?;
    Some(Interval::new(start, end))
  }
}

// ─── Expansion ───────────────────────────────────────────────────────────────

/// Expand `rule` into candidate showings using `movie`'s runtime and default
/// price.
///
/// Fails without producing anything if the rule is malformed.
pub fn expand(
  rule: &ScheduleRule,
  movie: &Movie,
) -> Result<CandidateSet, ValidationError> {
  if movie.duration_min <= 0 {
    return Err(ValidationError::NonPositiveDuration(movie.duration_min));
  }
  let price = rule.price.unwrap_or(movie.default_price);
  if price < 0 {
    return Err(ValidationError::NegativePrice(price));
  }

  let starts = match &rule.pattern {
    Pattern::Single { start } => vec![*start],
    Pattern::Weekly(p) => weekly_starts(p)?,
    Pattern::Monthly(p) => monthly_starts(p)?,
  };

  let mut set = CandidateSet::new(rule.movie_id, &rule.hall);
  for start in starts {
    set.insert(Candidate {
      start,
      end: start.plus_minutes(movie.duration_min)?,
      hall: rule.hall.clone(),
      price,
    });
  }

  tracing::debug!(
    movie_id = rule.movie_id,
    hall = %rule.hall,
    kind = %RepeatKind::from(&rule.pattern),
    candidates = set.len(),
    "expanded schedule rule"
  );
  Ok(set)
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
  if start > end {
    return Err(ValidationError::InvertedRange { start, end });
  }
  Ok(())
}

fn weekly_starts(p: &WeeklyPattern) -> Result<Vec<Instant>, ValidationError> {
  check_range(p.start_date, p.end_date)?;
  if p.interval_weeks == 0 {
    return Err(ValidationError::ZeroInterval);
  }
  if p.times.is_empty() {
    return Err(ValidationError::EmptyWeekdays);
  }
  for (&day, times) in &p.times {
    let weekday = weekday_from_index(day)?;
    if times.is_empty() {
      return Err(ValidationError::WeekdayWithoutTimes(weekday));
    }
  }

  let mut starts = vec![];
  for day in p.start_date.iter_days().take_while(|d| *d <= p.end_date) {
    let week_index = (day - p.start_date).num_days() / 7;
    if week_index % i64::from(p.interval_weeks) != 0 {
      continue;
    }
    let index = day.weekday().num_days_from_monday() as u8;
    if let Some(times) = p.times.get(&index) {
      for time in times {
        starts.push(Instant::at(day, *time)?);
      }
    }
  }
  Ok(starts)
}

fn monthly_starts(p: &MonthlyPattern) -> Result<Vec<Instant>, ValidationError> {
  check_range(p.start_date, p.end_date)?;
  if p.interval_months == 0 {
    return Err(ValidationError::ZeroInterval);
  }
  if !(1..=31).contains(&p.day_of_month) {
    return Err(ValidationError::DayOfMonthOutOfRange(p.day_of_month));
  }

  // Months counted from year 0 so stepping never needs carry logic.
  let month_index = |d: NaiveDate| i64::from(d.year()) * 12 + i64::from(d.month0());
  let last = month_index(p.end_date);
  let step = i64::from(p.interval_months);

  let mut starts = vec![];
  let mut current = month_index(p.start_date);
  while current <= last {
    let year = (current.div_euclid(12)) as i32;
    let month = (current.rem_euclid(12) + 1) as u32;
    // A missing day (e.g. the 31st of a 30-day month) skips this occurrence.
    if let Some(date) = NaiveDate::from_ymd_opt(year, month, p.day_of_month)
      && (p.start_date..=p.end_date).contains(&date)
    {
      starts.push(Instant::at(date, p.start_time)?);
    }
    current += step;
  }
  Ok(starts)
}

/// Map 0 (Monday) ..= 6 (Sunday) onto [`chrono::Weekday`].
pub fn weekday_from_index(day: u8) -> Result<chrono::Weekday, ValidationError> {
  use chrono::Weekday::*;
  Ok(match day {
    0 => Mon,
    1 => Tue,
    2 => Wed,
    3 => Thu,
    4 => Fri,
    5 => Sat,
    6 => Sun,
    other => return Err(ValidationError::WeekdayOutOfRange(other)),
  })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
