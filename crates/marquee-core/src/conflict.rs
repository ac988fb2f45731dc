//! Time-overlap conflicts in a hall.
//!
//! Internal conflicts (two candidates of one rule overlap) block a plan
//! outright. External conflicts (a candidate overlaps a persisted showing
//! outside the rule's scope) are reported and need the operator's explicit
//! override.

use std::fmt;

use serde::Serialize;

use crate::{
  rule::{Candidate, CandidateSet},
  showing::{HallOccupant, Showing},
  time::Interval,
};

/// Two candidates from the same expansion whose intervals overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InternalConflict {
  pub hall:   String,
  pub first:  Interval,
  pub second: Interval,
}

impl fmt::Display for InternalConflict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "hall {}: {} overlaps {}", self.hall, self.first, self.second)
  }
}

/// A candidate that overlaps a showing of another scope in the same hall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalConflict {
  pub candidate:   Interval,
  pub hall:        String,
  pub existing:    Showing,
  pub movie_title: String,
}

impl fmt::Display for ExternalConflict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "hall {}: {} overlaps \"{}\" ({}, showing {})",
      self.hall,
      self.candidate,
      self.movie_title,
      self.existing.interval(),
      self.existing.showing_id,
    )
  }
}

/// Every overlapping pair among the candidates.
///
/// Candidates are walked in start order; for each one, the following
/// candidates that start before it ends are reported against it. This
/// reports every overlapping adjacent pair and every longer-range pair
/// (e.g. one long showing spanning two short ones).
pub fn internal_conflicts(set: &CandidateSet) -> Vec<InternalConflict> {
  let sorted: Vec<&Candidate> = set.candidates().collect();
  let mut conflicts = vec![];

  for (i, earlier) in sorted.iter().enumerate() {
    for later in sorted[i + 1..].iter().take_while(|c| c.start < earlier.end) {
      conflicts.push(InternalConflict {
        hall:   earlier.hall.clone(),
        first:  earlier.interval(),
        second: later.interval(),
      });
    }
  }

  conflicts
}

/// Every `(candidate, occupant)` pair in the same hall whose intervals
/// overlap.
///
/// `occupants` must already exclude the showings of the rule's own scope.
pub fn external_conflicts(
  set: &CandidateSet,
  occupants: &[HallOccupant],
) -> Vec<ExternalConflict> {
  let mut conflicts = vec![];

  for candidate in set.candidates() {
    let interval = candidate.interval();
    for occupant in occupants {
      let existing = &occupant.showing;
      if existing.hall == candidate.hall && interval.overlaps(&existing.interval()) {
        conflicts.push(ExternalConflict {
          candidate:   interval,
          hall:        candidate.hall.clone(),
          existing:    existing.clone(),
          movie_title: occupant.movie_title.clone(),
        });
      }
    }
  }

  conflicts
}

// ─── Tests ────────────────────────────────────────────────────────────────────
