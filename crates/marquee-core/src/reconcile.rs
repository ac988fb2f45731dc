//! Reconciliation: desired candidates → minimal showing operations.
//!
//! Computes the showings to insert, update in place, and delete so that the
//! persisted showings of one `(movie, hall)` scope match a [`CandidateSet`].
//! Showings of other movies in the same hall are never touched here; they
//! only surface as external conflicts.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
  rule::CandidateSet,
  showing::{NewShowing, Showing, SlotKey},
};

/// The operations that transition a scope's showings to a candidate set.
///
/// The three lists are disjoint.
#[derive(Debug, Clone, Default)]
pub struct SchedulePlan {
  pub to_add:    Vec<NewShowing>,
  /// Existing showings carrying their new `end` and `price`; identity
  /// (`showing_id`, `start`, `hall`) is unchanged.
  pub to_update: Vec<Showing>,
  pub to_delete: Vec<Showing>,
}

impl SchedulePlan {
  pub fn is_empty(&self) -> bool {
    self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
  }

  pub fn summary(&self) -> PlanSummary {
    PlanSummary {
      add:    self.to_add.len(),
      update: self.to_update.len(),
      delete: self.to_delete.len(),
    }
  }
}

/// Counts shown to the operator before a plan is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlanSummary {
  pub add:    usize,
  pub update: usize,
  pub delete: usize,
}

/// Diff `desired` against `existing`, the persisted showings of the same
/// `(movie, hall)` scope.
///
/// Running this again after the plan has been applied yields an empty plan.
pub fn reconcile(desired: &CandidateSet, existing: Vec<Showing>) -> SchedulePlan {
  let mut existing_by_key: HashMap<SlotKey, Showing> = existing
    .into_iter()
    .map(|s| (s.key(), s))
    .collect();

  let mut plan = SchedulePlan::default();

  for (key, candidate) in &desired.slots {
    match existing_by_key.remove(key) {
      Some(mut showing) => {
        if showing.end != candidate.end || showing.price != candidate.price {
          showing.end = candidate.end;
          showing.price = candidate.price;
          plan.to_update.push(showing);
        }
      }
      None => plan.to_add.push(NewShowing {
        movie_id: desired.movie_id,
        hall:     candidate.hall.clone(),
        start:    candidate.start,
        end:      candidate.end,
        price:    candidate.price,
      }),
    }
  }

  // Whatever was not claimed by a candidate is no longer wanted.
  plan.to_delete = existing_by_key.into_values().collect();
  plan.to_delete.sort_by_key(|s| s.start);

  plan
}

// ─── Tests ────────────────────────────────────────────────────────────────────
