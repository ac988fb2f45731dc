//! One reconciliation run: rule → plan → operator checkpoints → apply.
//!
//! [`prepare`] only reads. [`run`] adds the two operator checkpoints and, if
//! both pass, applies the plan as one atomic unit.

use serde::Serialize;

use crate::{
  conflict::{ExternalConflict, external_conflicts, internal_conflicts},
  error::{Error, Result},
  impact::{DeleteImpact, assess},
  movie::Movie,
  reconcile::{PlanSummary, SchedulePlan, reconcile},
  rule::{CandidateSet, ScheduleRule, expand},
  store::CinemaStore,
};

/// The decisions a scheduling run asks of its operator.
///
/// Implementations may block indefinitely waiting for an answer.
pub trait Operator {
  /// Candidates overlap showings of other movies in the hall. Returning
  /// `false` aborts the run with no writes.
  fn proceed_despite_conflicts(&mut self, conflicts: &[ExternalConflict]) -> bool;

  /// Final go/no-go for a non-empty plan. `impacts` lists deletions that
  /// will destroy sold tickets.
  fn approve(&mut self, summary: &PlanSummary, impacts: &[DeleteImpact]) -> bool;
}

/// Everything known about a rule before anything is written.
#[derive(Debug, Clone)]
pub struct PreparedSchedule {
  pub movie:              Movie,
  pub candidates:         CandidateSet,
  pub plan:               SchedulePlan,
  pub external_conflicts: Vec<ExternalConflict>,
  pub delete_impacts:     Vec<DeleteImpact>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScheduleOutcome {
  /// The plan was committed.
  Applied(PlanSummary),
  /// The persisted schedule already matches the rule.
  Unchanged,
  /// The operator declined to override external conflicts.
  AbortedAtConflicts,
  /// The operator declined the plan.
  Declined,
}

/// Expand `rule`, diff it against its scope, and collect conflicts and
/// destructive-delete impacts.
///
/// Fails with [`Error::Validation`] for a malformed rule and with
/// [`Error::InternalConflicts`] if the rule's own showings overlap.
pub async fn prepare<S: CinemaStore>(
  store: &S,
  rule: &ScheduleRule,
) -> Result<PreparedSchedule> {
  let movie = store
    .get_movie(rule.movie_id)
    .await
    .map_err(Error::store)?
    .ok_or(Error::MovieNotFound(rule.movie_id))?;

  let candidates = expand(rule, &movie)?;

  let existing = store
    .find_showings(rule.movie_id, &rule.hall)
    .await
    .map_err(Error::store)?;
  let scope_ids: Vec<i64> = existing.iter().map(|s| s.showing_id).collect();
  let plan = reconcile(&candidates, existing);

  let internal = internal_conflicts(&candidates);
  if !internal.is_empty() {
    return Err(Error::InternalConflicts(internal));
  }

  let external = match candidates.span() {
    Some(window) => {
      let occupants = store
        .find_showings_in_hall_overlapping(&rule.hall, window, &scope_ids)
        .await
        .map_err(Error::store)?;
      external_conflicts(&candidates, &occupants)
    }
    None => vec![],
  };

  let delete_impacts = if plan.to_delete.is_empty() {
    vec![]
  } else {
    let ids: Vec<i64> = plan.to_delete.iter().map(|s| s.showing_id).collect();
    let counts = store
      .count_tickets_for_showings(&ids)
      .await
      .map_err(Error::store)?;
    assess(&plan.to_delete, &counts)
  };

  Ok(PreparedSchedule {
    movie,
    candidates,
    plan,
    external_conflicts: external,
    delete_impacts,
  })
}

/// Prepare `rule`, consult `operator` at both checkpoints, and apply.
///
/// An apply failure is reported as [`Error::ApplyFailed`]; the store has
/// rolled back and the prior schedule is intact.
pub async fn run<S, O>(store: &S, rule: &ScheduleRule, operator: &mut O) -> Result<ScheduleOutcome>
where
  S: CinemaStore,
  O: Operator + Send,
{
  let prepared = prepare(store, rule).await?;

  if !prepared.external_conflicts.is_empty() {
    tracing::warn!(
      hall = %rule.hall,
      conflicts = prepared.external_conflicts.len(),
      "schedule overlaps other movies' showings"
    );
    if !operator.proceed_despite_conflicts(&prepared.external_conflicts) {
      return Ok(ScheduleOutcome::AbortedAtConflicts);
    }
  }

  if prepared.plan.is_empty() {
    return Ok(ScheduleOutcome::Unchanged);
  }

  let summary = prepared.plan.summary();
  if !prepared.delete_impacts.is_empty() {
    let tickets: u64 = prepared.delete_impacts.iter().map(|i| i.ticket_count).sum();
    tracing::warn!(
      showings = prepared.delete_impacts.len(),
      tickets,
      "plan deletes showings with sold tickets"
    );
  }
  if !operator.approve(&summary, &prepared.delete_impacts) {
    return Ok(ScheduleOutcome::Declined);
  }

  store
    .apply_plan(&prepared.plan)
    .await
    .map_err(|e| Error::ApplyFailed(Box::new(e)))?;

  tracing::info!(
    movie_id = rule.movie_id,
    hall = %rule.hall,
    add = summary.add,
    update = summary.update,
    delete = summary.delete,
    "schedule applied"
  );
  Ok(ScheduleOutcome::Applied(summary))
}
