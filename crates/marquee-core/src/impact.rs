//! Impact of deleting showings that already sold tickets.

use std::collections::HashMap;

use serde::Serialize;

use crate::showing::Showing;

/// A showing marked for deletion that still has tickets against it.
/// Deleting it destroys those tickets and their seat reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteImpact {
  pub showing:      Showing,
  pub ticket_count: u64,
}

/// Pair each doomed showing with its ticket count, keeping only those with
/// at least one ticket. Informational; nothing here blocks the deletion.
pub fn assess(to_delete: &[Showing], counts: &HashMap<i64, u64>) -> Vec<DeleteImpact> {
  to_delete
    .iter()
    .filter_map(|s| {
      let ticket_count = counts.get(&s.showing_id).copied().unwrap_or(0);
      (ticket_count > 0).then(|| DeleteImpact { showing: s.clone(), ticket_count })
    })
    .collect()
}
