//! The terminal side of the scheduling checkpoints.

use std::io::{self, BufRead, Write};

use marquee_core::{
  conflict::ExternalConflict,
  impact::DeleteImpact,
  reconcile::PlanSummary,
  schedule::Operator,
};

/// Prints what a run is about to do and asks `y/N` on stdin.
///
/// With `assume_yes` every question is answered yes without reading stdin.
/// End of input or a read error counts as no.
pub struct StdinOperator {
  assume_yes: bool,
}

impl StdinOperator {
  pub fn new(assume_yes: bool) -> Self { Self { assume_yes } }

  /// Ask `question` and return the answer.
  pub fn confirm(&mut self, question: &str) -> bool {
    if self.assume_yes {
      println!("{question} [y/N] y");
      return true;
    }
    // Blocking read; requires the multi-threaded runtime.
    tokio::task::block_in_place(|| ask(question)).unwrap_or(false)
  }
}

fn ask(question: &str) -> io::Result<bool> {
  print!("{question} [y/N] ");
  io::stdout().flush()?;
  let mut line = String::new();
  if io::stdin().lock().read_line(&mut line)? == 0 {
    return Ok(false);
  }
  Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

impl Operator for StdinOperator {
  fn proceed_despite_conflicts(&mut self, conflicts: &[ExternalConflict]) -> bool {
    println!("The schedule overlaps {} existing showing(s):", conflicts.len());
    for conflict in conflicts {
      println!("  {conflict}");
    }
    self.confirm("Schedule anyway?")
  }

  fn approve(&mut self, summary: &PlanSummary, impacts: &[DeleteImpact]) -> bool {
    println!(
      "Plan: {} to add, {} to update, {} to delete.",
      summary.add, summary.update, summary.delete
    );
    if !impacts.is_empty() {
      let tickets: u64 = impacts.iter().map(|i| i.ticket_count).sum();
      println!("Deleting these showings also deletes {tickets} sold ticket(s):");
      for impact in impacts {
        let s = &impact.showing;
        println!(
          "  showing {} ({}, hall {}): {} ticket(s)",
          s.showing_id,
          s.interval(),
          s.hall,
          impact.ticket_count
        );
      }
    }
    self.confirm("Apply?")
  }
}
