//! One function per subcommand. Each prints its result to stdout.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context as _, bail};
use chrono::NaiveTime;
use marquee_core::{
  movie::{Movie, NewMovie},
  rule::{MonthlyPattern, Pattern, ScheduleRule, WeeklyPattern},
  schedule::{self, ScheduleOutcome},
  store::CinemaStore,
  ticket::{GateResult, NewTicket, Purchaser, SeatLabel, Ticket},
  time::{Instant, parse_date, parse_time},
};
use marquee_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{PurchaseArgs, config::CliConfig, operator::StdinOperator};

// ─── Movies ──────────────────────────────────────────────────────────────────

pub async fn add_movie(
  store: &SqliteStore,
  title: String,
  duration_min: i64,
  default_price: i64,
  description: Option<String>,
) -> anyhow::Result<()> {
  let movie = store
    .add_movie(NewMovie { title, duration_min, default_price, description })
    .await
    .context("failed to add movie")?;
  println!("Added movie {}: {}", movie.movie_id, movie.title);
  Ok(())
}

/// Fields to change on an existing movie.
pub struct MovieEdit {
  pub title:         Option<String>,
  pub duration_min:  Option<i64>,
  pub default_price: Option<i64>,
  pub description:   Option<String>,
}

impl MovieEdit {
  fn apply_to(self, movie: Movie) -> NewMovie {
    NewMovie {
      title:         self.title.unwrap_or(movie.title),
      duration_min:  self.duration_min.unwrap_or(movie.duration_min),
      default_price: self.default_price.unwrap_or(movie.default_price),
      description:   self.description.or(movie.description),
    }
  }
}

pub async fn edit_movie(
  store: &SqliteStore,
  movie_id: i64,
  edit: MovieEdit,
) -> anyhow::Result<()> {
  let current = store
    .get_movie(movie_id)
    .await?
    .ok_or(marquee_core::Error::MovieNotFound(movie_id))?;
  let old_duration = current.duration_min;
  let movie = store
    .update_movie(movie_id, edit.apply_to(current))
    .await
    .with_context(|| format!("failed to update movie {movie_id}"))?;
  println!("Updated movie {}: {}", movie.movie_id, movie.title);
  if movie.duration_min != old_duration {
    println!("Runtime changed; re-run `marquee schedule` to move existing showing ends.");
  }
  Ok(())
}

pub async fn list_movies(store: &SqliteStore) -> anyhow::Result<()> {
  let movies = store.list_movies().await.context("failed to list movies")?;
  if movies.is_empty() {
    println!("No movies.");
  }
  for m in movies {
    println!("{:>4}  {}  ({} min, {})", m.movie_id, m.title, m.duration_min, m.default_price);
    if let Some(description) = &m.description {
      println!("      {description}");
    }
  }
  Ok(())
}

pub async fn delete_movie(store: &SqliteStore, movie_id: i64) -> anyhow::Result<()> {
  store
    .delete_movie(movie_id)
    .await
    .with_context(|| format!("failed to delete movie {movie_id}"))?;
  println!("Deleted movie {movie_id}.");
  Ok(())
}

// ─── Scheduling ──────────────────────────────────────────────────────────────

pub fn single_pattern(start: &str) -> anyhow::Result<Pattern> {
  Ok(Pattern::Single { start: Instant::parse(start)? })
}

pub fn weekly_pattern(
  from: &str,
  until: &str,
  every: u32,
  days: &[u8],
  times: &[String],
  slots: &[String],
) -> anyhow::Result<Pattern> {
  let times = times
    .iter()
    .map(|t| parse_time(t))
    .collect::<Result<Vec<_>, _>>()?;
  let mut pattern = WeeklyPattern::uniform(
    parse_date(from)?,
    parse_date(until)?,
    every,
    days.iter().copied(),
    times,
  );
  for slot in slots {
    let (day, time) = parse_slot(slot)?;
    pattern.times.entry(day).or_default().insert(time);
  }
  Ok(Pattern::Weekly(pattern))
}

/// `DAY=HH:MM`, e.g. `5=14:00` for Saturday afternoons.
fn parse_slot(s: &str) -> anyhow::Result<(u8, NaiveTime)> {
  let Some((day, time)) = s.split_once('=') else {
    bail!("expected DAY=HH:MM, got {s:?}");
  };
  let day: u8 = day.trim().parse().with_context(|| format!("bad weekday in {s:?}"))?;
  Ok((day, parse_time(time.trim())?))
}

pub fn monthly_pattern(
  from: &str,
  until: &str,
  every: u32,
  day_of_month: u32,
  time: &str,
) -> anyhow::Result<Pattern> {
  Ok(Pattern::Monthly(MonthlyPattern {
    start_date: parse_date(from)?,
    end_date: parse_date(until)?,
    interval_months: every,
    day_of_month,
    start_time: parse_time(time)?,
  }))
}

pub async fn schedule(
  store: &SqliteStore,
  rule: &ScheduleRule,
  assume_yes: bool,
) -> anyhow::Result<()> {
  let mut operator = StdinOperator::new(assume_yes);
  let outcome = match schedule::run(store, rule, &mut operator).await {
    Ok(outcome) => outcome,
    Err(marquee_core::Error::InternalConflicts(conflicts)) => {
      println!("The rule produces overlapping showings:");
      for conflict in &conflicts {
        println!("  {conflict}");
      }
      bail!("rule rejected; nothing was written");
    }
    Err(e) => return Err(e).context("scheduling failed"),
  };

  match outcome {
    ScheduleOutcome::Applied(s) => {
      println!("Applied: {} added, {} updated, {} deleted.", s.add, s.update, s.delete)
    }
    ScheduleOutcome::Unchanged => println!("Schedule already up to date."),
    ScheduleOutcome::AbortedAtConflicts => println!("Aborted; nothing was written."),
    ScheduleOutcome::Declined => println!("Declined; nothing was written."),
  }
  Ok(())
}

// ─── Showings ────────────────────────────────────────────────────────────────

pub async fn showings(store: &SqliteStore, movie_id: i64, hall: &str) -> anyhow::Result<()> {
  let showings = store
    .find_showings(movie_id, hall)
    .await
    .context("failed to load showings")?;
  if showings.is_empty() {
    println!("No showings.");
    return Ok(());
  }
  let ids: Vec<i64> = showings.iter().map(|s| s.showing_id).collect();
  let counts = store
    .count_tickets_for_showings(&ids)
    .await
    .context("failed to count tickets")?;
  for s in showings {
    let sold = counts.get(&s.showing_id).copied().unwrap_or(0);
    println!("{:>5}  {}  {:>6}  {sold} ticket(s)", s.showing_id, s.interval(), s.price);
  }
  Ok(())
}

pub async fn delete_showing(
  store: &SqliteStore,
  showing_id: i64,
  assume_yes: bool,
) -> anyhow::Result<()> {
  let showing = store
    .get_showing(showing_id)
    .await?
    .ok_or(marquee_core::Error::ShowingNotFound(showing_id))?;
  let sold = store
    .count_tickets_for_showings(&[showing_id])
    .await?
    .get(&showing_id)
    .copied()
    .unwrap_or(0);

  println!(
    "Showing {} ({}, hall {}) has {sold} ticket(s).",
    showing.showing_id,
    showing.interval(),
    showing.hall
  );
  if !StdinOperator::new(assume_yes).confirm("Delete it and its tickets?") {
    println!("Nothing deleted.");
    return Ok(());
  }
  store
    .delete_showing(showing_id)
    .await
    .with_context(|| format!("failed to delete showing {showing_id}"))?;
  println!("Deleted showing {showing_id}.");
  Ok(())
}

// ─── Seats and tickets ───────────────────────────────────────────────────────

pub async fn seats(store: &SqliteStore, cfg: &CliConfig, showing_id: i64) -> anyhow::Result<()> {
  let showing = store
    .get_showing(showing_id)
    .await?
    .ok_or(marquee_core::Error::ShowingNotFound(showing_id))?;
  let reserved = store.find_reserved_seats(showing_id).await?;

  println!("Showing {} in hall {} at {}", showing_id, showing.hall, showing.start);
  println!("Reserved ({}): {}", reserved.len(), join(reserved.iter()));
  if let Some(layout) = cfg.layout(&showing.hall)? {
    let available: Vec<&SeatLabel> = layout.available(&reserved).collect();
    println!("Available ({}): {}", available.len(), join(available.into_iter()));
  }
  Ok(())
}

fn join<'a>(seats: impl Iterator<Item = &'a SeatLabel>) -> String {
  seats.map(SeatLabel::to_string).collect::<Vec<_>>().join(" ")
}

fn parse_categories(args: &[String]) -> anyhow::Result<BTreeMap<String, u32>> {
  let mut breakdown = BTreeMap::new();
  for arg in args {
    let Some((name, count)) = arg.split_once('=') else {
      bail!("expected NAME=COUNT, got {arg:?}");
    };
    let count: u32 = count.trim().parse().with_context(|| format!("bad count in {arg:?}"))?;
    *breakdown.entry(name.trim().to_owned()).or_insert(0) += count;
  }
  Ok(breakdown)
}

pub async fn purchase(
  store: &SqliteStore,
  cfg: &CliConfig,
  args: PurchaseArgs,
) -> anyhow::Result<()> {
  let showing = store
    .get_showing(args.showing_id)
    .await?
    .ok_or(marquee_core::Error::ShowingNotFound(args.showing_id))?;

  let seats = args
    .seats
    .iter()
    .map(|s| SeatLabel::parse(s.trim()))
    .collect::<Result<Vec<_>, _>>()?;
  if let Some(layout) = cfg.layout(&showing.hall)? {
    let unknown: BTreeSet<&SeatLabel> = seats.iter().filter(|s| !layout.contains(s)).collect();
    if let Some(seat) = unknown.into_iter().next() {
      return Err(marquee_core::Error::UnknownSeat {
        hall: showing.hall,
        seat: seat.to_string(),
      }
      .into());
    }
  }

  let admission = store
    .purchase(NewTicket {
      showing_id: args.showing_id,
      purchaser: Purchaser {
        name:      args.name,
        age:       args.age,
        sex:       args.sex,
        is_member: args.member,
      },
      seats,
      breakdown: parse_categories(&args.categories)?,
      total_price: args.total,
    })
    .await
    .context("purchase failed")?;

  let ticket = admission.into_result()?;
  println!("Ticket {}", ticket.uuid);
  print_ticket(&ticket);
  Ok(())
}

pub async fn cancel(store: &SqliteStore, uuid: Uuid) -> anyhow::Result<()> {
  let ticket = store
    .cancel_ticket(uuid)
    .await
    .with_context(|| format!("failed to cancel ticket {uuid}"))?;
  println!("Cancelled ticket {}; freed {}.", ticket.uuid, join(ticket.seats.iter()));
  Ok(())
}

pub async fn admit(store: &SqliteStore, uuid: Uuid) -> anyhow::Result<()> {
  match store.admit_ticket(uuid, Instant::now()).await? {
    GateResult::Admitted(ticket) => {
      println!("ADMIT  {}", ticket.uuid);
      print_ticket(&ticket);
    }
    GateResult::AlreadyUsed(ticket) => {
      let used = ticket.used_at.map(|t| t.to_string()).unwrap_or_default();
      println!("REJECT {} (already used at {used})", ticket.uuid);
    }
  }
  Ok(())
}

pub async fn tickets(store: &SqliteStore, name: &str) -> anyhow::Result<()> {
  let tickets = store
    .tickets_for_purchaser(name)
    .await
    .context("failed to load tickets")?;
  if tickets.is_empty() {
    println!("No tickets for {name}.");
  }
  for ticket in tickets {
    println!("{}", ticket.uuid);
    print_ticket(&ticket);
  }
  Ok(())
}

fn print_ticket(ticket: &Ticket) {
  println!("  showing {}  seats {}", ticket.showing_id, join(ticket.seats.iter()));
  if !ticket.breakdown.is_empty() {
    let parts: Vec<String> = ticket.breakdown.iter().map(|(k, v)| format!("{k}×{v}")).collect();
    println!("  {}", parts.join(", "));
  }
  println!("  total {}  issued {}", ticket.total_price, ticket.issued_at);
  if let Some(used) = ticket.used_at {
    println!("  used {used}");
  }
}
