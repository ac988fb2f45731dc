//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveTime};
use marquee_core::{
  conflict::ExternalConflict,
  impact::DeleteImpact,
  movie::{Movie, NewMovie},
  reconcile::{PlanSummary, SchedulePlan},
  rule::{Pattern, ScheduleRule, WeeklyPattern},
  schedule::{Operator, ScheduleOutcome, prepare, run},
  showing::NewShowing,
  store::CinemaStore,
  ticket::{Admission, GateResult, NewTicket, Purchaser, SeatLabel, Ticket},
  time::{Instant, Interval, parse_date, parse_time},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn date(s: &str) -> NaiveDate { parse_date(s).unwrap() }

fn time(s: &str) -> NaiveTime { parse_time(s).unwrap() }

fn at(s: &str) -> Instant { Instant::parse(s).unwrap() }

fn seat(s: &str) -> SeatLabel { SeatLabel::parse(s).unwrap() }

async fn movie(s: &SqliteStore, title: &str, duration_min: i64) -> Movie {
  s.add_movie(NewMovie {
    title: title.into(),
    duration_min,
    default_price: 1000,
    description: None,
  })
  .await
  .unwrap()
}

fn single(movie_id: i64, hall: &str, start: &str) -> ScheduleRule {
  ScheduleRule {
    movie_id,
    hall: hall.into(),
    price: None,
    pattern: Pattern::Single { start: at(start) },
  }
}

/// Mondays and Wednesdays at 18:00, 6–17 January 2025.
fn mon_wed(movie_id: i64, end: &str) -> ScheduleRule {
  ScheduleRule {
    movie_id,
    hall: "A".into(),
    price: None,
    pattern: Pattern::Weekly(WeeklyPattern::uniform(
      date("2025-01-06"),
      date(end),
      1,
      [0, 2],
      [time("18:00")],
    )),
  }
}

fn ticket_for(showing_id: i64, name: &str, seats: &[&str]) -> NewTicket {
  NewTicket {
    showing_id,
    purchaser: Purchaser { name: Some(name.into()), ..Default::default() },
    seats: seats.iter().map(|s| seat(s)).collect(),
    breakdown: BTreeMap::from([("adult".to_owned(), seats.len() as u32)]),
    total_price: 1000 * seats.len() as i64,
  }
}

async fn buy(s: &SqliteStore, showing_id: i64, name: &str, seats: &[&str]) -> Ticket {
  match s.purchase(ticket_for(showing_id, name, seats)).await.unwrap() {
    Admission::Reserved(ticket) => ticket,
    Admission::Rejected(conflict) => panic!("unexpected rejection: {conflict}"),
  }
}

/// Answers both checkpoints from fixed replies and records what it saw.
struct Scripted {
  proceed:   bool,
  approve:   bool,
  conflicts: Vec<ExternalConflict>,
  approvals: Vec<(PlanSummary, Vec<DeleteImpact>)>,
}

impl Scripted {
  fn new(proceed: bool, approve: bool) -> Self {
    Self { proceed, approve, conflicts: vec![], approvals: vec![] }
  }

  fn yes() -> Self { Self::new(true, true) }
}

impl Operator for Scripted {
  fn proceed_despite_conflicts(&mut self, conflicts: &[ExternalConflict]) -> bool {
    self.conflicts.extend_from_slice(conflicts);
    self.proceed
  }

  fn approve(&mut self, summary: &PlanSummary, impacts: &[DeleteImpact]) -> bool {
    self.approvals.push((*summary, impacts.to_vec()));
    self.approve
  }
}

// ─── Movies ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_get_and_list_movies() {
  let s = store().await;
  let m = movie(&s, "Metropolis", 153).await;
  movie(&s, "Nosferatu", 94).await;

  let fetched = s.get_movie(m.movie_id).await.unwrap().unwrap();
  assert_eq!(fetched, m);

  let all = s.list_movies().await.unwrap();
  let titles: Vec<_> = all.iter().map(|m| m.title.as_str()).collect();
  assert_eq!(titles, ["Metropolis", "Nosferatu"]);

  assert!(s.get_movie(9999).await.unwrap().is_none());
}

#[tokio::test]
async fn add_movie_rejects_non_positive_duration() {
  let s = store().await;
  let err = s
    .add_movie(NewMovie {
      title: "Blank".into(),
      duration_min: 0,
      default_price: 0,
      description: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::Validation(_))));
  assert!(s.list_movies().await.unwrap().is_empty());
}

#[tokio::test]
async fn add_movie_rejects_runtime_longer_than_a_day() {
  let s = store().await;
  let err = s
    .add_movie(NewMovie {
      title: "Endless".into(),
      duration_min: i64::MAX / 2,
      default_price: 1000,
      description: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(marquee_core::Error::Validation(
      marquee_core::ValidationError::DurationTooLong(_)
    ))
  ));
  assert!(s.list_movies().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_movie_replaces_details() {
  let s = store().await;
  let m = movie(&s, "Solaris", 167).await;

  let updated = s
    .update_movie(m.movie_id, NewMovie {
      title: "Solaris (restored)".into(),
      duration_min: 169,
      default_price: 1300,
      description: Some("4K".into()),
    })
    .await
    .unwrap();
  assert_eq!(updated.movie_id, m.movie_id);
  assert_eq!(s.get_movie(m.movie_id).await.unwrap().unwrap(), updated);

  let invalid = NewMovie {
    title: "Solaris".into(),
    duration_min: 0,
    default_price: 1300,
    description: None,
  };
  let err = s.update_movie(m.movie_id, invalid).await.unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::Validation(_))));
  assert_eq!(s.get_movie(m.movie_id).await.unwrap().unwrap().duration_min, 169);

  let err = s
    .update_movie(9999, NewMovie {
      title: "Ghost".into(),
      duration_min: 90,
      default_price: 0,
      description: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::MovieNotFound(9999))));
}

#[tokio::test]
async fn delete_movie_requires_no_showings() {
  let s = store().await;
  let m = movie(&s, "Sunrise", 94).await;
  run(&s, &single(m.movie_id, "A", "2025-01-06T18:00"), &mut Scripted::yes())
    .await
    .unwrap();

  let err = s.delete_movie(m.movie_id).await.unwrap_err();
  assert!(matches!(err, Error::MovieHasShowings(id) if id == m.movie_id));

  let showing = s.find_showings(m.movie_id, "A").await.unwrap().remove(0);
  s.delete_showing(showing.showing_id).await.unwrap();
  s.delete_movie(m.movie_id).await.unwrap();
  assert!(s.get_movie(m.movie_id).await.unwrap().is_none());

  let err = s.delete_movie(m.movie_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::MovieNotFound(_))));
}

// ─── Plans ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn apply_plan_adds_updates_and_deletes() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;

  let add = |start: &str, price| NewShowing {
    movie_id: m.movie_id,
    hall: "A".into(),
    start: at(start),
    end: at(start).plus_minutes(120).unwrap(),
    price,
  };
  s.apply_plan(&SchedulePlan {
    to_add: vec![add("2025-01-06T18:00", 1000), add("2025-01-07T18:00", 1000)],
    ..Default::default()
  })
  .await
  .unwrap();

  let existing = s.find_showings(m.movie_id, "A").await.unwrap();
  assert_eq!(existing.len(), 2);
  assert_eq!(existing[0].start, at("2025-01-06T18:00"));
  assert_eq!(existing[0].end, at("2025-01-06T20:00"));

  let mut updated = existing[0].clone();
  updated.price = 1500;
  updated.end = at("2025-01-06T20:30");
  s.apply_plan(&SchedulePlan {
    to_add:    vec![],
    to_update: vec![updated.clone()],
    to_delete: vec![existing[1].clone()],
  })
  .await
  .unwrap();

  let after = s.find_showings(m.movie_id, "A").await.unwrap();
  assert_eq!(after, [updated]);
}

#[tokio::test]
async fn failed_plan_changes_nothing() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;
  run(&s, &single(m.movie_id, "A", "2025-01-06T18:00"), &mut Scripted::yes())
    .await
    .unwrap();
  let before = s.find_showings(m.movie_id, "A").await.unwrap();

  // The update targets a showing that does not exist, after a valid insert.
  let mut ghost = before[0].clone();
  ghost.showing_id = 9999;
  let err = s
    .apply_plan(&SchedulePlan {
      to_add:    vec![NewShowing {
        movie_id: m.movie_id,
        hall:     "A".into(),
        start:    at("2025-01-09T18:00"),
        end:      at("2025-01-09T20:00"),
        price:    1000,
      }],
      to_update: vec![ghost],
      to_delete: before.clone(),
    })
    .await;
  assert!(err.is_err());
  assert_eq!(s.find_showings(m.movie_id, "A").await.unwrap(), before);
}

// ─── Scheduling runs ─────────────────────────────────────────────────────────

#[tokio::test]
async fn weekly_rule_applies_once_then_is_unchanged() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;
  let rule = mon_wed(m.movie_id, "2025-01-17");

  let mut operator = Scripted::yes();
  let outcome = run(&s, &rule, &mut operator).await.unwrap();
  assert_eq!(
    outcome,
    ScheduleOutcome::Applied(PlanSummary { add: 4, update: 0, delete: 0 })
  );

  let starts: Vec<String> = s
    .find_showings(m.movie_id, "A")
    .await
    .unwrap()
    .iter()
    .map(|s| s.start.to_string())
    .collect();
  assert_eq!(starts, [
    "2025-01-06T18:00",
    "2025-01-08T18:00",
    "2025-01-13T18:00",
    "2025-01-15T18:00",
  ]);

  let outcome = run(&s, &rule, &mut operator).await.unwrap();
  assert_eq!(outcome, ScheduleOutcome::Unchanged);
  assert_eq!(operator.approvals.len(), 1);
  assert!(operator.conflicts.is_empty());
}

#[tokio::test]
async fn price_change_updates_in_place() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;
  let mut rule = mon_wed(m.movie_id, "2025-01-17");
  run(&s, &rule, &mut Scripted::yes()).await.unwrap();
  let before = s.find_showings(m.movie_id, "A").await.unwrap();
  assert!(before.iter().all(|s| s.price == 1000));

  rule.price = Some(1200);
  let outcome = run(&s, &rule, &mut Scripted::yes()).await.unwrap();
  assert_eq!(
    outcome,
    ScheduleOutcome::Applied(PlanSummary { add: 0, update: 4, delete: 0 })
  );

  let after = s.find_showings(m.movie_id, "A").await.unwrap();
  assert!(after.iter().all(|s| s.price == 1200));
  let ids = |v: &[marquee_core::showing::Showing]| {
    v.iter().map(|s| s.showing_id).collect::<Vec<_>>()
  };
  assert_eq!(ids(&before), ids(&after));
}

#[tokio::test]
async fn runtime_change_moves_every_showing_end() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;
  let rule = mon_wed(m.movie_id, "2025-01-17");
  run(&s, &rule, &mut Scripted::yes()).await.unwrap();
  let before = s.find_showings(m.movie_id, "A").await.unwrap();

  s.update_movie(m.movie_id, NewMovie {
    title: m.title.clone(),
    duration_min: 150,
    default_price: m.default_price,
    description: None,
  })
  .await
  .unwrap();

  let prepared = prepare(&s, &rule).await.unwrap();
  assert!(prepared.plan.to_add.is_empty());
  assert!(prepared.plan.to_delete.is_empty());
  assert_eq!(prepared.plan.to_update.len(), before.len());
  for showing in &prepared.plan.to_update {
    assert_eq!(showing.end, showing.start.plus_minutes(150).unwrap());
  }

  let outcome = run(&s, &rule, &mut Scripted::yes()).await.unwrap();
  assert_eq!(
    outcome,
    ScheduleOutcome::Applied(PlanSummary { add: 0, update: 4, delete: 0 })
  );
  let after = s.find_showings(m.movie_id, "A").await.unwrap();
  assert!(after.iter().all(|s| s.end == s.start.plus_minutes(150).unwrap()));
  assert_eq!(
    after.iter().map(|s| s.showing_id).collect::<Vec<_>>(),
    before.iter().map(|s| s.showing_id).collect::<Vec<_>>()
  );
}

#[tokio::test]
async fn external_conflict_names_the_other_movie() {
  let s = store().await;
  let x = movie(&s, "Movie X", 90).await;
  let y = movie(&s, "Movie Y", 120).await;
  run(&s, &single(x.movie_id, "A", "2025-01-08T19:00"), &mut Scripted::yes())
    .await
    .unwrap();

  let mut operator = Scripted::new(false, true);
  let outcome = run(&s, &mon_wed(y.movie_id, "2025-01-17"), &mut operator)
    .await
    .unwrap();
  assert_eq!(outcome, ScheduleOutcome::AbortedAtConflicts);
  assert!(operator.approvals.is_empty());

  assert_eq!(operator.conflicts.len(), 1);
  let conflict = &operator.conflicts[0];
  assert_eq!(conflict.movie_title, "Movie X");
  assert_eq!(conflict.existing.start, at("2025-01-08T19:00"));
  assert_eq!(
    conflict.candidate,
    Interval::new(at("2025-01-08T18:00"), at("2025-01-08T20:00"))
  );
  assert!(conflict.to_string().contains("Movie X"));

  assert!(s.find_showings(y.movie_id, "A").await.unwrap().is_empty());
}

#[tokio::test]
async fn conflicts_in_other_halls_are_ignored() {
  let s = store().await;
  let x = movie(&s, "Movie X", 90).await;
  let y = movie(&s, "Movie Y", 120).await;
  run(&s, &single(x.movie_id, "B", "2025-01-08T19:00"), &mut Scripted::yes())
    .await
    .unwrap();

  let prepared = prepare(&s, &mon_wed(y.movie_id, "2025-01-17")).await.unwrap();
  assert!(prepared.external_conflicts.is_empty());
  assert_eq!(prepared.plan.to_add.len(), 4);
}

#[tokio::test]
async fn adjacent_showings_do_not_conflict() {
  let s = store().await;
  let x = movie(&s, "Movie X", 90).await;
  let y = movie(&s, "Movie Y", 120).await;
  run(&s, &single(x.movie_id, "A", "2025-01-06T16:30"), &mut Scripted::yes())
    .await
    .unwrap();

  let prepared = prepare(&s, &single(y.movie_id, "A", "2025-01-06T18:00"))
    .await
    .unwrap();
  assert!(prepared.external_conflicts.is_empty());
}

#[tokio::test]
async fn internal_overlap_fails_before_any_write() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;
  let rule = ScheduleRule {
    movie_id: m.movie_id,
    hall:     "A".into(),
    price:    None,
    pattern:  Pattern::Weekly(WeeklyPattern::uniform(
      date("2025-01-06"),
      date("2025-01-06"),
      1,
      [0],
      [time("18:00"), time("19:00")],
    )),
  };

  let mut operator = Scripted::yes();
  let err = run(&s, &rule, &mut operator).await.unwrap_err();
  assert!(matches!(err, marquee_core::Error::InternalConflicts(ref c) if c.len() == 1));
  assert!(operator.approvals.is_empty());
  assert!(s.find_showings(m.movie_id, "A").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_movie_is_reported() {
  let s = store().await;
  let err = run(&s, &single(42, "A", "2025-01-06T18:00"), &mut Scripted::yes())
    .await
    .unwrap_err();
  assert!(matches!(err, marquee_core::Error::MovieNotFound(42)));
}

#[tokio::test]
async fn destructive_delete_reports_impact_and_cascades() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;
  run(&s, &mon_wed(m.movie_id, "2025-01-17"), &mut Scripted::yes())
    .await
    .unwrap();
  let showings = s.find_showings(m.movie_id, "A").await.unwrap();
  let doomed = showings[2].showing_id;
  let t1 = buy(&s, doomed, "alice", &["A-1", "A-2"]).await;
  let t2 = buy(&s, doomed, "bob", &["B-1"]).await;

  // Declining leaves every showing and ticket in place.
  let shorter = mon_wed(m.movie_id, "2025-01-10");
  let mut operator = Scripted::new(true, false);
  let outcome = run(&s, &shorter, &mut operator).await.unwrap();
  assert_eq!(outcome, ScheduleOutcome::Declined);
  let (summary, impacts) = &operator.approvals[0];
  assert_eq!(*summary, PlanSummary { add: 0, update: 0, delete: 2 });
  assert_eq!(impacts.len(), 1);
  assert_eq!(impacts[0].showing.showing_id, doomed);
  assert_eq!(impacts[0].ticket_count, 2);
  assert_eq!(s.find_showings(m.movie_id, "A").await.unwrap().len(), 4);
  assert_eq!(s.find_reserved_seats(doomed).await.unwrap().len(), 3);

  let outcome = run(&s, &shorter, &mut Scripted::yes()).await.unwrap();
  assert_eq!(
    outcome,
    ScheduleOutcome::Applied(PlanSummary { add: 0, update: 0, delete: 2 })
  );
  assert_eq!(s.find_showings(m.movie_id, "A").await.unwrap().len(), 2);
  assert!(s.get_showing(doomed).await.unwrap().is_none());
  assert!(s.find_reserved_seats(doomed).await.unwrap().is_empty());
  assert!(s.count_tickets_for_showings(&[doomed]).await.unwrap().is_empty());
  assert!(s.get_ticket(t1.uuid).await.unwrap().is_none());
  assert!(s.get_ticket(t2.uuid).await.unwrap().is_none());
}

#[tokio::test]
async fn apply_failure_rolls_back_the_whole_plan() {
  let s = store().await;
  let x = movie(&s, "Movie X", 90).await;
  let y = movie(&s, "Movie Y", 90).await;
  run(&s, &single(x.movie_id, "A", "2025-01-06T18:00"), &mut Scripted::yes())
    .await
    .unwrap();
  run(&s, &single(y.movie_id, "A", "2025-01-05T18:00"), &mut Scripted::yes())
    .await
    .unwrap();

  // Moving Y onto X's exact slot: the operator overrides the conflict, but
  // the hall can hold only one showing per start time.
  let mut operator = Scripted::yes();
  let err = run(&s, &single(y.movie_id, "A", "2025-01-06T18:00"), &mut operator)
    .await
    .unwrap_err();
  assert!(matches!(err, marquee_core::Error::ApplyFailed(_)));
  assert_eq!(operator.conflicts.len(), 1);

  let y_showings = s.find_showings(y.movie_id, "A").await.unwrap();
  assert_eq!(y_showings.len(), 1);
  assert_eq!(y_showings[0].start, at("2025-01-05T18:00"));
  assert_eq!(s.find_showings(x.movie_id, "A").await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_showing_cascades() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;
  run(&s, &single(m.movie_id, "A", "2025-01-06T18:00"), &mut Scripted::yes())
    .await
    .unwrap();
  let showing = s.find_showings(m.movie_id, "A").await.unwrap().remove(0);
  let ticket = buy(&s, showing.showing_id, "alice", &["C-3"]).await;

  s.delete_showing(showing.showing_id).await.unwrap();
  assert!(s.get_ticket(ticket.uuid).await.unwrap().is_none());
  assert!(s.find_reserved_seats(showing.showing_id).await.unwrap().is_empty());

  let err = s.delete_showing(showing.showing_id).await.unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::ShowingNotFound(_))));
}

// ─── Seats and tickets ───────────────────────────────────────────────────────

async fn one_showing(s: &SqliteStore) -> i64 {
  let m = movie(s, "M", 120).await;
  run(s, &single(m.movie_id, "A", "2025-01-06T18:00"), &mut Scripted::yes())
    .await
    .unwrap();
  s.find_showings(m.movie_id, "A").await.unwrap()[0].showing_id
}

#[tokio::test]
async fn purchase_reserves_every_seat() {
  let s = store().await;
  let showing_id = one_showing(&s).await;

  let ticket = buy(&s, showing_id, "alice", &["B-2", "A-1"]).await;
  assert_eq!(ticket.seats, [seat("A-1"), seat("B-2")]);
  assert!(!ticket.is_used());

  let reserved = s.find_reserved_seats(showing_id).await.unwrap();
  assert_eq!(reserved.into_iter().collect::<Vec<_>>(), [seat("A-1"), seat("B-2")]);

  let fetched = s.get_ticket(ticket.uuid).await.unwrap().unwrap();
  assert_eq!(fetched, ticket);
}

#[tokio::test]
async fn racing_buyers_get_exactly_one_seat() {
  let s = store().await;
  let showing_id = one_showing(&s).await;

  let (a, b) = tokio::join!(
    s.purchase(ticket_for(showing_id, "alice", &["E-5"])),
    s.purchase(ticket_for(showing_id, "bob", &["E-5"])),
  );
  let outcomes = [a.unwrap(), b.unwrap()];
  let reserved = outcomes
    .iter()
    .filter(|o| matches!(o, Admission::Reserved(_)))
    .count();
  assert_eq!(reserved, 1);

  let rejected = outcomes
    .iter()
    .find_map(|o| match o {
      Admission::Rejected(c) => Some(c.clone()),
      _ => None,
    })
    .unwrap();
  assert_eq!(rejected.seat, seat("E-5"));
  assert_eq!(rejected.showing_id, showing_id);
  assert_eq!(s.find_reserved_seats(showing_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_purchase_leaves_nothing_behind() {
  let s = store().await;
  let showing_id = one_showing(&s).await;
  buy(&s, showing_id, "alice", &["A-3"]).await;

  let outcome = s
    .purchase(ticket_for(showing_id, "bob", &["A-1", "A-2", "A-3"]))
    .await
    .unwrap();
  let err = outcome.into_result().unwrap_err();
  assert!(matches!(err, marquee_core::Error::SeatConflict(ref c) if c.seat == seat("A-3")));

  let reserved = s.find_reserved_seats(showing_id).await.unwrap();
  assert_eq!(reserved.into_iter().collect::<Vec<_>>(), [seat("A-3")]);
  assert!(s.tickets_for_purchaser("bob").await.unwrap().is_empty());
  assert_eq!(
    s.count_tickets_for_showings(&[showing_id]).await.unwrap()[&showing_id],
    1
  );
}

#[tokio::test]
async fn same_seat_in_another_showing_is_free() {
  let s = store().await;
  let m = movie(&s, "M", 120).await;
  run(&s, &mon_wed(m.movie_id, "2025-01-08"), &mut Scripted::yes())
    .await
    .unwrap();
  let showings = s.find_showings(m.movie_id, "A").await.unwrap();

  buy(&s, showings[0].showing_id, "alice", &["A-1"]).await;
  buy(&s, showings[1].showing_id, "bob", &["A-1"]).await;
}

#[tokio::test]
async fn purchase_for_missing_showing_fails() {
  let s = store().await;
  let err = s.purchase(ticket_for(77, "alice", &["A-1"])).await.unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::ShowingNotFound(77))));
}

#[tokio::test]
async fn purchase_validates_input() {
  let s = store().await;
  let showing_id = one_showing(&s).await;

  let mut input = ticket_for(showing_id, "alice", &["A-1", "A-2"]);
  input.breakdown = BTreeMap::from([("adult".to_owned(), 1)]);
  let err = s.purchase(input).await.unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::Validation(_))));

  let err = s
    .purchase(ticket_for(showing_id, "alice", &["A-1", "A-1"]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::Validation(_))));
  assert!(s.find_reserved_seats(showing_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn tickets_listed_per_purchaser_newest_first() {
  let s = store().await;
  let showing_id = one_showing(&s).await;
  let first = buy(&s, showing_id, "alice", &["A-1"]).await;
  let second = buy(&s, showing_id, "alice", &["A-2"]).await;
  buy(&s, showing_id, "bob", &["A-3"]).await;

  let alice = s.tickets_for_purchaser("alice").await.unwrap();
  let uuids: Vec<Uuid> = alice.iter().map(|t| t.uuid).collect();
  assert_eq!(uuids, [second.uuid, first.uuid]);
  assert!(s.tickets_for_purchaser("carol").await.unwrap().is_empty());
}

#[tokio::test]
async fn cancel_frees_seats() {
  let s = store().await;
  let showing_id = one_showing(&s).await;
  let ticket = buy(&s, showing_id, "alice", &["D-1", "D-2"]).await;

  let cancelled = s.cancel_ticket(ticket.uuid).await.unwrap();
  assert_eq!(cancelled.seats, ticket.seats);
  assert!(s.get_ticket(ticket.uuid).await.unwrap().is_none());
  assert!(s.find_reserved_seats(showing_id).await.unwrap().is_empty());

  // The seats can be bought again.
  buy(&s, showing_id, "bob", &["D-1"]).await;

  let err = s.cancel_ticket(ticket.uuid).await.unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::TicketNotFound(_))));
}

#[tokio::test]
async fn used_ticket_cannot_be_cancelled() {
  let s = store().await;
  let showing_id = one_showing(&s).await;
  let ticket = buy(&s, showing_id, "alice", &["A-1"]).await;
  s.admit_ticket(ticket.uuid, at("2025-01-06T17:45")).await.unwrap();

  let err = s.cancel_ticket(ticket.uuid).await.unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::TicketAlreadyUsed(_))));
  assert!(s.get_ticket(ticket.uuid).await.unwrap().is_some());
  assert_eq!(s.find_reserved_seats(showing_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn gate_admits_once() {
  let s = store().await;
  let showing_id = one_showing(&s).await;
  let ticket = buy(&s, showing_id, "alice", &["A-1"]).await;

  let first = s.admit_ticket(ticket.uuid, at("2025-01-06T17:45")).await.unwrap();
  let GateResult::Admitted(admitted) = first else {
    panic!("expected admission, got {first:?}");
  };
  assert_eq!(admitted.used_at, Some(at("2025-01-06T17:45")));

  let second = s.admit_ticket(ticket.uuid, at("2025-01-06T17:50")).await.unwrap();
  let GateResult::AlreadyUsed(again) = second else {
    panic!("expected rejection, got {second:?}");
  };
  assert_eq!(again.used_at, Some(at("2025-01-06T17:45")));

  let err = s
    .admit_ticket(Uuid::new_v4(), at("2025-01-06T17:45"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::TicketNotFound(_))));
}

// ─── Separate connections ────────────────────────────────────────────────────

/// Two stores on one database file, as two `marquee` processes would have.
async fn two_clients() -> (SqliteStore, SqliteStore, tempfile::TempDir) {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("cinema.db");
  let a = SqliteStore::open(&path).await.unwrap();
  let b = SqliteStore::open(&path).await.unwrap();
  (a, b, dir)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_clients_racing_for_a_seat_see_a_rejection() {
  let (a, b, _dir) = two_clients().await;
  let m = movie(&a, "M", 90).await;

  let first_day = date("2025-02-01");
  let to_add = (0..100u64)
    .map(|day| {
      let start = Instant::at(first_day + Days::new(day), time("18:00")).unwrap();
      NewShowing {
        movie_id: m.movie_id,
        hall: "A".into(),
        start,
        end: start.plus_minutes(90).unwrap(),
        price: 1000,
      }
    })
    .collect();
  a.apply_plan(&SchedulePlan { to_add, ..Default::default() })
    .await
    .unwrap();
  let showings = b.find_showings(m.movie_id, "A").await.unwrap();
  assert_eq!(showings.len(), 100);

  for showing in &showings {
    let id = showing.showing_id;
    let (x, y) = tokio::join!(
      a.purchase(ticket_for(id, "alice", &["A-1", "A-2"])),
      b.purchase(ticket_for(id, "bob", &["A-2", "A-3"])),
    );
    let outcomes = [
      x.expect("first client must not fail"),
      y.expect("second client must not fail"),
    ];
    let reserved = outcomes
      .iter()
      .filter(|o| matches!(o, Admission::Reserved(_)))
      .count();
    assert_eq!(reserved, 1, "showing {id}");
    assert!(outcomes.iter().any(|o| matches!(
      o,
      Admission::Rejected(c) if c.seat == seat("A-2") && c.showing_id == id
    )));
  }

  for showing in &showings {
    assert_eq!(a.find_reserved_seats(showing.showing_id).await.unwrap().len(), 2);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_clients_share_cancellations_and_gate_checks() {
  let (a, b, _dir) = two_clients().await;
  let showing_id = one_showing(&a).await;
  let ticket = buy(&a, showing_id, "alice", &["C-1"]).await;

  let (gate_a, gate_b) = tokio::join!(
    a.admit_ticket(ticket.uuid, at("2025-01-06T17:40")),
    b.admit_ticket(ticket.uuid, at("2025-01-06T17:41")),
  );
  let results = [gate_a.unwrap(), gate_b.unwrap()];
  let admitted = results
    .iter()
    .filter(|r| matches!(r, GateResult::Admitted(_)))
    .count();
  assert_eq!(admitted, 1);

  let err = b.cancel_ticket(ticket.uuid).await.unwrap_err();
  assert!(matches!(err, Error::Core(marquee_core::Error::TicketAlreadyUsed(_))));
}
