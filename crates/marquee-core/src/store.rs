//! The `CinemaStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `marquee-store-sqlite`). The scheduling core and the CLI depend on this
//! abstraction, not on any concrete backend.

use std::{
  collections::{BTreeSet, HashMap},
  future::Future,
};

use uuid::Uuid;

use crate::{
  movie::{Movie, NewMovie},
  reconcile::SchedulePlan,
  showing::{HallOccupant, Showing},
  ticket::{Admission, GateResult, NewTicket, SeatLabel, Ticket},
  time::{Instant, Interval},
};

/// Abstraction over a cinema store backend.
///
/// Showings are written only through [`apply_plan`](Self::apply_plan) (and
/// the standalone cascade of [`delete_showing`](Self::delete_showing)).
/// Seats are reserved only through [`purchase`](Self::purchase), whose
/// uniqueness check is the sole arbiter between racing buyers.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait CinemaStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Movies ────────────────────────────────────────────────────────────

  fn add_movie(
    &self,
    input: NewMovie,
  ) -> impl Future<Output = Result<Movie, Self::Error>> + Send + '_;

  /// Replace a movie's details. Existing showings keep their `end` until
  /// their scope is rescheduled.
  fn update_movie(
    &self,
    movie_id: i64,
    input: NewMovie,
  ) -> impl Future<Output = Result<Movie, Self::Error>> + Send + '_;

  /// Retrieve a movie by id. Returns `None` if not found.
  fn get_movie(
    &self,
    movie_id: i64,
  ) -> impl Future<Output = Result<Option<Movie>, Self::Error>> + Send + '_;

  fn list_movies(
    &self,
  ) -> impl Future<Output = Result<Vec<Movie>, Self::Error>> + Send + '_;

  /// Delete a movie that has no showings. Fails otherwise.
  fn delete_movie(
    &self,
    movie_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Showings — reads ──────────────────────────────────────────────────

  fn get_showing(
    &self,
    showing_id: i64,
  ) -> impl Future<Output = Result<Option<Showing>, Self::Error>> + Send + '_;

  /// Every showing of `movie_id` in `hall`, in start order. This is the
  /// scope a scheduling rule owns.
  fn find_showings<'a>(
    &'a self,
    movie_id: i64,
    hall: &'a str,
  ) -> impl Future<Output = Result<Vec<Showing>, Self::Error>> + Send + 'a;

  /// Every showing in `hall` (of any movie) overlapping `window`, except
  /// those whose id is in `exclude_ids`.
  fn find_showings_in_hall_overlapping<'a>(
    &'a self,
    hall: &'a str,
    window: Interval,
    exclude_ids: &'a [i64],
  ) -> impl Future<Output = Result<Vec<HallOccupant>, Self::Error>> + Send + 'a;

  /// Ticket counts per showing. Showings without tickets may be absent.
  fn count_tickets_for_showings<'a>(
    &'a self,
    showing_ids: &'a [i64],
  ) -> impl Future<Output = Result<HashMap<i64, u64>, Self::Error>> + Send + 'a;

  // ── Showings — writes ─────────────────────────────────────────────────

  /// Insert `to_add`, update `to_update` in place and delete `to_delete`
  /// (with their tickets and seats) as one atomic unit. On error nothing
  /// has changed.
  fn apply_plan<'a>(
    &'a self,
    plan: &'a SchedulePlan,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete one showing with its seat reservations and tickets, atomically.
  fn delete_showing(
    &self,
    showing_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Seats and tickets ─────────────────────────────────────────────────

  fn find_reserved_seats(
    &self,
    showing_id: i64,
  ) -> impl Future<Output = Result<BTreeSet<SeatLabel>, Self::Error>> + Send + '_;

  /// Insert a ticket and one reservation per seat in one transaction.
  ///
  /// A seat already held for the showing rolls the whole purchase back and
  /// yields [`Admission::Rejected`]; the caller must re-select seats.
  fn purchase(
    &self,
    input: NewTicket,
  ) -> impl Future<Output = Result<Admission, Self::Error>> + Send + '_;

  fn get_ticket(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Option<Ticket>, Self::Error>> + Send + '_;

  /// Tickets bought under `name`, newest first.
  fn tickets_for_purchaser<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Vec<Ticket>, Self::Error>> + Send + 'a;

  /// Delete an unused ticket and free its seats. A used ticket is an error.
  fn cancel_ticket(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<Ticket, Self::Error>> + Send + '_;

  /// Gate check: record `at` as the usage time unless already used.
  fn admit_ticket(
    &self,
    uuid: Uuid,
    at: Instant,
  ) -> impl Future<Output = Result<GateResult, Self::Error>> + Send + '_;
}
