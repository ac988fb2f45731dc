//! [`SqliteStore`], the SQLite implementation of [`CinemaStore`].

use std::{
  collections::{BTreeSet, HashMap},
  path::Path,
  time::Duration,
};

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use marquee_core::{
  movie::{Movie, NewMovie},
  reconcile::SchedulePlan,
  showing::{HallOccupant, Showing},
  store::CinemaStore,
  ticket::{Admission, GateResult, NewTicket, SeatConflict, SeatLabel, Ticket},
  time::{Instant, Interval},
};

use crate::{
  Error, Result,
  encode::{
    MOVIE_COLUMNS, RawOccupant, RawShowing, RawTicket, SHOWING_COLUMNS, TICKET_COLUMNS,
    encode_breakdown, encode_instant, encode_uuid, is_unique_violation, movie_from_row,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Marquee cinema store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's background thread; each write method
/// is one transaction.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Statement helpers ───────────────────────────────────────────────────────
//
// These run on the connection thread, usually inside a transaction (which
// derefs to `Connection`).

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Begin a write transaction that takes the write lock up front.
///
/// Connections sharing the file wait here on [`BUSY_TIMEOUT`]; a deferred
/// transaction would instead fail its read-to-write upgrade with
/// `SQLITE_BUSY`.
fn write_tx(conn: &mut rusqlite::Connection) -> rusqlite::Result<rusqlite::Transaction<'_>> {
  conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
}

fn insert_showing(
  conn: &rusqlite::Connection,
  movie_id: i64,
  hall: &str,
  start_at: &str,
  end_at: &str,
  price: i64,
) -> rusqlite::Result<i64> {
  conn.execute(
    "INSERT INTO showings (movie_id, hall, start_at, end_at, price)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![movie_id, hall, start_at, end_at, price],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Update the mutable fields of a showing; its identity stays put.
fn update_showing(
  conn: &rusqlite::Connection,
  showing_id: i64,
  end_at: &str,
  price: i64,
) -> rusqlite::Result<()> {
  let n = conn.execute(
    "UPDATE showings SET end_at = ?2, price = ?3 WHERE showing_id = ?1",
    rusqlite::params![showing_id, end_at, price],
  )?;
  if n == 0 {
    return Err(rusqlite::Error::QueryReturnedNoRows);
  }
  Ok(())
}

/// Delete a showing after its seat reservations and tickets, in that order.
fn delete_showing_cascade(
  conn: &rusqlite::Connection,
  showing_id: i64,
) -> rusqlite::Result<usize> {
  conn.execute(
    "DELETE FROM ticket_seats WHERE showing_id = ?1",
    rusqlite::params![showing_id],
  )?;
  let tickets = conn.execute(
    "DELETE FROM tickets WHERE showing_id = ?1",
    rusqlite::params![showing_id],
  )?;
  let n = conn.execute(
    "DELETE FROM showings WHERE showing_id = ?1",
    rusqlite::params![showing_id],
  )?;
  if n == 0 {
    return Err(rusqlite::Error::QueryReturnedNoRows);
  }
  Ok(tickets)
}

/// Load tickets matching `filter` (a SQL predicate over `tickets` taking one
/// parameter), with their seats.
fn load_tickets(
  conn: &rusqlite::Connection,
  filter: &str,
  param: &dyn rusqlite::ToSql,
) -> rusqlite::Result<Vec<RawTicket>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TICKET_COLUMNS} FROM tickets WHERE {filter}
     ORDER BY issued_at DESC, ticket_id DESC"
  ))?;
  let mut tickets = stmt
    .query_map([param], RawTicket::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut seat_stmt =
    conn.prepare("SELECT seat FROM ticket_seats WHERE ticket_id = ?1")?;
  for ticket in &mut tickets {
    ticket.seats = seat_stmt
      .query_map([ticket.ticket_id], |r| r.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
  }
  Ok(tickets)
}

fn load_ticket(
  conn: &rusqlite::Connection,
  uuid: &str,
) -> rusqlite::Result<Option<RawTicket>> {
  Ok(load_tickets(conn, "uuid = ?1", &uuid)?.into_iter().next())
}

/// What happened inside the purchase transaction.
enum PurchaseRow {
  Issued(i64),
  NoShowing,
  SeatTaken(SeatLabel),
}

/// What happened inside the cancel transaction.
enum CancelRow {
  Missing,
  Used,
  Cancelled(RawTicket),
}

// ─── CinemaStore impl ────────────────────────────────────────────────────────

impl CinemaStore for SqliteStore {
  type Error = Error;

  // ── Movies ────────────────────────────────────────────────────────────────

  async fn add_movie(&self, input: NewMovie) -> Result<Movie> {
    input.validate().map_err(marquee_core::Error::from)?;
    let NewMovie { title, duration_min, default_price, description } = input;

    let (t, d) = (title.clone(), description.clone());
    let movie_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO movies (title, duration_min, default_price, description)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![t, duration_min, default_price, d],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Movie { movie_id, title, duration_min, default_price, description })
  }

  async fn update_movie(&self, movie_id: i64, input: NewMovie) -> Result<Movie> {
    input.validate().map_err(marquee_core::Error::from)?;
    let NewMovie { title, duration_min, default_price, description } = input;

    let (t, d) = (title.clone(), description.clone());
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE movies
           SET title = ?2, duration_min = ?3, default_price = ?4, description = ?5
           WHERE movie_id = ?1",
          rusqlite::params![movie_id, t, duration_min, default_price, d],
        )?)
      })
      .await?;
    if updated == 0 {
      return Err(marquee_core::Error::MovieNotFound(movie_id).into());
    }

    tracing::info!(movie_id, duration_min, "movie updated");
    Ok(Movie { movie_id, title, duration_min, default_price, description })
  }

  async fn get_movie(&self, movie_id: i64) -> Result<Option<Movie>> {
    let movie = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE movie_id = ?1"),
            rusqlite::params![movie_id],
            movie_from_row,
          )
          .optional()?)
      })
      .await?;
    Ok(movie)
  }

  async fn list_movies(&self) -> Result<Vec<Movie>> {
    let movies = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {MOVIE_COLUMNS} FROM movies ORDER BY movie_id"))?;
        let rows = stmt
          .query_map([], movie_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(movies)
  }

  async fn delete_movie(&self, movie_id: i64) -> Result<()> {
    let (showings, deleted): (i64, usize) = self
      .conn
      .call(move |conn| {
        let tx = write_tx(conn)?;
        let showings: i64 = tx.query_row(
          "SELECT COUNT(*) FROM showings WHERE movie_id = ?1",
          rusqlite::params![movie_id],
          |r| r.get(0),
        )?;
        if showings > 0 {
          return Ok((showings, 0));
        }
        let deleted = tx.execute(
          "DELETE FROM movies WHERE movie_id = ?1",
          rusqlite::params![movie_id],
        )?;
        tx.commit()?;
        Ok((0, deleted))
      })
      .await?;

    if showings > 0 {
      return Err(Error::MovieHasShowings(movie_id));
    }
    if deleted == 0 {
      return Err(marquee_core::Error::MovieNotFound(movie_id).into());
    }
    Ok(())
  }

  // ── Showings — reads ──────────────────────────────────────────────────────

  async fn get_showing(&self, showing_id: i64) -> Result<Option<Showing>> {
    let raw: Option<RawShowing> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SHOWING_COLUMNS} FROM showings WHERE showing_id = ?1"),
            rusqlite::params![showing_id],
            |row| RawShowing::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawShowing::into_showing).transpose()
  }

  async fn find_showings(&self, movie_id: i64, hall: &str) -> Result<Vec<Showing>> {
    let hall = hall.to_owned();

    let raws: Vec<RawShowing> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SHOWING_COLUMNS} FROM showings
           WHERE movie_id = ?1 AND hall = ?2
           ORDER BY start_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![movie_id, hall], |row| {
            RawShowing::from_row(row, 0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawShowing::into_showing).collect()
  }

  async fn find_showings_in_hall_overlapping(
    &self,
    hall: &str,
    window: Interval,
    exclude_ids: &[i64],
  ) -> Result<Vec<HallOccupant>> {
    let hall = hall.to_owned();
    let start = encode_instant(window.start);
    let end = encode_instant(window.end);

    // Text comparison is chronological because every stored instant has the
    // same width (enforced by the schema's GLOB checks).
    let raws: Vec<RawOccupant> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT s.showing_id, s.movie_id, s.hall, s.start_at, s.end_at, s.price,
                  m.title
           FROM showings s
           JOIN movies m ON m.movie_id = s.movie_id
           WHERE s.hall = ?1 AND s.start_at < ?3 AND s.end_at > ?2
           ORDER BY s.start_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![hall, start, end], |row| {
            Ok(RawOccupant {
              showing:     RawShowing::from_row(row, 0)?,
              movie_title: row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .filter(|r| !exclude_ids.contains(&r.showing.showing_id))
      .map(RawOccupant::into_occupant)
      .collect()
  }

  async fn count_tickets_for_showings(
    &self,
    showing_ids: &[i64],
  ) -> Result<HashMap<i64, u64>> {
    if showing_ids.is_empty() {
      return Ok(HashMap::new());
    }
    let ids = showing_ids.to_vec();

    let counts = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
          "SELECT showing_id, COUNT(*) FROM tickets
           WHERE showing_id IN ({placeholders})
           GROUP BY showing_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64))
          })?
          .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(counts)
  }

  // ── Showings — writes ─────────────────────────────────────────────────────

  async fn apply_plan(&self, plan: &SchedulePlan) -> Result<()> {
    let to_add: Vec<(i64, String, String, String, i64)> = plan
      .to_add
      .iter()
      .map(|s| {
        (s.movie_id, s.hall.clone(), encode_instant(s.start), encode_instant(s.end), s.price)
      })
      .collect();
    let to_update: Vec<(i64, String, i64)> = plan
      .to_update
      .iter()
      .map(|s| (s.showing_id, encode_instant(s.end), s.price))
      .collect();
    let to_delete: Vec<i64> = plan.to_delete.iter().map(|s| s.showing_id).collect();

    let tickets_deleted = self
      .conn
      .call(move |conn| {
        let tx = write_tx(conn)?;
        for (movie_id, hall, start_at, end_at, price) in &to_add {
          insert_showing(&tx, *movie_id, hall, start_at, end_at, *price)?;
        }
        for (showing_id, end_at, price) in &to_update {
          update_showing(&tx, *showing_id, end_at, *price)?;
        }
        let mut tickets_deleted = 0;
        for showing_id in &to_delete {
          tickets_deleted += delete_showing_cascade(&tx, *showing_id)?;
        }
        tx.commit()?;
        Ok(tickets_deleted)
      })
      .await?;

    tracing::debug!(
      added = plan.to_add.len(),
      updated = plan.to_update.len(),
      deleted = plan.to_delete.len(),
      tickets_deleted,
      "plan committed"
    );
    Ok(())
  }

  async fn delete_showing(&self, showing_id: i64) -> Result<()> {
    let deleted = self
      .conn
      .call(move |conn| {
        let tx = write_tx(conn)?;
        let tickets = match delete_showing_cascade(&tx, showing_id) {
          Ok(n) => n,
          Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
          Err(e) => return Err(e.into()),
        };
        tx.commit()?;
        Ok(Some(tickets))
      })
      .await?;

    match deleted {
      Some(tickets) => {
        tracing::info!(showing_id, tickets, "showing deleted");
        Ok(())
      }
      None => Err(marquee_core::Error::ShowingNotFound(showing_id).into()),
    }
  }

  // ── Seats and tickets ─────────────────────────────────────────────────────

  async fn find_reserved_seats(&self, showing_id: i64) -> Result<BTreeSet<SeatLabel>> {
    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT seat FROM ticket_seats WHERE showing_id = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![showing_id], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .iter()
        .map(|s| SeatLabel::parse(s))
        .collect::<Result<BTreeSet<_>, _>>()?,
    )
  }

  async fn purchase(&self, input: NewTicket) -> Result<Admission> {
    input.validate().map_err(marquee_core::Error::from)?;

    let ticket_uuid = Uuid::new_v4();
    let issued_at = Instant::now();

    let showing_id     = input.showing_id;
    let uuid_str       = encode_uuid(ticket_uuid);
    let issued_str     = encode_instant(issued_at);
    let breakdown_json = encode_breakdown(&input.breakdown)?;
    let purchaser      = input.purchaser.clone();
    let seats          = input.seats.clone();
    let total_price    = input.total_price;

    let row = self
      .conn
      .call(move |conn| {
        let tx = write_tx(conn)?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM showings WHERE showing_id = ?1",
            rusqlite::params![showing_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(PurchaseRow::NoShowing);
        }

        tx.execute(
          "INSERT INTO tickets (
             uuid, showing_id, user_name, age, sex, is_member,
             breakdown_json, total_price, issued_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            uuid_str,
            showing_id,
            purchaser.name,
            purchaser.age,
            purchaser.sex,
            purchaser.is_member,
            breakdown_json,
            total_price,
            issued_str,
          ],
        )?;
        let ticket_id = tx.last_insert_rowid();

        for seat in &seats {
          let inserted = tx.execute(
            "INSERT INTO ticket_seats (ticket_id, showing_id, seat) VALUES (?1, ?2, ?3)",
            rusqlite::params![ticket_id, showing_id, seat.to_string()],
          );
          match inserted {
            Ok(_) => {}
            // Dropping `tx` rolls back the ticket and any seats already in.
            Err(e) if is_unique_violation(&e) => return Ok(PurchaseRow::SeatTaken(*seat)),
            Err(e) => return Err(e.into()),
          }
        }

        tx.commit()?;
        Ok(PurchaseRow::Issued(ticket_id))
      })
      .await?;

    match row {
      PurchaseRow::Issued(ticket_id) => {
        let mut seats = input.seats;
        seats.sort();
        tracing::info!(showing_id, ticket = %ticket_uuid, seats = seats.len(), "ticket issued");
        Ok(Admission::Reserved(Ticket {
          ticket_id,
          uuid: ticket_uuid,
          showing_id,
          purchaser: input.purchaser,
          seats,
          breakdown: input.breakdown,
          total_price,
          issued_at,
          used_at: None,
        }))
      }
      PurchaseRow::SeatTaken(seat) => {
        tracing::warn!(showing_id, %seat, "seat already reserved; purchase rejected");
        Ok(Admission::Rejected(SeatConflict { showing_id, seat }))
      }
      PurchaseRow::NoShowing => Err(marquee_core::Error::ShowingNotFound(showing_id).into()),
    }
  }

  async fn get_ticket(&self, uuid: Uuid) -> Result<Option<Ticket>> {
    let uuid_str = encode_uuid(uuid);
    let raw = self
      .conn
      .call(move |conn| Ok(load_ticket(conn, &uuid_str)?))
      .await?;
    raw.map(RawTicket::into_ticket).transpose()
  }

  async fn tickets_for_purchaser(&self, name: &str) -> Result<Vec<Ticket>> {
    let name = name.to_owned();
    let raws = self
      .conn
      .call(move |conn| Ok(load_tickets(conn, "user_name = ?1", &name)?))
      .await?;
    raws.into_iter().map(RawTicket::into_ticket).collect()
  }

  async fn cancel_ticket(&self, uuid: Uuid) -> Result<Ticket> {
    let uuid_str = encode_uuid(uuid);

    let row = self
      .conn
      .call(move |conn| {
        let tx = write_tx(conn)?;
        let Some(raw) = load_ticket(&tx, &uuid_str)? else {
          return Ok(CancelRow::Missing);
        };
        if raw.used_at.is_some() {
          return Ok(CancelRow::Used);
        }
        tx.execute(
          "DELETE FROM ticket_seats WHERE ticket_id = ?1",
          rusqlite::params![raw.ticket_id],
        )?;
        tx.execute(
          "DELETE FROM tickets WHERE ticket_id = ?1 AND used_at IS NULL",
          rusqlite::params![raw.ticket_id],
        )?;
        tx.commit()?;
        Ok(CancelRow::Cancelled(raw))
      })
      .await?;

    match row {
      CancelRow::Cancelled(raw) => {
        let ticket = raw.into_ticket()?;
        tracing::info!(ticket = %uuid, seats = ticket.seats.len(), "ticket cancelled");
        Ok(ticket)
      }
      CancelRow::Used => Err(marquee_core::Error::TicketAlreadyUsed(uuid).into()),
      CancelRow::Missing => Err(marquee_core::Error::TicketNotFound(uuid).into()),
    }
  }

  async fn admit_ticket(&self, uuid: Uuid, at: Instant) -> Result<GateResult> {
    let uuid_str = encode_uuid(uuid);
    let at_str = encode_instant(at);

    let result = self
      .conn
      .call(move |conn| {
        let tx = write_tx(conn)?;
        let admitted = tx.execute(
          "UPDATE tickets SET used_at = ?2 WHERE uuid = ?1 AND used_at IS NULL",
          rusqlite::params![uuid_str, at_str],
        )? == 1;
        let raw = load_ticket(&tx, &uuid_str)?;
        tx.commit()?;
        Ok(raw.map(|r| (admitted, r)))
      })
      .await?;

    let Some((admitted, raw)) = result else {
      return Err(marquee_core::Error::TicketNotFound(uuid).into());
    };
    let ticket = raw.into_ticket()?;
    if admitted {
      tracing::info!(ticket = %uuid, showing_id = ticket.showing_id, "ticket admitted");
      Ok(GateResult::Admitted(ticket))
    } else {
      Ok(GateResult::AlreadyUsed(ticket))
    }
  }
}
