//! SQLite backend for the Marquee cinema store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write is one transaction; the
//! `(showing_id, seat)` uniqueness constraint is what settles racing ticket
//! purchases.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
