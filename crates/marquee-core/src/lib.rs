//! Core types and the scheduling engine for the Marquee cinema system.
//!
//! This crate is deliberately free of database and terminal dependencies.
//! Storage backends implement [`store::CinemaStore`]; the scheduling run in
//! [`schedule`] is written against that trait only.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod conflict;
pub mod error;
pub mod hall;
pub mod impact;
pub mod movie;
pub mod reconcile;
pub mod rule;
pub mod schedule;
pub mod showing;
pub mod store;
pub mod ticket;
pub mod time;

pub use error::{Error, Result, ValidationError};
