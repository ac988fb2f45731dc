//! Error type for `marquee-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] marquee_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column could not be decoded into its domain type.
  #[error("corrupt row: {0}")]
  Decode(#[from] marquee_core::ValidationError),

  #[error("movie {0} still has showings")]
  MovieHasShowings(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
