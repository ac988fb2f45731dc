//! Movies, the owners of showings.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Longest accepted runtime: one day.
pub const MAX_DURATION_MIN: i64 = 24 * 60;

/// A movie in the catalogue. Its runtime determines the end of every showing
/// scheduled for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
  pub movie_id:      i64,
  pub title:         String,
  pub duration_min:  i64,
  /// Price used by scheduling rules that do not name one.
  pub default_price: i64,
  pub description:   Option<String>,
}

/// Input for [`CinemaStore::add_movie`](crate::store::CinemaStore::add_movie)
/// and [`CinemaStore::update_movie`](crate::store::CinemaStore::update_movie).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovie {
  pub title:         String,
  pub duration_min:  i64,
  pub default_price: i64,
  pub description:   Option<String>,
}

impl NewMovie {
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.duration_min <= 0 {
      return Err(ValidationError::NonPositiveDuration(self.duration_min));
    }
    if self.duration_min > MAX_DURATION_MIN {
      return Err(ValidationError::DurationTooLong(self.duration_min));
    }
    if self.default_price < 0 {
      return Err(ValidationError::NegativePrice(self.default_price));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn new_movie(duration_min: i64) -> NewMovie {
    NewMovie {
      title: "Stalker".into(),
      duration_min,
      default_price: 900,
      description: None,
    }
  }

  #[test]
  fn duration_must_fit_in_a_day() {
    assert!(new_movie(161).validate().is_ok());
    assert!(new_movie(MAX_DURATION_MIN).validate().is_ok());
    assert_eq!(
      new_movie(0).validate(),
      Err(ValidationError::NonPositiveDuration(0))
    );
    assert_eq!(
      new_movie(i64::MAX / 2).validate(),
      Err(ValidationError::DurationTooLong(i64::MAX / 2))
    );
  }

  #[test]
  fn negative_default_price_is_rejected() {
    let mut m = new_movie(90);
    m.default_price = -1;
    assert_eq!(m.validate(), Err(ValidationError::NegativePrice(-1)));
  }
}
