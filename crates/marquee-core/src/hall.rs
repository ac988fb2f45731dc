//! Hall seat layouts.
//!
//! A layout is a text grid read top to bottom. Each `#` is a seat; every
//! other character is floor. Row `n` (0-based, blank lines included) is
//! lettered `A + n`, and seats in a row are numbered from 1 left to right,
//! so the third `#` on the second line is `B-3`.

use std::collections::BTreeSet;

use crate::{error::ValidationError, ticket::SeatLabel};

/// Rows are lettered `A..=Z`.
const MAX_ROWS: usize = 26;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HallLayout {
  pub hall: String,
  seats:    Vec<SeatLabel>,
}

impl HallLayout {
  /// Fails if seats sit below row `Z`; trailing blank lines are ignored.
  pub fn parse(hall: impl Into<String>, text: &str) -> Result<Self, ValidationError> {
    let lines: Vec<&str> = text.lines().collect();
    let rows = lines
      .iter()
      .rposition(|line| !line.trim().is_empty())
      .map_or(0, |last| last + 1);
    if rows > MAX_ROWS {
      return Err(ValidationError::TooManyRows(rows));
    }

    let mut seats = vec![];
    for (row, line) in lines[..rows].iter().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let letter = char::from(b'A' + row as u8);
      let count = line.chars().filter(|&c| c == '#').count();
      seats.extend((1..=count as u32).map(|n| SeatLabel::new(letter, n)));
    }
    Ok(Self { hall: hall.into(), seats })
  }

  /// Seats in layout order.
  pub fn seat_labels(&self) -> &[SeatLabel] { &self.seats }

  pub fn contains(&self, seat: &SeatLabel) -> bool { self.seats.contains(seat) }

  /// Seats not in `reserved`, in layout order.
  pub fn available<'a>(
    &'a self,
    reserved: &'a BTreeSet<SeatLabel>,
  ) -> impl Iterator<Item = &'a SeatLabel> + 'a {
    self.seats.iter().filter(move |s| !reserved.contains(s))
  }
}
