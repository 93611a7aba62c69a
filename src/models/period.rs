//! Calendar periods used to scope lists and aggregates.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
  #[error("invalid month {0:?}, expected YYYY-MM")]
  InvalidMonth(String),
  #[error("period start {start} is after end {end}")]
  Inverted { start: NaiveDate, end: NaiveDate },
}

/// A calendar month, e.g. 2024-05.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
  year: i32,
  month: u32,
}

impl YearMonth {
  pub fn new(year: i32, month: u32) -> Option<Self> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
  }

  /// The month containing `date`.
  pub fn containing(date: NaiveDate) -> Self {
    Self {
      year: date.year(),
      month: date.month(),
    }
  }

  pub fn year(&self) -> i32 {
    self.year
  }

  pub fn month(&self) -> u32 {
    self.month
  }

  pub fn first_day(&self) -> NaiveDate {
    NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
  }

  pub fn last_day(&self) -> NaiveDate {
    self
      .next()
      .first_day()
      .pred_opt()
      .unwrap_or(NaiveDate::MAX)
  }

  pub fn next(&self) -> Self {
    if self.month == 12 {
      Self {
        year: self.year + 1,
        month: 1,
      }
    } else {
      Self {
        year: self.year,
        month: self.month + 1,
      }
    }
  }

  pub fn prev(&self) -> Self {
    if self.month == 1 {
      Self {
        year: self.year - 1,
        month: 12,
      }
    } else {
      Self {
        year: self.year,
        month: self.month - 1,
      }
    }
  }
}

impl fmt::Display for YearMonth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04}-{:02}", self.year, self.month)
  }
}

impl FromStr for YearMonth {
  type Err = PeriodError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || PeriodError::InvalidMonth(s.to_string());
    let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    YearMonth::new(year, month).ok_or_else(invalid)
  }
}

/// The date window a query covers.
///
/// `Month(2024-05)` and `Range { 2024-05-01, 2024-05-31 }` cover the same
/// dates and serialize to the same query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Period {
  #[default]
  All,
  Month(YearMonth),
  Range { start: NaiveDate, end: NaiveDate },
}

impl Period {
  /// Build an explicit range. Fails if `start` is after `end`.
  pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
    if start > end {
      return Err(PeriodError::Inverted { start, end });
    }
    Ok(Self::Range { start, end })
  }

  pub fn current_month(today: NaiveDate) -> Self {
    Self::Month(YearMonth::containing(today))
  }

  /// Inclusive date bounds, or `None` for an unbounded period.
  pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
    match self {
      Period::All => None,
      Period::Month(month) => Some((month.first_day(), month.last_day())),
      Period::Range { start, end } => Some((*start, *end)),
    }
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    match self.bounds() {
      Some((start, end)) => start <= date && date <= end,
      None => true,
    }
  }

  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    match self.bounds() {
      Some((start, end)) => vec![
        ("start_date", start.format("%Y-%m-%d").to_string()),
        ("end_date", end.format("%Y-%m-%d").to_string()),
      ],
      None => Vec::new(),
    }
  }

  pub fn label(&self) -> String {
    match self {
      Period::All => "all time".to_string(),
      Period::Month(month) => month.to_string(),
      Period::Range { start, end } => format!("{} .. {}", start, end),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
  }

  #[test]
  fn test_month_bounds() {
    let june = YearMonth::new(2024, 6).unwrap();
    assert_eq!(june.first_day(), date("2024-06-01"));
    assert_eq!(june.last_day(), date("2024-06-30"));

    let feb = YearMonth::new(2024, 2).unwrap();
    assert_eq!(feb.last_day(), date("2024-02-29"));

    let dec = YearMonth::new(2023, 12).unwrap();
    assert_eq!(dec.last_day(), date("2023-12-31"));
    assert_eq!(dec.next(), YearMonth::new(2024, 1).unwrap());
    assert_eq!(dec.next().prev(), dec);
  }

  #[test]
  fn test_parse_month() {
    let month: YearMonth = "2024-05".parse().unwrap();
    assert_eq!(month.to_string(), "2024-05");
    assert!("2024-13".parse::<YearMonth>().is_err());
    assert!("May".parse::<YearMonth>().is_err());
  }

  #[test]
  fn test_range_rejects_inverted() {
    assert!(Period::range(date("2024-05-02"), date("2024-05-01")).is_err());
    assert!(Period::range(date("2024-05-01"), date("2024-05-01")).is_ok());
  }

  #[test]
  fn test_month_and_range_share_query() {
    let month = Period::Month("2024-05".parse().unwrap());
    let range = Period::range(date("2024-05-01"), date("2024-05-31")).unwrap();
    assert_eq!(month.query_pairs(), range.query_pairs());
    assert!(Period::All.query_pairs().is_empty());
  }

  #[test]
  fn test_contains() {
    let month = Period::Month("2024-05".parse().unwrap());
    assert!(month.contains(date("2024-05-31")));
    assert!(!month.contains(date("2024-06-01")));
    assert!(Period::All.contains(date("1999-01-01")));
  }
}
