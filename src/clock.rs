//! Calendar source. Limit periods are derived from "today", so tests need
//! to pin it.

use chrono::{Local, NaiveDate};

pub trait Clock: Send + Sync {
  fn today(&self) -> NaiveDate;
}

/// Local calendar date of the machine running the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn today(&self) -> NaiveDate {
    Local::now().date_naive()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
  fn today(&self) -> NaiveDate {
    self.0
  }
}
