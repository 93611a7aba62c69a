//! Domain records mirrored from the server.

pub mod aggregate;
pub mod category;
pub mod filter;
pub mod limit;
pub mod money;
pub mod period;
pub mod transaction;

pub use aggregate::{BalanceSnapshot, CategoryChartEntry, DebtBalance};
pub use category::Category;
pub use filter::{PeriodFilter, TransactionFilter};
pub use limit::{Limit, LimitCreate, LimitForm, LimitUpdate, LimitUsage};
pub use money::Amount;
pub use period::{Period, YearMonth};
pub use transaction::{
  Transaction, TransactionCreate, TransactionForm, TransactionKind, TransactionUpdate,
};

use chrono::{DateTime, NaiveDate, Utc};

/// Records that belong to a calendar date.
pub trait Dated {
  fn date(&self) -> NaiveDate;
  fn created_at(&self) -> DateTime<Utc>;
}

/// Lenient date parsing for server payloads.
///
/// The server sometimes sends calendar dates as full timestamps and
/// sometimes omits the UTC offset on timestamps.
pub(crate) mod wire {
  use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
  use serde::{Deserialize, Deserializer};

  pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    raw
      .get(..10)
      .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
  }

  pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
      return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
      .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
      .map(|naive| naive.and_utc())
      .ok()
  }

  pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date {:?}", raw)))
  }

  pub fn timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
      .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {:?}", raw)))
  }

}
