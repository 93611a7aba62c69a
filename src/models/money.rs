//! Non-negative decimal amounts.
//!
//! Amounts travel over the wire as decimal strings and are never converted
//! through floating point. Direction (income vs. expense) is carried by the
//! owning record, so an `Amount` is always a magnitude.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
  #[error("amount must not be negative: {0}")]
  Negative(Decimal),
  #[error("not a decimal amount: {0:?}")]
  Invalid(String),
}

/// A non-negative decimal magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
  pub const ZERO: Amount = Amount(Decimal::ZERO);

  pub fn new(value: Decimal) -> Result<Self, AmountError> {
    if value < Decimal::ZERO {
      return Err(AmountError::Negative(value));
    }
    Ok(Self(value))
  }

  /// Parse user or wire input. Grouping spaces and underscores are ignored,
  /// so "100 000" and "100_000" both read as 100000.
  pub fn parse(input: &str) -> Result<Self, AmountError> {
    let cleaned: String = input
      .chars()
      .filter(|c| !c.is_whitespace() && *c != '_')
      .collect();
    if cleaned.is_empty() {
      return Err(AmountError::Invalid(input.to_string()));
    }
    let value =
      Decimal::from_str(&cleaned).map_err(|_| AmountError::Invalid(input.to_string()))?;
    Self::new(value)
  }

  pub fn value(&self) -> Decimal {
    self.0
  }

  pub fn is_zero(&self) -> bool {
    self.0.is_zero()
  }
}

impl TryFrom<Decimal> for Amount {
  type Error = AmountError;

  fn try_from(value: Decimal) -> Result<Self, Self::Error> {
    Self::new(value)
  }
}

impl FromStr for Amount {
  type Err = AmountError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for Amount {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

impl Serialize for Amount {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for Amount {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let value = <Decimal as Deserialize>::deserialize(deserializer)?;
    Amount::new(value).map_err(serde::de::Error::custom)
  }
}

/// Render an amount with thousands grouping, e.g. `1 250 000.50`.
pub fn format_grouped(value: Decimal) -> String {
  let text = value.abs().to_string();
  let (int_part, frac_part) = match text.split_once('.') {
    Some((i, f)) => (i.to_string(), Some(f.to_string())),
    None => (text.clone(), None),
  };

  let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
  for (i, ch) in int_part.chars().enumerate() {
    if i > 0 && (int_part.len() - i) % 3 == 0 {
      grouped.push(' ');
    }
    grouped.push(ch);
  }

  let sign = if value < Decimal::ZERO { "-" } else { "" };
  match frac_part {
    Some(frac) => format!("{}{}.{}", sign, grouped, frac),
    None => format!("{}{}", sign, grouped),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_rejects_negative() {
    assert!(matches!(
      Amount::parse("-5"),
      Err(AmountError::Negative(_))
    ));
  }

  #[test]
  fn test_parse_ignores_grouping() {
    let amount = Amount::parse("100 000").unwrap();
    assert_eq!(amount.to_string(), "100000");
    let amount = Amount::parse("1_500.25").unwrap();
    assert_eq!(amount.to_string(), "1500.25");
  }

  #[test]
  fn test_parse_rejects_garbage() {
    assert!(Amount::parse("").is_err());
    assert!(Amount::parse("12abc").is_err());
  }

  #[test]
  fn test_serializes_as_string() {
    let amount = Amount::parse("12.50").unwrap();
    assert_eq!(serde_json::to_string(&amount).unwrap(), "\"12.50\"");
  }

  #[test]
  fn test_deserialize_rejects_negative() {
    let parsed: Result<Amount, _> = serde_json::from_str("\"-1.00\"");
    assert!(parsed.is_err());
  }

  #[test]
  fn test_no_float_drift() {
    let a = Amount::parse("0.1").unwrap().value();
    let b = Amount::parse("0.2").unwrap().value();
    assert_eq!((a + b).to_string(), "0.3");
  }

  #[test]
  fn test_format_grouped() {
    assert_eq!(format_grouped(Decimal::from(1_250_000)), "1 250 000");
    assert_eq!(format_grouped(Decimal::from_str("-1500.5").unwrap()), "-1 500.5");
    assert_eq!(format_grouped(Decimal::from(999)), "999");
  }
}
