//! Read-only aggregates computed by the server for a period.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cache::Cacheable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
  #[serde(default)]
  pub total_income: Decimal,
  #[serde(default)]
  pub total_expense: Decimal,
  #[serde(default)]
  pub balance: Decimal,
  #[serde(default)]
  pub currency: Option<String>,
}

impl Cacheable for BalanceSnapshot {
  fn cache_key(&self) -> &str {
    "balance"
  }

  fn entity_type() -> &'static str {
    "balance"
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtBalance {
  /// Money other people owe the user
  #[serde(default)]
  pub owed_to_me: Decimal,
  /// Money the user owes
  #[serde(default)]
  pub i_owe: Decimal,
  #[serde(default)]
  pub currency: Option<String>,
}

impl DebtBalance {
  pub fn net(&self) -> Decimal {
    self.owed_to_me - self.i_owe
  }
}

impl Cacheable for DebtBalance {
  fn cache_key(&self) -> &str {
    "debt_balance"
  }

  fn entity_type() -> &'static str {
    "debt_balance"
  }
}

/// One slice of the expense breakdown by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryChartEntry {
  #[serde(default)]
  pub category_id: Option<String>,
  #[serde(alias = "name")]
  pub category_name: String,
  #[serde(alias = "amount")]
  pub total: Decimal,
  #[serde(default)]
  pub percentage: Option<Decimal>,
  #[serde(default)]
  pub color: Option<String>,
}

impl Cacheable for CategoryChartEntry {
  fn cache_key(&self) -> &str {
    self.category_id.as_deref().unwrap_or(&self.category_name)
  }

  fn entity_type() -> &'static str {
    "category_chart"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_chart_entry_aliases() {
    let entry: CategoryChartEntry = serde_json::from_value(json!({
      "name": "Food",
      "amount": "1200.50"
    }))
    .unwrap();
    assert_eq!(entry.cache_key(), "Food");
    assert_eq!(entry.total.to_string(), "1200.50");
  }

  #[test]
  fn test_debt_net() {
    let debt: DebtBalance = serde_json::from_value(json!({
      "owed_to_me": "500",
      "i_owe": "800"
    }))
    .unwrap();
    assert_eq!(debt.net(), Decimal::from(-300));
  }
}
