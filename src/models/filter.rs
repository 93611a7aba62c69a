//! Query filters for the remote collections.

use crate::cache::QueryFilter;

use super::period::Period;
use super::transaction::TransactionKind;

/// Filter for the transaction list. Paging is not part of the filter; the
/// cache tracks its own page window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
  pub period: Period,
  pub kind: Option<TransactionKind>,
  pub category_id: Option<String>,
  pub search: Option<String>,
}

impl TransactionFilter {
  pub fn for_period(period: Period) -> Self {
    Self {
      period,
      ..Self::default()
    }
  }

  pub fn with_kind(mut self, kind: TransactionKind) -> Self {
    self.kind = Some(kind);
    self
  }

  pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
    self.category_id = Some(category_id.into());
    self
  }

  pub fn with_search(mut self, search: impl Into<String>) -> Self {
    self.search = Some(search.into());
    self
  }
}

impl QueryFilter for TransactionFilter {
  fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = self.period.query_pairs();
    if let Some(kind) = self.kind {
      pairs.push(("type", kind.as_str().to_string()));
    }
    if let Some(category) = &self.category_id {
      pairs.push(("category_id", category.trim().to_string()));
    }
    if let Some(search) = &self.search {
      pairs.push(("search", normalize_search(search)));
    }
    pairs
  }
}

/// Filter for period-scoped collections: limits, balance, category chart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodFilter {
  pub period: Period,
}

impl PeriodFilter {
  pub fn new(period: Period) -> Self {
    Self { period }
  }
}

impl QueryFilter for PeriodFilter {
  fn query_pairs(&self) -> Vec<(&'static str, String)> {
    self.period.query_pairs()
  }
}

/// Collapse runs of whitespace so "coffee  shop " and "coffee shop" are
/// the same query.
fn normalize_search(search: &str) -> String {
  search.split_whitespace().collect::<Vec<_>>().join(" ")
}
