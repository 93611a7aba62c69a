//! Spending limits ("budgets") per category.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, Mutable};
use crate::cache::Cacheable;
use crate::edit::Editable;

use super::aggregate::CategoryChartEntry;
use super::money::Amount;
use super::period::{Period, YearMonth};
use super::transaction::non_empty;
use super::{wire, Category};

/// Usage percentages at which the server raises a limit warning.
pub const THRESHOLDS: [u32; 4] = [50, 75, 90, 100];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limit {
  pub id: String,
  /// `None` is a global limit over all expenses
  #[serde(default)]
  pub category_id: Option<String>,
  #[serde(default)]
  pub category: Option<Category>,
  pub amount: Amount,
  #[serde(deserialize_with = "wire::date")]
  pub period_start: NaiveDate,
  #[serde(deserialize_with = "wire::date")]
  pub period_end: NaiveDate,
  #[serde(deserialize_with = "wire::timestamp")]
  pub created_at: DateTime<Utc>,
}

impl Limit {
  pub fn period(&self) -> Option<Period> {
    Period::range(self.period_start, self.period_end).ok()
  }

  pub fn label(&self) -> String {
    match (&self.category, &self.category_id) {
      (Some(category), _) => category.label(),
      (None, Some(id)) => id.clone(),
      (None, None) => "All expenses".to_string(),
    }
  }
}

impl Cacheable for Limit {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "limit"
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitCreate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<String>,
  pub amount: Amount,
  pub period_start: NaiveDate,
  pub period_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitUpdate {
  /// `None` means "leave unchanged"
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<String>,
  pub amount: Amount,
  pub period_start: NaiveDate,
  pub period_end: NaiveDate,
}

impl Mutable for Limit {
  type Create = LimitCreate;
  type Update = LimitUpdate;
}

/// Form-shaped limit. The period is never user-chosen: it is always the
/// calendar month containing the submit date.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitForm {
  pub category_id: String,
  pub amount: Decimal,
}

impl LimitForm {
  pub fn into_create(&self, today: NaiveDate) -> Result<LimitCreate, ApiError> {
    let month = YearMonth::containing(today);
    Ok(LimitCreate {
      category_id: non_empty(&self.category_id),
      amount: positive_ceiling(self.amount)?,
      period_start: month.first_day(),
      period_end: month.last_day(),
    })
  }
}

impl Editable for Limit {
  type Form = LimitForm;

  fn to_form(&self) -> LimitForm {
    LimitForm {
      category_id: self.category_id.clone().unwrap_or_default(),
      amount: self.amount.value(),
    }
  }

  fn build_update(form: &LimitForm, today: NaiveDate) -> Result<LimitUpdate, ApiError> {
    let month = YearMonth::containing(today);
    Ok(LimitUpdate {
      category_id: non_empty(&form.category_id),
      amount: positive_ceiling(form.amount)?,
      period_start: month.first_day(),
      period_end: month.last_day(),
    })
  }
}

fn positive_ceiling(value: Decimal) -> Result<Amount, ApiError> {
  let amount = Amount::new(value).map_err(|e| ApiError::Validation(e.to_string()))?;
  if amount.is_zero() {
    return Err(ApiError::Validation("limit amount must be positive".into()));
  }
  Ok(amount)
}

/// Highest threshold crossed when spending moves from `before` to `after`.
pub fn crossed_threshold(ceiling: Decimal, before: Decimal, after: Decimal) -> Option<u32> {
  if ceiling <= Decimal::ZERO {
    return None;
  }
  let percent_before = before * Decimal::ONE_HUNDRED / ceiling;
  let percent_after = after * Decimal::ONE_HUNDRED / ceiling;
  THRESHOLDS
    .iter()
    .copied()
    .filter(|t| {
      let t = Decimal::from(*t);
      percent_before < t && percent_after >= t
    })
    .max()
}

/// A limit joined with what has been spent against it.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitUsage {
  pub limit: Limit,
  pub spent: Decimal,
  pub remaining: Decimal,
  /// Percent of the ceiling used, one decimal place
  pub percent: Option<Decimal>,
}

impl LimitUsage {
  /// Spent is read from the expense breakdown for the limit's period:
  /// the matching category's total, or every category for a global limit.
  pub fn compute(limit: &Limit, chart: &[CategoryChartEntry]) -> Self {
    let spent: Decimal = chart
      .iter()
      .filter(|entry| match &limit.category_id {
        Some(id) => entry.category_id.as_deref() == Some(id.as_str()),
        None => true,
      })
      .map(|entry| entry.total)
      .sum();

    let ceiling = limit.amount.value();
    let percent = if ceiling > Decimal::ZERO {
      Some((spent * Decimal::ONE_HUNDRED / ceiling).round_dp(1))
    } else {
      None
    };

    Self {
      limit: limit.clone(),
      spent,
      remaining: ceiling - spent,
      percent,
    }
  }

  pub fn exceeded(&self) -> bool {
    self.remaining < Decimal::ZERO
  }

  /// Highest threshold reached so far.
  pub fn level(&self) -> Option<u32> {
    crossed_threshold(self.limit.amount.value(), Decimal::ZERO, self.spent)
  }
}
