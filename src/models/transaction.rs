use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::{ApiError, Mutable};
use crate::cache::Cacheable;
use crate::edit::Editable;

use super::money::Amount;
use super::{wire, Category, Dated};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
  Income,
  Expense,
}

impl TransactionKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Income => "income",
      Self::Expense => "expense",
    }
  }
}

impl fmt::Display for TransactionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TransactionKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "income" => Ok(Self::Income),
      "expense" => Ok(Self::Expense),
      other => Err(format!("unknown transaction type {:?}", other)),
    }
  }
}

/// A recorded income or expense.
///
/// Created by the user or out-of-band by the chat assistant; both arrive
/// through the same endpoint and are indistinguishable here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: TransactionKind,
  pub amount: Amount,
  #[serde(default)]
  pub currency: String,
  #[serde(default)]
  pub category_id: Option<String>,
  #[serde(default)]
  pub category: Option<Category>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(deserialize_with = "wire::date")]
  pub transaction_date: NaiveDate,
  #[serde(deserialize_with = "wire::timestamp")]
  pub created_at: DateTime<Utc>,
  /// Set by the server when this write pushed a limit over a threshold
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub limit_warning: Option<String>,
}

impl Transaction {
  /// Amount with direction applied: expenses are negative.
  pub fn signed_amount(&self) -> Decimal {
    match self.kind {
      TransactionKind::Income => self.amount.value(),
      TransactionKind::Expense => -self.amount.value(),
    }
  }

  pub fn category_name(&self) -> Option<&str> {
    self.category.as_ref().map(|c| c.name.as_str())
  }
}

impl Cacheable for Transaction {
  fn cache_key(&self) -> &str {
    &self.id
  }

  fn entity_type() -> &'static str {
    "transaction"
  }
}

impl Dated for Transaction {
  fn date(&self) -> NaiveDate {
    self.transaction_date
  }

  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionCreate {
  #[serde(rename = "type")]
  pub kind: TransactionKind,
  pub amount: Amount,
  pub currency: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub transaction_date: NaiveDate,
}

/// Partial update. Omitted fields are left unchanged by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionUpdate {
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub kind: Option<TransactionKind>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub amount: Option<Amount>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub currency: Option<String>,
  /// `None` means "leave unchanged", never "clear"
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub transaction_date: Option<NaiveDate>,
}

impl Mutable for Transaction {
  type Create = TransactionCreate;
  type Update = TransactionUpdate;
}

/// Form-shaped transaction, as edited by a user.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionForm {
  pub kind: TransactionKind,
  pub amount: Decimal,
  pub currency: String,
  /// Empty means "no change"
  pub category_id: String,
  pub description: String,
  pub date: NaiveDate,
}

impl TransactionForm {
  /// Blank expense dated `today`.
  pub fn blank(today: NaiveDate, currency: &str) -> Self {
    Self {
      kind: TransactionKind::Expense,
      amount: Decimal::ZERO,
      currency: currency.to_string(),
      category_id: String::new(),
      description: String::new(),
      date: today,
    }
  }

  pub fn into_create(&self) -> Result<TransactionCreate, ApiError> {
    let amount = Amount::new(self.amount).map_err(|e| ApiError::Validation(e.to_string()))?;
    if amount.is_zero() {
      return Err(ApiError::Validation("amount must be positive".into()));
    }
    let currency = non_empty(&self.currency)
      .ok_or_else(|| ApiError::Validation("currency is required".into()))?;
    Ok(TransactionCreate {
      kind: self.kind,
      amount,
      currency,
      category_id: non_empty(&self.category_id),
      description: non_empty(&self.description),
      transaction_date: self.date,
    })
  }
}

impl Editable for Transaction {
  type Form = TransactionForm;

  fn to_form(&self) -> TransactionForm {
    TransactionForm {
      kind: self.kind,
      amount: self.amount.value(),
      currency: self.currency.clone(),
      category_id: self.category_id.clone().unwrap_or_default(),
      description: self.description.clone().unwrap_or_default(),
      date: self.transaction_date,
    }
  }

  fn build_update(form: &TransactionForm, _today: NaiveDate) -> Result<TransactionUpdate, ApiError> {
    let amount = Amount::new(form.amount).map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(TransactionUpdate {
      kind: Some(form.kind),
      amount: Some(amount),
      currency: non_empty(&form.currency),
      category_id: non_empty(&form.category_id),
      description: Some(form.description.trim().to_string()),
      transaction_date: Some(form.date),
    })
  }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    None
  } else {
    Some(trimmed.to_string())
  }
}
