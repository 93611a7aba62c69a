//! Text buffers for editing typed forms in the terminal.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use midas::models::{Amount, LimitForm, TransactionForm, TransactionKind};

/// Forms that can be shown as a list of labelled text fields.
pub trait FormFields {
  const LABELS: &'static [&'static str];

  fn values(&self) -> Vec<String>;

  /// Parse edited text back into the form. On error the form is untouched.
  fn apply(&mut self, values: &[String]) -> Result<(), String>;
}

fn field<'a>(values: &'a [String], index: usize) -> &'a str {
  values.get(index).map(|v| v.trim()).unwrap_or_default()
}

fn parse_amount(raw: &str) -> Result<Decimal, String> {
  Amount::parse(raw)
    .map(|a| a.value())
    .map_err(|e| e.to_string())
}

impl FormFields for TransactionForm {
  const LABELS: &'static [&'static str] =
    &["Type", "Amount", "Currency", "Category", "Description", "Date"];

  fn values(&self) -> Vec<String> {
    vec![
      self.kind.to_string(),
      self.amount.to_string(),
      self.currency.clone(),
      self.category_id.clone(),
      self.description.clone(),
      self.date.to_string(),
    ]
  }

  fn apply(&mut self, values: &[String]) -> Result<(), String> {
    let kind = TransactionKind::from_str(field(values, 0))?;
    let amount = parse_amount(field(values, 1))?;
    let date = NaiveDate::parse_from_str(field(values, 5), "%Y-%m-%d")
      .map_err(|_| format!("invalid date {:?}, expected YYYY-MM-DD", field(values, 5)))?;

    self.kind = kind;
    self.amount = amount;
    self.currency = field(values, 2).to_string();
    self.category_id = field(values, 3).to_string();
    self.description = field(values, 4).to_string();
    self.date = date;
    Ok(())
  }
}

impl FormFields for LimitForm {
  const LABELS: &'static [&'static str] = &["Category", "Amount"];

  fn values(&self) -> Vec<String> {
    vec![self.category_id.clone(), self.amount.to_string()]
  }

  fn apply(&mut self, values: &[String]) -> Result<(), String> {
    let amount = parse_amount(field(values, 1))?;
    self.category_id = field(values, 0).to_string();
    self.amount = amount;
    Ok(())
  }
}

/// Editable text for each field of a form, with one focused field.
#[derive(Debug, Clone)]
pub struct FormBuffer {
  pub title: String,
  pub labels: &'static [&'static str],
  pub values: Vec<String>,
  pub focus: usize,
  pub error: Option<String>,
}

impl FormBuffer {
  pub fn new<F: FormFields>(title: impl Into<String>, form: &F) -> Self {
    Self {
      title: title.into(),
      labels: F::LABELS,
      values: form.values(),
      focus: 0,
      error: None,
    }
  }

  pub fn next(&mut self) {
    self.focus = (self.focus + 1) % self.values.len().max(1);
  }

  pub fn prev(&mut self) {
    let len = self.values.len().max(1);
    self.focus = (self.focus + len - 1) % len;
  }

  pub fn push(&mut self, c: char) {
    if let Some(value) = self.values.get_mut(self.focus) {
      value.push(c);
    }
    self.error = None;
  }

  pub fn pop(&mut self) {
    if let Some(value) = self.values.get_mut(self.focus) {
      value.pop();
    }
    self.error = None;
  }

  /// Copy the edited text into `form`, remembering the parse error if any.
  pub fn apply_to<F: FormFields>(&mut self, form: &mut F) -> bool {
    match form.apply(&self.values) {
      Ok(()) => true,
      Err(e) => {
        self.error = Some(e);
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn form() -> TransactionForm {
    TransactionForm::blank(NaiveDate::from_ymd_opt(2024, 6, 17).unwrap(), "UZS")
  }

  #[test]
  fn test_edit_amount_field() {
    let mut form = form();
    let mut buffer = FormBuffer::new("New", &form);
    buffer.next();
    buffer.pop();
    for c in "12 500".chars() {
      buffer.push(c);
    }

    assert!(buffer.apply_to(&mut form));
    assert_eq!(form.amount, Decimal::from(12500));
    assert_eq!(form.kind, TransactionKind::Expense);
  }

  #[test]
  fn test_bad_date_leaves_form_untouched() {
    let mut form = form();
    let mut buffer = FormBuffer::new("New", &form);
    buffer.values[4] = "changed".into();
    buffer.values[5] = "17/06/2024".into();

    assert!(!buffer.apply_to(&mut form));
    assert!(buffer.error.is_some());
    assert_eq!(form.description, "");
  }

  #[test]
  fn test_focus_wraps() {
    let mut buffer = FormBuffer::new(
      "Limit",
      &LimitForm {
        category_id: "food".into(),
        amount: Decimal::from(10),
      },
    );
    buffer.prev();
    assert_eq!(buffer.focus, 1);
    buffer.next();
    assert_eq!(buffer.focus, 0);
  }
}
