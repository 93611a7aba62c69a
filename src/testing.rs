//! In-memory collections for tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::api::{ApiError, ListEndpoint, MutateEndpoint};
use crate::cache::{Cacheable, Page, PageRequest};
use crate::models::{
  Amount, BalanceSnapshot, CategoryChartEntry, Limit, LimitCreate, LimitUpdate, PeriodFilter,
  Transaction, TransactionCreate, TransactionFilter, TransactionKind, TransactionUpdate,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn stamp(day: NaiveDate, seq: u32) -> DateTime<Utc> {
  Utc
    .from_utc_datetime(&day.and_hms_opt(9, 0, 0).unwrap())
    .checked_add_signed(chrono::Duration::minutes(i64::from(seq)))
    .unwrap()
}

pub fn tx(id: &str, kind: TransactionKind, amount: i64, day: NaiveDate) -> Transaction {
  Transaction {
    id: id.to_string(),
    kind,
    amount: Amount::new(Decimal::from(amount)).unwrap(),
    currency: "UZS".into(),
    category_id: None,
    category: None,
    description: Some(format!("{} row", id)),
    transaction_date: day,
    created_at: stamp(day, 0),
    limit_warning: None,
  }
}

pub fn expense(id: &str, amount: i64, day: NaiveDate) -> Transaction {
  tx(id, TransactionKind::Expense, amount, day)
}

pub fn limit(id: &str, category: Option<&str>, amount: i64, month: (i32, u32)) -> Limit {
  let month = crate::models::YearMonth::new(month.0, month.1).unwrap();
  Limit {
    id: id.to_string(),
    category_id: category.map(String::from),
    category: None,
    amount: Amount::new(Decimal::from(amount)).unwrap(),
    period_start: month.first_day(),
    period_end: month.last_day(),
    created_at: stamp(month.first_day(), 0),
  }
}

/// A remote collection held in memory.
///
/// Counts list calls, can hold a list call in flight until released, and
/// can be switched into failing mode.
pub struct FakeEndpoint<T> {
  pub rows: Mutex<Vec<T>>,
  list_calls: AtomicUsize,
  mutate_calls: AtomicUsize,
  holding: AtomicBool,
  failing: AtomicBool,
  started: Notify,
  release: Notify,
  broken: Mutex<HashSet<String>>,
  next_id: AtomicUsize,
}

impl<T: Cacheable> FakeEndpoint<T> {
  pub fn new(rows: Vec<T>) -> Self {
    Self {
      rows: Mutex::new(rows),
      list_calls: AtomicUsize::new(0),
      mutate_calls: AtomicUsize::new(0),
      holding: AtomicBool::new(false),
      failing: AtomicBool::new(false),
      started: Notify::new(),
      release: Notify::new(),
      broken: Mutex::new(HashSet::new()),
      next_id: AtomicUsize::new(100),
    }
  }

  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub fn mutate_calls(&self) -> usize {
    self.mutate_calls.load(Ordering::SeqCst)
  }

  /// Make the next list calls wait for `release`.
  pub fn hold(&self) {
    self.holding.store(true, Ordering::SeqCst);
  }

  /// Let one held list call finish and stop holding new ones.
  pub fn release(&self) {
    self.holding.store(false, Ordering::SeqCst);
    self.release.notify_one();
  }

  /// Resolves once at least `n` list calls have started.
  pub async fn wait_for_calls(&self, n: usize) {
    loop {
      let started = self.started.notified();
      if self.list_calls() >= n {
        return;
      }
      started.await;
    }
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  /// Deletes of this id fail with a server error.
  pub fn break_id(&self, id: &str) {
    self.broken.lock().unwrap().insert(id.to_string());
  }

  pub fn ids(&self) -> Vec<String> {
    self
      .rows
      .lock()
      .unwrap()
      .iter()
      .map(|r| r.cache_key().to_string())
      .collect()
  }

  pub fn push(&self, row: T) {
    self.rows.lock().unwrap().push(row);
  }

  fn fresh_id(&self, prefix: &str) -> String {
    format!("{}{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
  }

  fn check_failing(&self) -> Result<(), ApiError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(ApiError::Network("connection refused".into()));
    }
    Ok(())
  }

  async fn serve<K, C>(&self, keep: K, order: Option<C>, page: PageRequest) -> Result<Page<T>, ApiError>
  where
    K: Fn(&T) -> bool + Send,
    C: Fn(&T, &T) -> std::cmp::Ordering + Send,
  {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    self.started.notify_waiters();
    if self.holding.load(Ordering::SeqCst) {
      self.release.notified().await;
    }
    self.check_failing()?;

    let mut rows: Vec<T> = self.rows.lock().unwrap().iter().filter(|r| keep(*r)).cloned().collect();
    if let Some(order) = order {
      rows.sort_by(order);
    }

    let size = page.page_size.max(1) as usize;
    let start = (page.page as usize - 1) * size;
    let has_more = start + size < rows.len();
    let items = rows.into_iter().skip(start).take(size).collect();
    Ok(Page { items, has_more })
  }

  fn delete_row(&self, id: &str) -> Result<(), ApiError> {
    self.mutate_calls.fetch_add(1, Ordering::SeqCst);
    self.check_failing()?;
    if self.broken.lock().unwrap().contains(id) {
      return Err(ApiError::Status {
        status: 500,
        message: format!("cannot delete {}", id),
      });
    }
    let mut rows = self.rows.lock().unwrap();
    let before = rows.len();
    rows.retain(|r| r.cache_key() != id);
    if rows.len() == before {
      return Err(ApiError::NotFound(id.to_string()));
    }
    Ok(())
  }
}

fn newest_first(a: &Transaction, b: &Transaction) -> std::cmp::Ordering {
  b.transaction_date
    .cmp(&a.transaction_date)
    .then(b.created_at.cmp(&a.created_at))
}

#[async_trait]
impl ListEndpoint<Transaction, TransactionFilter> for FakeEndpoint<Transaction> {
  async fn list(
    &self,
    filter: &TransactionFilter,
    page: PageRequest,
  ) -> Result<Page<Transaction>, ApiError> {
    let filter = filter.clone();
    let keep = move |t: &Transaction| {
      filter.period.contains(t.transaction_date)
        && filter.kind.map_or(true, |k| k == t.kind)
        && filter
          .category_id
          .as_deref()
          .map_or(true, |c| t.category_id.as_deref() == Some(c))
        && filter.search.as_deref().map_or(true, |s| {
          t.description
            .as_deref()
            .unwrap_or_default()
            .contains(s.trim())
        })
    };
    self.serve(keep, Some(newest_first), page).await
  }
}

#[async_trait]
impl MutateEndpoint<Transaction> for FakeEndpoint<Transaction> {
  async fn create(&self, payload: &TransactionCreate) -> Result<Transaction, ApiError> {
    self.mutate_calls.fetch_add(1, Ordering::SeqCst);
    self.check_failing()?;
    let id = self.fresh_id("t");
    let mut row = tx(
      &id,
      payload.kind,
      0,
      payload.transaction_date,
    );
    row.amount = payload.amount;
    row.currency = payload.currency.clone();
    row.category_id = payload.category_id.clone();
    row.description = payload.description.clone();
    row.created_at = stamp(payload.transaction_date, self.next_id.load(Ordering::SeqCst) as u32);
    self.push(row.clone());
    Ok(row)
  }

  async fn update(&self, id: &str, payload: &TransactionUpdate) -> Result<Transaction, ApiError> {
    self.mutate_calls.fetch_add(1, Ordering::SeqCst);
    self.check_failing()?;
    let mut rows = self.rows.lock().unwrap();
    let row = rows
      .iter_mut()
      .find(|r| r.id == id)
      .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    if let Some(kind) = payload.kind {
      row.kind = kind;
    }
    if let Some(amount) = payload.amount {
      row.amount = amount;
    }
    if let Some(category) = &payload.category_id {
      row.category_id = Some(category.clone());
    }
    if let Some(description) = &payload.description {
      row.description = Some(description.clone());
    }
    if let Some(day) = payload.transaction_date {
      row.transaction_date = day;
    }
    Ok(row.clone())
  }

  async fn delete(&self, id: &str) -> Result<(), ApiError> {
    self.delete_row(id)
  }
}

#[async_trait]
impl ListEndpoint<Limit, PeriodFilter> for FakeEndpoint<Limit> {
  async fn list(&self, filter: &PeriodFilter, page: PageRequest) -> Result<Page<Limit>, ApiError> {
    let period = filter.period;
    let keep = move |l: &Limit| period.contains(l.period_start);
    let page = PageRequest::first(page.page_size.max(1000));
    self.serve(keep, None::<fn(&Limit, &Limit) -> std::cmp::Ordering>, page).await
  }
}

#[async_trait]
impl MutateEndpoint<Limit> for FakeEndpoint<Limit> {
  async fn create(&self, payload: &LimitCreate) -> Result<Limit, ApiError> {
    self.mutate_calls.fetch_add(1, Ordering::SeqCst);
    self.check_failing()?;
    let row = Limit {
      id: self.fresh_id("l"),
      category_id: payload.category_id.clone(),
      category: None,
      amount: payload.amount,
      period_start: payload.period_start,
      period_end: payload.period_end,
      created_at: stamp(payload.period_start, 0),
    };
    self.push(row.clone());
    Ok(row)
  }

  async fn update(&self, id: &str, payload: &LimitUpdate) -> Result<Limit, ApiError> {
    self.mutate_calls.fetch_add(1, Ordering::SeqCst);
    self.check_failing()?;
    let mut rows = self.rows.lock().unwrap();
    let row = rows
      .iter_mut()
      .find(|r| r.id == id)
      .ok_or_else(|| ApiError::NotFound(id.to_string()))?;
    if let Some(category) = &payload.category_id {
      row.category_id = Some(category.clone());
    }
    row.amount = payload.amount;
    row.period_start = payload.period_start;
    row.period_end = payload.period_end;
    Ok(row.clone())
  }

  async fn delete(&self, id: &str) -> Result<(), ApiError> {
    self.delete_row(id)
  }
}

/// Aggregates are served as stored, whatever the period.
#[async_trait]
impl ListEndpoint<BalanceSnapshot, PeriodFilter> for FakeEndpoint<BalanceSnapshot> {
  async fn list(
    &self,
    _filter: &PeriodFilter,
    _page: PageRequest,
  ) -> Result<Page<BalanceSnapshot>, ApiError> {
    let page = PageRequest::first(1000);
    self
      .serve(|_| true, None::<fn(&BalanceSnapshot, &BalanceSnapshot) -> std::cmp::Ordering>, page)
      .await
  }
}

#[async_trait]
impl ListEndpoint<CategoryChartEntry, PeriodFilter> for FakeEndpoint<CategoryChartEntry> {
  async fn list(
    &self,
    _filter: &PeriodFilter,
    _page: PageRequest,
  ) -> Result<Page<CategoryChartEntry>, ApiError> {
    let page = PageRequest::first(1000);
    self
      .serve(
        |_| true,
        None::<fn(&CategoryChartEntry, &CategoryChartEntry) -> std::cmp::Ordering>,
        page,
      )
      .await
  }
}

#[async_trait]
impl<T: Cacheable> ListEndpoint<T, ()> for FakeEndpoint<T> {
  async fn list(&self, _filter: &(), _page: PageRequest) -> Result<Page<T>, ApiError> {
    let page = PageRequest::first(1000);
    self.serve(|_| true, None::<fn(&T, &T) -> std::cmp::Ordering>, page).await
  }
}

pub fn balance(income: i64, expense: i64) -> BalanceSnapshot {
  BalanceSnapshot {
    total_income: Decimal::from(income),
    total_expense: Decimal::from(expense),
    balance: Decimal::from(income - expense),
    currency: Some("UZS".into()),
  }
}

pub fn chart_entry(category: &str, total: i64) -> CategoryChartEntry {
  CategoryChartEntry {
    category_id: Some(category.to_string()),
    category_name: category.to_string(),
    total: Decimal::from(total),
    percentage: None,
    color: None,
  }
}
