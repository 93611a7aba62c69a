//! Composition root for the cache layer.
//!
//! Owns one cache per collection and hands them to the controllers it
//! builds. Nothing here is global: the front end holds a `Store` and asks
//! it for controllers.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::api::{
  AnalyticsApi, ApiError, CategoriesApi, Committed, DebtsApi, HttpClient, LimitsApi, ListEndpoint,
  MutateEndpoint, TransactionsApi,
};
use crate::cache::{EntityCache, LoadOptions, LoadOutcome, SnapshotStore};
use crate::clock::Clock;
use crate::edit::EditSessionController;
use crate::feed::PagedFeed;
use crate::models::{
  BalanceSnapshot, Category, CategoryChartEntry, DebtBalance, Limit, LimitForm, LimitUsage, Period,
  PeriodFilter, Transaction, TransactionCreate, TransactionFilter,
};
use crate::refresh::{reload_after_mutation, RefreshPolicy, RefreshScheduler, RefreshTarget};
use crate::selection::SelectionController;

/// The remote side of every collection.
pub struct Endpoints {
  pub transactions: Arc<dyn ListEndpoint<Transaction, TransactionFilter>>,
  pub transaction_writes: Arc<dyn MutateEndpoint<Transaction>>,
  pub categories: Arc<dyn ListEndpoint<Category, ()>>,
  pub limits: Arc<dyn ListEndpoint<Limit, PeriodFilter>>,
  pub limit_writes: Arc<dyn MutateEndpoint<Limit>>,
  pub balance: Arc<dyn ListEndpoint<BalanceSnapshot, PeriodFilter>>,
  pub debt_balance: Arc<dyn ListEndpoint<DebtBalance, ()>>,
  pub category_chart: Arc<dyn ListEndpoint<CategoryChartEntry, PeriodFilter>>,
}

impl Endpoints {
  pub fn http(client: HttpClient) -> Self {
    let transactions = Arc::new(TransactionsApi::new(client.clone()));
    let limits = Arc::new(LimitsApi::new(client.clone()));
    let analytics = Arc::new(AnalyticsApi::new(client.clone()));

    Self {
      transactions: transactions.clone(),
      transaction_writes: transactions,
      categories: Arc::new(CategoriesApi::new(client.clone())),
      limits: limits.clone(),
      limit_writes: limits,
      balance: analytics.clone(),
      debt_balance: Arc::new(DebtsApi::new(client)),
      category_chart: analytics,
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  pub page_size: u32,
  pub refresh_interval: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      page_size: 50,
      refresh_interval: crate::refresh::DEFAULT_INTERVAL,
    }
  }
}

pub struct Store {
  pub transactions: Arc<EntityCache<Transaction, TransactionFilter>>,
  pub categories: Arc<EntityCache<Category, ()>>,
  pub limits: Arc<EntityCache<Limit, PeriodFilter>>,
  pub balance: Arc<EntityCache<BalanceSnapshot, PeriodFilter>>,
  pub debt_balance: Arc<EntityCache<DebtBalance, ()>>,
  pub category_chart: Arc<EntityCache<CategoryChartEntry, PeriodFilter>>,
  transaction_writes: Arc<dyn MutateEndpoint<Transaction>>,
  limit_writes: Arc<dyn MutateEndpoint<Limit>>,
  clock: Arc<dyn Clock>,
  options: StoreOptions,
}

impl Store {
  pub fn new(
    endpoints: Endpoints,
    options: StoreOptions,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
  ) -> Self {
    let page_size = options.page_size;
    Self {
      transactions: Arc::new(
        EntityCache::new("transactions", endpoints.transactions, page_size)
          .with_snapshots(snapshots.clone()),
      ),
      categories: Arc::new(
        EntityCache::new("categories", endpoints.categories, page_size)
          .with_snapshots(snapshots.clone()),
      ),
      limits: Arc::new(
        EntityCache::new("limits", endpoints.limits, page_size).with_snapshots(snapshots.clone()),
      ),
      balance: Arc::new(
        EntityCache::new("balance", endpoints.balance, page_size)
          .with_snapshots(snapshots.clone()),
      ),
      debt_balance: Arc::new(
        EntityCache::new("debt_balance", endpoints.debt_balance, page_size)
          .with_snapshots(snapshots.clone()),
      ),
      category_chart: Arc::new(
        EntityCache::new("category_chart", endpoints.category_chart, page_size)
          .with_snapshots(snapshots),
      ),
      transaction_writes: endpoints.transaction_writes,
      limit_writes: endpoints.limit_writes,
      clock,
      options,
    }
  }

  pub fn clock(&self) -> &dyn Clock {
    self.clock.as_ref()
  }

  /// Scheduler over every cache. The chart is only refreshed once
  /// something has loaded it.
  pub fn scheduler(&self) -> RefreshScheduler {
    RefreshScheduler::new(self.options.refresh_interval)
      .register(self.transactions.clone(), RefreshPolicy::Always)
      .register(self.categories.clone(), RefreshPolicy::Always)
      .register(self.limits.clone(), RefreshPolicy::Always)
      .register(self.balance.clone(), RefreshPolicy::Always)
      .register(self.debt_balance.clone(), RefreshPolicy::Always)
      .register(self.category_chart.clone(), RefreshPolicy::WhenLoaded)
  }

  /// Caches a transaction write can change.
  fn transaction_targets(&self) -> Vec<RefreshTarget> {
    vec![
      RefreshTarget::always(self.transactions.clone()),
      RefreshTarget::always(self.balance.clone()),
      RefreshTarget::when_loaded(self.category_chart.clone()),
    ]
  }

  fn limit_targets(&self) -> Vec<RefreshTarget> {
    vec![
      RefreshTarget::always(self.limits.clone()),
      RefreshTarget::when_loaded(self.category_chart.clone()),
    ]
  }

  pub fn transaction_selection(&self) -> SelectionController<Transaction, TransactionFilter> {
    SelectionController::new(self.transactions.clone(), self.transaction_writes.clone())
      .with_dependents(self.transaction_targets().into_iter().skip(1))
  }

  pub fn transaction_editor(&self) -> EditSessionController<Transaction, TransactionFilter> {
    EditSessionController::new(
      self.transactions.clone(),
      self.transaction_writes.clone(),
      self.clock.clone(),
    )
    .with_dependents(self.transaction_targets().into_iter().skip(1))
  }

  pub fn limit_editor(&self) -> EditSessionController<Limit, PeriodFilter> {
    EditSessionController::new(self.limits.clone(), self.limit_writes.clone(), self.clock.clone())
      .with_dependents(self.limit_targets().into_iter().skip(1))
  }

  pub fn transaction_feed(&self) -> PagedFeed<Transaction, TransactionFilter> {
    PagedFeed::new(self.transactions.clone())
  }

  /// Point the period-scoped views at `filter`: transactions, balance and
  /// limits load concurrently; the chart follows only if it is in use.
  /// A fetch already in flight is waited out, so the views always end up
  /// on the newest requested period.
  pub async fn show(&self, filter: TransactionFilter) -> Result<LoadOutcome, ApiError> {
    let scoped = PeriodFilter::new(filter.period);
    let (transactions, balance, limits) = futures::join!(
      self.transactions.load_latest(filter),
      self.balance.load_latest(scoped.clone()),
      self.limits.load_latest(scoped.clone()),
    );
    if self.category_chart.is_loaded() {
      self.category_chart.load_latest(scoped).await?;
    }
    balance?;
    limits?;
    transactions
  }

  /// Limits together with the expense breakdown they are measured against.
  pub async fn show_limit_usage(&self, period: Period) -> Result<(), ApiError> {
    let scoped = PeriodFilter::new(period);
    let (limits, chart) = futures::join!(
      self.limits.load_latest(scoped.clone()),
      self.category_chart.load_latest(scoped),
    );
    limits?;
    chart?;
    Ok(())
  }

  /// Collections that do not depend on the period.
  pub async fn load_globals(&self) -> Result<(), ApiError> {
    let (categories, debts) = futures::join!(
      self.categories.load((), LoadOptions::user()),
      self.debt_balance.load((), LoadOptions::user()),
    );
    categories?;
    debts?;
    Ok(())
  }

  /// Refresh every eligible cache now, on the user's behalf.
  pub async fn refresh_now(&self) -> Option<ApiError> {
    reload_after_mutation(self.scheduler().targets()).await
  }

  /// Show the last stored snapshots for `filter` while the first fetches
  /// are in flight.
  pub fn warm_start(&self, filter: &TransactionFilter) {
    let scoped = PeriodFilter::new(filter.period);
    self.transactions.warm_start(filter);
    self.balance.warm_start(&scoped);
    self.limits.warm_start(&scoped);
    self.categories.warm_start(&());
    self.debt_balance.warm_start(&());
  }

  pub async fn create_transaction(
    &self,
    payload: TransactionCreate,
  ) -> Result<Committed<Transaction>, ApiError> {
    let created = self
      .transaction_writes
      .create(&payload)
      .await
      .map_err(|e| {
        error!(error = %e, "Create transaction failed");
        e
      })?;
    info!(id = %created.id, "Transaction created");

    let refresh_error = reload_after_mutation(&self.transaction_targets()).await;
    Ok(Committed {
      value: created,
      refresh_error,
    })
  }

  pub async fn delete_transaction(&self, id: &str) -> Result<Committed<()>, ApiError> {
    self.transaction_writes.delete(id).await.map_err(|e| {
      error!(id, error = %e, "Delete transaction failed");
      e
    })?;
    info!(id, "Transaction deleted");

    let refresh_error = reload_after_mutation(&self.transaction_targets()).await;
    Ok(Committed {
      value: (),
      refresh_error,
    })
  }

  /// Create a limit for the current calendar month.
  pub async fn create_limit(&self, form: &LimitForm) -> Result<Committed<Limit>, ApiError> {
    let payload = form.into_create(self.clock.today())?;
    let created = self.limit_writes.create(&payload).await.map_err(|e| {
      error!(error = %e, "Create limit failed");
      e
    })?;
    info!(id = %created.id, "Limit created");

    let refresh_error = reload_after_mutation(&self.limit_targets()).await;
    Ok(Committed {
      value: created,
      refresh_error,
    })
  }

  pub async fn delete_limit(&self, id: &str) -> Result<Committed<()>, ApiError> {
    self.limit_writes.delete(id).await.map_err(|e| {
      error!(id, error = %e, "Delete limit failed");
      e
    })?;
    info!(id, "Limit deleted");

    let refresh_error = reload_after_mutation(&self.limit_targets()).await;
    Ok(Committed {
      value: (),
      refresh_error,
    })
  }

  /// Cached limits joined with the cached expense breakdown.
  pub fn limit_usage(&self) -> Vec<LimitUsage> {
    let chart = self.category_chart.items();
    self
      .limits
      .items()
      .iter()
      .map(|limit| LimitUsage::compute(limit, &chart))
      .collect()
  }
}
