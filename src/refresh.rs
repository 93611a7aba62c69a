//! Periodic background refresh of every active cache.
//!
//! Each tick refreshes all registered caches concurrently. A failing or
//! panicking branch never stops the others, and nothing a tick produces
//! reaches the user: failures are logged by the cache and the tick's
//! report is only traced.

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::api::ApiError;
use crate::cache::{Cacheable, EntityCache, LoadOrigin, LoadOutcome, QueryFilter};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Something the scheduler can refresh.
#[async_trait]
pub trait Refresh: Send + Sync {
  fn name(&self) -> &'static str;

  fn is_loaded(&self) -> bool;

  async fn refresh(&self, origin: LoadOrigin) -> Result<LoadOutcome, ApiError>;

  /// Refresh, waiting out any fetch already in flight.
  async fn reload(&self, origin: LoadOrigin) -> Result<LoadOutcome, ApiError> {
    self.refresh(origin).await
  }
}

#[async_trait]
impl<T: Cacheable, F: QueryFilter> Refresh for EntityCache<T, F> {
  fn name(&self) -> &'static str {
    EntityCache::name(self)
  }

  fn is_loaded(&self) -> bool {
    EntityCache::is_loaded(self)
  }

  async fn refresh(&self, origin: LoadOrigin) -> Result<LoadOutcome, ApiError> {
    EntityCache::refresh(self, origin).await
  }

  async fn reload(&self, origin: LoadOrigin) -> Result<LoadOutcome, ApiError> {
    EntityCache::reload(self, origin).await
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
  /// Refresh on every tick
  Always,
  /// Refresh only once the cache has been loaded by someone else
  WhenLoaded,
}

#[derive(Clone)]
pub struct RefreshTarget {
  pub cache: Arc<dyn Refresh>,
  pub policy: RefreshPolicy,
}

impl RefreshTarget {
  pub fn always(cache: Arc<dyn Refresh>) -> Self {
    Self {
      cache,
      policy: RefreshPolicy::Always,
    }
  }

  pub fn when_loaded(cache: Arc<dyn Refresh>) -> Self {
    Self {
      cache,
      policy: RefreshPolicy::WhenLoaded,
    }
  }

  pub fn eligible(&self) -> bool {
    self.policy == RefreshPolicy::Always || self.cache.is_loaded()
  }
}

/// Reload every eligible target after a mutation, concurrently.
///
/// Each reload starts after any in-flight fetch of the same cache, so it
/// observes the mutation. Returns the first failure; the rest still run.
pub async fn reload_after_mutation(targets: &[RefreshTarget]) -> Option<ApiError> {
  let reloads = targets
    .iter()
    .filter(|target| target.eligible())
    .map(|target| target.cache.reload(LoadOrigin::User));

  join_all(reloads).await.into_iter().find_map(Result::err)
}

/// What one tick did, per branch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
  pub refreshed: Vec<&'static str>,
  /// Skipped by policy, because a fetch was already in flight, or because
  /// nothing has been loaded yet
  pub skipped: Vec<&'static str>,
  pub failed: Vec<&'static str>,
}

enum Branch {
  Refreshed,
  Skipped,
  Failed,
}

pub struct RefreshScheduler {
  targets: Vec<RefreshTarget>,
  interval: Duration,
}

impl RefreshScheduler {
  pub fn new(interval: Duration) -> Self {
    Self {
      targets: Vec::new(),
      interval,
    }
  }

  pub fn register(mut self, cache: Arc<dyn Refresh>, policy: RefreshPolicy) -> Self {
    self.targets.push(RefreshTarget { cache, policy });
    self
  }

  pub fn targets(&self) -> &[RefreshTarget] {
    &self.targets
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Refresh every eligible target once, concurrently, and wait for all
  /// of them to settle.
  pub async fn tick(&self) -> TickReport {
    let branches = self.targets.iter().map(|target| async move {
      let name = target.cache.name();
      if !target.eligible() {
        return (name, Branch::Skipped);
      }

      let refresh = AssertUnwindSafe(target.cache.refresh(LoadOrigin::Background));
      let branch = match refresh.catch_unwind().await {
        Ok(Ok(LoadOutcome::Busy | LoadOutcome::Skipped)) => Branch::Skipped,
        Ok(Ok(LoadOutcome::Failed)) | Ok(Err(_)) => Branch::Failed,
        Ok(Ok(_)) => Branch::Refreshed,
        Err(_) => {
          error!(collection = name, "Refresh panicked");
          Branch::Failed
        }
      };
      (name, branch)
    });

    let mut report = TickReport::default();
    for (name, branch) in join_all(branches).await {
      match branch {
        Branch::Refreshed => report.refreshed.push(name),
        Branch::Skipped => report.skipped.push(name),
        Branch::Failed => report.failed.push(name),
      }
    }
    report
  }

  /// Run ticks on a background task until the handle is stopped or dropped.
  ///
  /// The first tick fires one full interval after start.
  pub fn start(self) -> RefreshHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let period = self.interval;

    let task = tokio::spawn(async move {
      let mut ticker = interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

      info!(
        interval_secs = period.as_secs(),
        targets = self.targets.len(),
        "Refresh scheduler started"
      );

      loop {
        tokio::select! {
          changed = shutdown_rx.changed() => {
            if changed.is_err() || *shutdown_rx.borrow() {
              break;
            }
          }

          _ = ticker.tick() => {
            let report = self.tick().await;
            debug!(
              refreshed = ?report.refreshed,
              skipped = ?report.skipped,
              failed = ?report.failed,
              "Refresh tick"
            );
          }
        }
      }

      info!("Refresh scheduler stopped");
    });

    RefreshHandle {
      shutdown: shutdown_tx,
      task: Some(task),
    }
  }
}

/// Owns a running scheduler. Dropping it stops the scheduler.
pub struct RefreshHandle {
  shutdown: watch::Sender<bool>,
  task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
  /// Stop the scheduler and wait for an in-progress tick to settle.
  pub async fn stop(mut self) {
    let _ = self.shutdown.send(true);
    if let Some(task) = self.task.take() {
      let _ = task.await;
    }
  }

  pub fn is_running(&self) -> bool {
    self.task.as_ref().is_some_and(|task| !task.is_finished())
  }
}

impl Drop for RefreshHandle {
  fn drop(&mut self) {
    let _ = self.shutdown.send(true);
    if let Some(task) = self.task.take() {
      task.abort();
    }
  }
}
