//! Per-collection client cache.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, ListEndpoint};

use super::gate::{decide, CanonicalFilter, GateDecision, QueryFilter};
use super::storage::{NoopSnapshots, SnapshotStore};
use super::traits::{Cacheable, LoadOptions, LoadOrigin, LoadOutcome, Page, PageRequest};

struct CacheState<T, F> {
  items: Vec<T>,
  loaded: bool,
  busy: bool,
  /// Filter that produced `items`, with its canonical form
  applied: Option<(F, CanonicalFilter)>,
  has_more: bool,
  /// Pages currently merged into `items`
  window: u32,
  generation: u64,
  /// Contents came from a snapshot and have not been confirmed by a fetch
  stale: bool,
  /// Ticket of the most recent `load_latest` call
  latest: u64,
}

impl<T, F> Default for CacheState<T, F> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      loaded: false,
      busy: false,
      applied: None,
      has_more: false,
      window: 0,
      generation: 0,
      stale: false,
      latest: 0,
    }
  }
}

/// Last-fetched contents of one remote collection.
///
/// At most one fetch runs at a time: a `load` that finds the cache busy
/// returns [`LoadOutcome::Busy`] without touching the network. Loads with
/// an unchanged filter are served from memory unless forced. A failed
/// fetch keeps the previous contents.
///
/// The state lock is never held across an await point.
pub struct EntityCache<T: Cacheable, F: QueryFilter> {
  name: &'static str,
  endpoint: Arc<dyn ListEndpoint<T, F>>,
  page_size: u32,
  state: Mutex<CacheState<T, F>>,
  idle: Notify,
  revision: watch::Sender<u64>,
  snapshots: Arc<dyn SnapshotStore>,
}

/// Clears the busy flag on every exit path of a fetch.
struct BusyGuard<'a, T: Cacheable, F: QueryFilter> {
  cache: &'a EntityCache<T, F>,
}

impl<T: Cacheable, F: QueryFilter> Drop for BusyGuard<'_, T, F> {
  fn drop(&mut self) {
    self.cache.lock().busy = false;
    self.cache.idle.notify_waiters();
  }
}

impl<T: Cacheable, F: QueryFilter> EntityCache<T, F> {
  pub fn new(name: &'static str, endpoint: Arc<dyn ListEndpoint<T, F>>, page_size: u32) -> Self {
    let (revision, _) = watch::channel(0);
    Self {
      name,
      endpoint,
      page_size: page_size.max(1),
      state: Mutex::new(CacheState::default()),
      idle: Notify::new(),
      revision,
      snapshots: Arc::new(NoopSnapshots),
    }
  }

  pub fn with_snapshots(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
    self.snapshots = snapshots;
    self
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  fn lock(&self) -> MutexGuard<'_, CacheState<T, F>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn bump(&self) {
    self.revision.send_modify(|r| *r += 1);
  }

  /// Load `filter` into the cache.
  pub async fn load(&self, filter: F, options: LoadOptions) -> Result<LoadOutcome, ApiError> {
    let requested = filter.canonical();

    let (pages, _guard) = {
      let mut state = self.lock();
      if state.busy {
        debug!(collection = self.name, filter = %requested, "Load skipped, fetch in flight");
        return Ok(LoadOutcome::Busy);
      }

      let applied = state.applied.as_ref().map(|(_, key)| key);
      let same_filter = decide(applied, &requested) == GateDecision::Reuse;
      if !options.force && state.loaded && same_filter {
        debug!(collection = self.name, filter = %requested, "Cache hit");
        return Ok(LoadOutcome::CacheHit);
      }

      // A forced reload of the same view keeps every page the user has seen
      let pages = if same_filter && state.loaded {
        state.window.max(1)
      } else {
        1
      };
      state.busy = true;
      (pages, BusyGuard { cache: self })
    };

    match self.fetch_window(&filter, pages).await {
      Ok(page) => {
        let count = page.items.len();
        info!(collection = self.name, filter = %requested, items = count, pages, "Fetched");
        self.persist(&requested, &page.items);
        {
          let mut state = self.lock();
          state.items = page.items;
          state.has_more = page.has_more;
          state.window = pages;
          state.applied = Some((filter, requested));
          state.loaded = true;
          state.stale = false;
          state.generation += 1;
        }
        self.bump();
        Ok(LoadOutcome::Fetched { items: count })
      }
      Err(e) => self.fetch_failed(options.origin, &requested, e),
    }
  }

  /// Load `filter` for the user, waiting out a fetch already in flight.
  ///
  /// If several calls are waiting when the cache goes idle, only the most
  /// recent one fetches; the others return [`LoadOutcome::Superseded`].
  pub async fn load_latest(&self, filter: F) -> Result<LoadOutcome, ApiError> {
    let ticket = {
      let mut state = self.lock();
      state.latest += 1;
      state.latest
    };
    loop {
      if self.lock().latest != ticket {
        debug!(collection = self.name, filter = %filter.canonical(), "Load superseded by a newer request");
        return Ok(LoadOutcome::Superseded);
      }
      match self.load(filter.clone(), LoadOptions::user()).await? {
        LoadOutcome::Busy => self.wait_idle().await,
        outcome => return Ok(outcome),
      }
    }
  }

  /// Re-fetch the current view, bypassing the cache-hit check.
  ///
  /// A cache that never committed a fetch has no view to refresh.
  pub async fn refresh(&self, origin: LoadOrigin) -> Result<LoadOutcome, ApiError> {
    let Some(filter) = self.applied_filter() else {
      debug!(collection = self.name, "Nothing applied yet, refresh skipped");
      return Ok(LoadOutcome::Skipped);
    };
    self.load(filter, LoadOptions::forced(origin)).await
  }

  /// Like [`refresh`](Self::refresh), but waits out an in-flight fetch and
  /// then fetches again, so the result reflects everything committed
  /// before the call.
  pub async fn reload(&self, origin: LoadOrigin) -> Result<LoadOutcome, ApiError> {
    loop {
      match self.refresh(origin).await? {
        LoadOutcome::Busy => self.wait_idle().await,
        outcome => return Ok(outcome),
      }
    }
  }

  /// Append the next page of the current view.
  ///
  /// Items already present are updated in place; new ones are appended.
  /// The generation is unchanged since nothing was replaced.
  pub async fn load_more(&self, origin: LoadOrigin) -> Result<LoadOutcome, ApiError> {
    let (filter, requested, next, _guard) = {
      let mut state = self.lock();
      if state.busy {
        return Ok(LoadOutcome::Busy);
      }
      let Some((filter, requested)) = state.applied.clone() else {
        return Ok(LoadOutcome::Exhausted);
      };
      if !state.loaded || !state.has_more {
        return Ok(LoadOutcome::Exhausted);
      }
      let next = state.window + 1;
      state.busy = true;
      (filter, requested, next, BusyGuard { cache: self })
    };

    let request = PageRequest::nth(next, self.page_size);
    match self.endpoint.list(&filter, request).await {
      Ok(page) => {
        let count = page.items.len();
        info!(collection = self.name, filter = %requested, page = next, items = count, "Fetched next page");
        let snapshot = {
          let mut state = self.lock();
          upsert(&mut state.items, page.items);
          state.has_more = page.has_more;
          state.window = next;
          state.items.clone()
        };
        self.persist(&requested, &snapshot);
        self.bump();
        Ok(LoadOutcome::Fetched { items: count })
      }
      Err(e) => self.fetch_failed(origin, &requested, e),
    }
  }

  async fn fetch_window(&self, filter: &F, pages: u32) -> Result<Page<T>, ApiError> {
    let mut items = Vec::new();
    let mut has_more = false;
    for page in 1..=pages {
      let fetched = self
        .endpoint
        .list(filter, PageRequest::nth(page, self.page_size))
        .await?;
      upsert(&mut items, fetched.items);
      has_more = fetched.has_more;
      if !has_more {
        break;
      }
    }
    Ok(Page { items, has_more })
  }

  fn fetch_failed(
    &self,
    origin: LoadOrigin,
    requested: &CanonicalFilter,
    e: ApiError,
  ) -> Result<LoadOutcome, ApiError> {
    match origin {
      LoadOrigin::User => {
        error!(collection = self.name, filter = %requested, error = %e, "Fetch failed");
        Err(e)
      }
      LoadOrigin::Background => {
        warn!(collection = self.name, filter = %requested, error = %e, "Background fetch failed, keeping previous contents");
        Ok(LoadOutcome::Failed)
      }
    }
  }

  fn persist(&self, filter: &CanonicalFilter, items: &[T]) {
    let data = match serde_json::to_vec(items) {
      Ok(data) => data,
      Err(e) => {
        warn!(collection = self.name, error = %e, "Failed to serialize snapshot");
        return;
      }
    };
    if let Err(e) = self.snapshots.save(self.name, filter, &data, items.len()) {
      warn!(collection = self.name, error = %e, "Failed to store snapshot");
    }
  }

  /// Show the last stored snapshot for `filter` until the first fetch.
  ///
  /// The cache stays unloaded, so the next `load` still fetches. Returns
  /// whether a snapshot was applied.
  pub fn warm_start(&self, filter: &F) -> bool {
    let key = filter.canonical();
    let snapshot = match self.snapshots.load(self.name, &key) {
      Ok(Some(snapshot)) => snapshot,
      Ok(None) => return false,
      Err(e) => {
        warn!(collection = self.name, error = %e, "Failed to read snapshot");
        return false;
      }
    };
    let items: Vec<T> = match serde_json::from_slice(&snapshot.data) {
      Ok(items) => items,
      Err(e) => {
        warn!(collection = self.name, error = %e, "Discarding unreadable snapshot");
        return false;
      }
    };

    {
      let mut state = self.lock();
      if state.loaded || state.busy {
        return false;
      }
      debug!(
        collection = self.name,
        filter = %key,
        items = items.len(),
        cached_at = %snapshot.cached_at,
        "Warm start from snapshot"
      );
      state.items = items;
      state.stale = true;
      state.generation += 1;
    }
    self.bump();
    true
  }

  /// Wait until no fetch is in flight.
  pub async fn wait_idle(&self) {
    loop {
      let notified = self.idle.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();
      if !self.lock().busy {
        return;
      }
      notified.await;
    }
  }

  /// Revision counter, bumped on every content change.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.revision.subscribe()
  }

  pub fn items(&self) -> Vec<T> {
    self.lock().items.clone()
  }

  pub fn get(&self, id: &str) -> Option<T> {
    self
      .lock()
      .items
      .iter()
      .find(|item| item.cache_key() == id)
      .cloned()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.lock().items.iter().any(|item| item.cache_key() == id)
  }

  pub fn ids(&self) -> Vec<String> {
    self
      .lock()
      .items
      .iter()
      .map(|item| item.cache_key().to_string())
      .collect()
  }

  pub fn len(&self) -> usize {
    self.lock().items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().items.is_empty()
  }

  pub fn is_loaded(&self) -> bool {
    self.lock().loaded
  }

  pub fn is_busy(&self) -> bool {
    self.lock().busy
  }

  pub fn is_stale(&self) -> bool {
    self.lock().stale
  }

  pub fn has_more(&self) -> bool {
    self.lock().has_more
  }

  pub fn window(&self) -> u32 {
    self.lock().window
  }

  pub fn generation(&self) -> u64 {
    self.lock().generation
  }

  pub fn applied_filter(&self) -> Option<F> {
    self.lock().applied.as_ref().map(|(filter, _)| filter.clone())
  }

  pub fn applied_key(&self) -> Option<CanonicalFilter> {
    self.lock().applied.as_ref().map(|(_, key)| key.clone())
  }
}

/// Merge `incoming` into `items` by cache key, keeping first-seen order.
fn upsert<T: Cacheable>(items: &mut Vec<T>, incoming: Vec<T>) {
  for item in incoming {
    match items
      .iter_mut()
      .find(|existing| existing.cache_key() == item.cache_key())
    {
      Some(existing) => *existing = item,
      None => items.push(item),
    }
  }
}
