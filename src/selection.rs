//! Multi-select over the visible collection and bulk delete.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, BulkDeleteReport, Committed, Mutable, MutateEndpoint};
use crate::cache::{CanonicalFilter, EntityCache, QueryFilter};
use crate::refresh::{reload_after_mutation, RefreshTarget};

/// Selected ids and the view they were selected in.
#[derive(Debug, Default)]
pub struct SelectionSet {
  active: bool,
  ids: BTreeSet<String>,
  /// Canonical filter of the cache contents when selection started
  scope: Option<CanonicalFilter>,
}

impl SelectionSet {
  fn enter(&mut self, scope: Option<CanonicalFilter>) {
    self.active = true;
    self.ids.clear();
    self.scope = scope;
  }

  fn exit(&mut self) {
    self.active = false;
    self.ids.clear();
    self.scope = None;
  }
}

/// Leaves selection mode when dropped, however the enclosing call ends.
struct ExitOnDrop<'a>(&'a mut SelectionSet);

impl Drop for ExitOnDrop<'_> {
  fn drop(&mut self) {
    self.0.exit();
  }
}

/// Selection mode over one cached collection.
///
/// Every read goes through the cache, so the selection seen from outside
/// is always a subset of the ids the cache holds, and a change of filter
/// empties it. [`sync`](Self::sync) also prunes the stored set.
pub struct SelectionController<T: Mutable, F: QueryFilter> {
  set: SelectionSet,
  cache: Arc<EntityCache<T, F>>,
  endpoint: Arc<dyn MutateEndpoint<T>>,
  targets: Vec<RefreshTarget>,
}

impl<T: Mutable, F: QueryFilter> SelectionController<T, F> {
  pub fn new(cache: Arc<EntityCache<T, F>>, endpoint: Arc<dyn MutateEndpoint<T>>) -> Self {
    let targets = vec![RefreshTarget::always(cache.clone())];
    Self {
      set: SelectionSet::default(),
      cache,
      endpoint,
      targets,
    }
  }

  /// Caches to refresh alongside the collection after a bulk delete.
  pub fn with_dependents(mut self, dependents: impl IntoIterator<Item = RefreshTarget>) -> Self {
    self.targets.extend(dependents);
    self
  }

  pub fn is_active(&self) -> bool {
    self.set.active
  }

  /// Selection mode is on and the cache still shows the view it started in.
  fn in_scope(&self) -> bool {
    self.set.active && self.cache.applied_key() == self.set.scope
  }

  pub fn len(&self) -> usize {
    self.selected_ids().len()
  }

  pub fn is_empty(&self) -> bool {
    self.selected_ids().is_empty()
  }

  pub fn is_selected(&self, id: &str) -> bool {
    self.in_scope() && self.set.ids.contains(id) && self.cache.contains(id)
  }

  /// Selected ids still present in the current view.
  pub fn selected_ids(&self) -> Vec<String> {
    if !self.in_scope() {
      return Vec::new();
    }
    let present: BTreeSet<String> = self.cache.ids().into_iter().collect();
    self
      .set
      .ids
      .iter()
      .filter(|id| present.contains(*id))
      .cloned()
      .collect()
  }

  /// Enter selection mode with nothing selected.
  pub fn enter(&mut self) {
    if !self.set.active {
      self.set.enter(self.cache.applied_key());
      debug!(collection = self.cache.name(), "Selection mode entered");
    }
  }

  /// Leave selection mode. The selection is always cleared.
  pub fn exit(&mut self) {
    self.set.exit();
  }

  /// Select an id currently shown. Ignored outside selection mode and for
  /// ids not in the cache.
  pub fn select(&mut self, id: &str) -> bool {
    self.sync();
    if !self.set.active || !self.cache.contains(id) {
      return false;
    }
    self.set.ids.insert(id.to_string());
    true
  }

  pub fn deselect(&mut self, id: &str) -> bool {
    self.set.active && self.set.ids.remove(id)
  }

  /// Flip an id; returns whether it is selected afterwards.
  pub fn toggle(&mut self, id: &str) -> bool {
    self.sync();
    if self.set.ids.contains(id) {
      self.deselect(id);
      false
    } else {
      self.select(id)
    }
  }

  /// Select everything the cache currently holds.
  pub fn select_all_visible(&mut self) -> usize {
    if !self.set.active {
      return 0;
    }
    self.sync();
    self.set.ids.extend(self.cache.ids());
    self.set.ids.len()
  }

  /// Reconcile with the cache after it changed.
  ///
  /// A different applied filter means the selection belonged to another
  /// view and is dropped. Otherwise ids that are no longer cached are
  /// removed.
  pub fn sync(&mut self) {
    if !self.set.active {
      return;
    }
    let current = self.cache.applied_key();
    if current != self.set.scope {
      debug!(collection = self.cache.name(), "View changed, clearing selection");
      self.set.ids.clear();
      self.set.scope = current;
      return;
    }
    let present: BTreeSet<String> = self.cache.ids().into_iter().collect();
    self.set.ids.retain(|id| present.contains(id));
  }

  /// Delete `ids` as one logical operation, then reload the collection.
  ///
  /// Selection mode is left whatever happens, including when the returned
  /// future is dropped early. The reload runs whether or not the delete
  /// succeeded, so rows the server did delete never linger. Partial
  /// failures are reported in the returned [`BulkDeleteReport`].
  pub async fn bulk_delete(
    &mut self,
    ids: Vec<String>,
  ) -> Result<Committed<BulkDeleteReport>, ApiError> {
    let _exit = ExitOnDrop(&mut self.set);
    if ids.is_empty() {
      return Ok(Committed {
        value: BulkDeleteReport::default(),
        refresh_error: None,
      });
    }

    let result = self.endpoint.delete_many(&ids).await;
    let refresh_error = reload_after_mutation(&self.targets).await;

    match result {
      Ok(report) => {
        if report.is_complete() {
          info!(collection = self.cache.name(), deleted = report.deleted_count, "Bulk delete");
        } else {
          warn!(
            collection = self.cache.name(),
            deleted = report.deleted_count,
            failed = report.failures.len(),
            "Bulk delete partially failed"
          );
        }
        Ok(Committed {
          value: report,
          refresh_error,
        })
      }
      Err(e) => {
        error!(collection = self.cache.name(), requested = ids.len(), error = %e, "Bulk delete failed");
        Err(e)
      }
    }
  }

  pub async fn delete_selected(&mut self) -> Result<Committed<BulkDeleteReport>, ApiError> {
    self.sync();
    let ids = self.selected_ids();
    self.bulk_delete(ids).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{LoadOptions, LoadOrigin};
  use crate::models::{Period, Transaction, TransactionFilter, YearMonth};
  use crate::testing::{date, expense, FakeEndpoint};
  use proptest::prelude::*;

  type TxCache = EntityCache<Transaction, TransactionFilter>;

  fn month(m: u32) -> TransactionFilter {
    TransactionFilter::for_period(Period::Month(YearMonth::new(2024, m).unwrap()))
  }

  async fn fixture() -> (
    Arc<FakeEndpoint<Transaction>>,
    Arc<TxCache>,
    SelectionController<Transaction, TransactionFilter>,
  ) {
    let fake = Arc::new(FakeEndpoint::new(vec![
      expense("t1", 100, date(2024, 5, 3)),
      expense("t2", 200, date(2024, 5, 4)),
      expense("t3", 300, date(2024, 5, 9)),
      expense("t4", 400, date(2024, 6, 1)),
    ]));
    let cache: Arc<TxCache> = Arc::new(EntityCache::new("transaction", fake.clone(), 50));
    cache.load(month(5), LoadOptions::user()).await.unwrap();
    let selection = SelectionController::new(cache.clone(), fake.clone());
    (fake, cache, selection)
  }

  #[tokio::test]
  async fn test_bulk_delete_exits_and_refreshes() {
    let (fake, cache, mut selection) = fixture().await;
    selection.enter();
    assert!(selection.select("t1"));
    assert!(selection.select("t2"));

    let committed = selection
      .bulk_delete(vec!["t1".into(), "t2".into()])
      .await
      .unwrap();

    assert_eq!(committed.value, BulkDeleteReport::all(2));
    assert!(!selection.is_active());
    assert!(selection.is_empty());
    assert_eq!(cache.ids(), vec!["t3"]);
    assert_eq!(fake.list_calls(), 2);
  }

  #[tokio::test]
  async fn test_partial_failure_is_reported() {
    let (fake, cache, mut selection) = fixture().await;
    fake.break_id("t2");
    selection.enter();
    selection.select_all_visible();

    let committed = selection.delete_selected().await.unwrap();

    assert!(committed.value.is_partial());
    assert_eq!(committed.value.deleted_count, 2);
    assert_eq!(committed.value.failures[0].id, "t2");
    assert!(!selection.is_active());
    assert_eq!(cache.ids(), vec!["t2"]);
  }

  #[tokio::test]
  async fn test_failed_delete_still_refreshes_and_exits() {
    let (fake, _cache, mut selection) = fixture().await;
    selection.enter();
    selection.select("t1");
    fake.set_failing(true);

    let committed = selection.delete_selected().await.unwrap();

    assert_eq!(committed.value.deleted_count, 0);
    assert_eq!(committed.value.failures.len(), 1);
    assert!(committed.refresh_error.is_some());
    assert!(!selection.is_active());
    assert_eq!(fake.list_calls(), 2);
  }

  #[tokio::test]
  async fn test_empty_delete_makes_no_calls() {
    let (fake, _cache, mut selection) = fixture().await;
    selection.enter();

    let committed = selection.delete_selected().await.unwrap();

    assert_eq!(committed.value.deleted_count, 0);
    assert_eq!(fake.mutate_calls(), 0);
    assert_eq!(fake.list_calls(), 1);
    assert!(!selection.is_active());
  }

  #[tokio::test]
  async fn test_view_change_without_sync_deletes_nothing() {
    let (fake, cache, mut selection) = fixture().await;
    selection.enter();
    selection.select("t1");

    cache.load(month(6), LoadOptions::user()).await.unwrap();
    assert!(selection.selected_ids().is_empty());
    assert!(!selection.is_selected("t1"));
    assert_eq!(selection.len(), 0);

    let committed = selection.delete_selected().await.unwrap();

    assert_eq!(committed.value.deleted_count, 0);
    assert_eq!(fake.mutate_calls(), 0);
    assert!(fake.ids().contains(&"t1".to_string()));
    assert!(!selection.is_active());
  }

  #[tokio::test]
  async fn test_dropped_bulk_delete_still_exits() {
    let (fake, _cache, mut selection) = fixture().await;
    selection.enter();
    selection.select("t1");
    fake.hold();

    {
      let delete = selection.delete_selected();
      tokio::pin!(delete);
      tokio::select! {
        _ = &mut delete => panic!("delete finished while its reload was held"),
        _ = fake.wait_for_calls(2) => {}
      }
    }

    assert!(!selection.is_active());
    assert!(selection.is_empty());
    assert!(!fake.ids().contains(&"t1".to_string()));
    fake.release();
  }

  #[tokio::test]
  async fn test_only_visible_ids_selectable() {
    let (_fake, _cache, mut selection) = fixture().await;
    assert!(!selection.select("t1"));

    selection.enter();
    assert!(!selection.select("t4"));
    assert!(!selection.select("missing"));
    assert!(selection.toggle("t3"));
    assert!(!selection.toggle("t3"));
    assert_eq!(selection.select_all_visible(), 3);

    selection.exit();
    assert!(selection.is_empty());
  }

  #[tokio::test]
  async fn test_filter_change_drops_selection() {
    let (_fake, cache, mut selection) = fixture().await;
    selection.enter();
    selection.select("t1");

    cache.load(month(6), LoadOptions::user()).await.unwrap();
    selection.sync();

    assert!(selection.is_active());
    assert!(selection.is_empty());
    assert!(selection.select("t4"));
  }

  #[tokio::test]
  async fn test_sync_drops_vanished_ids() {
    let (fake, cache, mut selection) = fixture().await;
    selection.enter();
    selection.select("t1");
    selection.select("t3");

    fake.rows.lock().unwrap().retain(|t| t.id != "t1");
    cache.refresh(LoadOrigin::Background).await.unwrap();
    selection.sync();

    assert_eq!(selection.selected_ids(), vec!["t3"]);
  }

  #[derive(Debug, Clone)]
  enum Op {
    Select(usize),
    Deselect(usize),
    Toggle(usize),
    SelectAll,
    SwitchMonth(u32),
    ServerDelete(usize),
  }

  fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
      (0usize..5).prop_map(Op::Select),
      (0usize..5).prop_map(Op::Deselect),
      (0usize..5).prop_map(Op::Toggle),
      Just(Op::SelectAll),
      (5u32..7).prop_map(Op::SwitchMonth),
      (0usize..5).prop_map(Op::ServerDelete),
    ]
  }

  proptest! {
    #[test]
    fn prop_selection_subset_of_cache(ops in prop::collection::vec(arb_op(), 1..25)) {
      let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
      rt.block_on(async {
        let (fake, cache, mut selection) = fixture().await;
        selection.enter();
        let id = |i: usize| format!("t{}", i);
        for op in ops {
          match op {
            Op::Select(i) => { selection.select(&id(i)); }
            Op::Deselect(i) => { selection.deselect(&id(i)); }
            Op::Toggle(i) => { selection.toggle(&id(i)); }
            Op::SelectAll => { selection.select_all_visible(); }
            Op::SwitchMonth(m) => {
              cache.load(month(m), LoadOptions::user()).await.unwrap();
            }
            Op::ServerDelete(i) => {
              fake.rows.lock().unwrap().retain(|t| t.id != id(i));
              cache.refresh(LoadOrigin::User).await.unwrap();
            }
          }
          let present = cache.ids();
          for selected in selection.selected_ids() {
            assert!(present.contains(&selected), "{} selected but not cached", selected);
          }
        }
      });
    }
  }
}
