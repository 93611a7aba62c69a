//! Date-grouped, incrementally paged view over a cached collection.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::ApiError;
use crate::cache::{Cacheable, EntityCache, LoadOrigin, LoadOutcome, QueryFilter};
use crate::models::Dated;

#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup<T> {
  pub date: NaiveDate,
  pub items: Vec<T>,
}

/// Group by calendar date, most recent date first. Within a day, newest
/// records come first.
pub fn group_by_date<T: Dated + Clone>(items: &[T]) -> Vec<DateGroup<T>> {
  let mut by_date: BTreeMap<NaiveDate, Vec<T>> = BTreeMap::new();
  for item in items {
    by_date.entry(item.date()).or_default().push(item.clone());
  }

  by_date
    .into_iter()
    .rev()
    .map(|(date, mut items)| {
      items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
      DateGroup { date, items }
    })
    .collect()
}

/// Read-side projection of a paginated cache. The page cursor lives in
/// the cache, so the feed itself holds nothing else.
pub struct PagedFeed<T: Cacheable + Dated, F: QueryFilter> {
  cache: Arc<EntityCache<T, F>>,
}

impl<T: Cacheable + Dated, F: QueryFilter> PagedFeed<T, F> {
  pub fn new(cache: Arc<EntityCache<T, F>>) -> Self {
    Self { cache }
  }

  pub fn groups(&self) -> Vec<DateGroup<T>> {
    group_by_date(&self.cache.items())
  }

  pub fn has_more(&self) -> bool {
    self.cache.has_more()
  }

  /// Pages loaded so far.
  pub fn pages(&self) -> u32 {
    self.cache.window()
  }

  /// Fetch the next page and merge it into the cache.
  pub async fn load_more(&self) -> Result<LoadOutcome, ApiError> {
    self.cache.load_more(LoadOrigin::User).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::LoadOptions;
  use crate::models::{Period, Transaction, TransactionFilter, TransactionKind};
  use crate::testing::{date, expense, tx, FakeEndpoint};

  fn may() -> TransactionFilter {
    TransactionFilter::for_period(Period::Month("2024-05".parse().unwrap()))
  }

  #[tokio::test]
  async fn test_groups_by_distinct_dates_most_recent_first() {
    let fake = Arc::new(FakeEndpoint::new(vec![
      expense("t1", 100, date(2024, 5, 3)),
      tx("t2", TransactionKind::Income, 900, date(2024, 5, 17)),
      expense("t3", 300, date(2024, 5, 3)),
      expense("t4", 300, date(2024, 4, 30)),
    ]));
    let cache: Arc<EntityCache<Transaction, TransactionFilter>> =
      Arc::new(EntityCache::new("transaction", fake, 50));
    cache.load(may(), LoadOptions::user()).await.unwrap();

    let groups = PagedFeed::new(cache).groups();

    let dates: Vec<_> = groups.iter().map(|g| g.date).collect();
    assert_eq!(dates, vec![date(2024, 5, 17), date(2024, 5, 3)]);
    assert_eq!(groups[1].items.len(), 2);
  }

  #[test]
  fn test_newest_first_within_a_day() {
    let mut early = expense("a", 1, date(2024, 5, 3));
    let mut late = expense("b", 1, date(2024, 5, 3));
    early.created_at = early.created_at - chrono::Duration::hours(2);
    late.created_at = late.created_at + chrono::Duration::hours(2);

    let groups = group_by_date(&[early, late]);

    let ids: Vec<_> = groups[0].items.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
  }

  #[test]
  fn test_empty_input() {
    assert!(group_by_date::<Transaction>(&[]).is_empty());
  }

  #[tokio::test]
  async fn test_load_more_grows_groups() {
    let rows = (1..=5)
      .map(|d| expense(&format!("t{}", d), 10, date(2024, 5, d)))
      .collect();
    let fake = Arc::new(FakeEndpoint::new(rows));
    let cache: Arc<EntityCache<Transaction, TransactionFilter>> =
      Arc::new(EntityCache::new("transaction", fake, 2));
    cache.load(may(), LoadOptions::user()).await.unwrap();
    let feed = PagedFeed::new(cache);

    assert_eq!(feed.groups().len(), 2);
    assert!(feed.has_more());

    feed.load_more().await.unwrap();
    feed.load_more().await.unwrap();

    assert_eq!(feed.groups().len(), 5);
    assert_eq!(feed.pages(), 3);
    assert!(!feed.has_more());
    assert_eq!(feed.load_more().await.unwrap(), LoadOutcome::Exhausted);
  }
}
