//! Filter equality gate.
//!
//! Several views share one cache, so "has this cache loaded?" is not enough
//! to decide whether a request can be served locally. The gate compares the
//! canonical form of the filter that produced the current contents with the
//! canonical form of the requested filter.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// A filter over a remote collection.
///
/// `query_pairs` must omit absent and default-valued fields, so that two
/// filters that would send the same request produce the same pairs.
pub trait QueryFilter: Clone + Default + fmt::Debug + Send + Sync + 'static {
  fn query_pairs(&self) -> Vec<(&'static str, String)>;

  fn canonical(&self) -> CanonicalFilter {
    CanonicalFilter::from_pairs(self.query_pairs())
  }
}

/// Collections that take no filter at all.
impl QueryFilter for () {
  fn query_pairs(&self) -> Vec<(&'static str, String)> {
    Vec::new()
  }
}

/// Order-independent canonical form of a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CanonicalFilter(BTreeMap<&'static str, String>);

impl CanonicalFilter {
  pub fn from_pairs<I>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (&'static str, String)>,
  {
    Self(
      pairs
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect(),
    )
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Query pairs sorted by key, ready for a request URL.
  pub fn pairs(&self) -> Vec<(&'static str, String)> {
    self.0.iter().map(|(k, v)| (*k, v.clone())).collect()
  }

  /// Stable, fixed-length key for persisting results of this query.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.to_string().as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for CanonicalFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (key, value) in &self.0 {
      if !first {
        f.write_str("&")?;
      }
      write!(f, "{}={}", key, value)?;
      first = false;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
  /// Current contents answer the request.
  Reuse,
  /// The request needs a fetch.
  Refetch,
}

/// Decide whether contents produced by `applied` can answer `requested`.
pub fn decide(applied: Option<&CanonicalFilter>, requested: &CanonicalFilter) -> GateDecision {
  match applied {
    Some(applied) if applied == requested => GateDecision::Reuse,
    _ => GateDecision::Refetch,
  }
}

/// Convenience over [`decide`] for typed filters.
pub fn decide_filters<F: QueryFilter>(applied: Option<&F>, requested: &F) -> GateDecision {
  let applied = applied.map(QueryFilter::canonical);
  decide(applied.as_ref(), &requested.canonical())
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn test_order_independent() {
    let a = CanonicalFilter::from_pairs([("type", "expense".into()), ("start_date", "2024-05-01".into())]);
    let b = CanonicalFilter::from_pairs([("start_date", "2024-05-01".into()), ("type", "expense".into())]);
    assert_eq!(decide(Some(&a), &b), GateDecision::Reuse);
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_empty_values_are_absent() {
    let a = CanonicalFilter::from_pairs([("search", String::new())]);
    assert!(a.is_empty());
    assert_eq!(decide(Some(&a), &CanonicalFilter::default()), GateDecision::Reuse);
  }

  #[test]
  fn test_nothing_applied_refetches() {
    assert_eq!(
      decide(None, &CanonicalFilter::default()),
      GateDecision::Refetch
    );
  }

  #[test]
  fn test_different_values_refetch() {
    let may = CanonicalFilter::from_pairs([("start_date", "2024-05-01".into())]);
    let june = CanonicalFilter::from_pairs([("start_date", "2024-06-01".into())]);
    assert_eq!(decide(Some(&may), &june), GateDecision::Refetch);
  }

  #[test]
  fn test_display_is_query_string() {
    let f = CanonicalFilter::from_pairs([("type", "income".into()), ("page", "1".into())]);
    assert_eq!(f.to_string(), "page=1&type=income");
  }

  fn arb_pairs() -> impl Strategy<Value = Vec<(&'static str, String)>> {
    let key = prop::sample::select(vec!["type", "category_id", "search", "start_date", "end_date"]);
    prop::collection::vec((key, "[a-z0-9]{0,4}"), 0..6)
  }

  proptest! {
    #[test]
    fn prop_shuffled_pairs_reuse(pairs in arb_pairs()) {
      // Keep the last value per key so both orderings agree on the map.
      let mut deduped: Vec<(&'static str, String)> = Vec::new();
      for (k, v) in pairs {
        deduped.retain(|(existing, _)| *existing != k);
        deduped.push((k, v));
      }
      let forward = CanonicalFilter::from_pairs(deduped.clone());
      let reversed = CanonicalFilter::from_pairs(deduped.into_iter().rev());
      prop_assert_eq!(decide(Some(&forward), &reversed), GateDecision::Reuse);
    }

    #[test]
    fn prop_equal_iff_same_map(a in arb_pairs(), b in arb_pairs()) {
      let fa = CanonicalFilter::from_pairs(a);
      let fb = CanonicalFilter::from_pairs(b);
      let expected = if fa == fb { GateDecision::Reuse } else { GateDecision::Refetch };
      prop_assert_eq!(decide(Some(&fa), &fb), expected);
    }
  }
}
