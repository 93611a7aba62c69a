//! Core traits and types for the caching system.

use serde::{de::DeserializeOwned, Serialize};

/// Trait for entities that can be cached.
///
/// Identifiers are always assigned by the server; the cache never invents
/// them.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Unique identifier for this entity (e.g., transaction id)
  fn cache_key(&self) -> &str;

  /// Entity type name for logging and storage organization
  fn entity_type() -> &'static str;
}

/// A window into a paginated collection. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page: u32,
  pub page_size: u32,
}

impl PageRequest {
  pub fn first(page_size: u32) -> Self {
    Self { page: 1, page_size }
  }

  pub fn nth(page: u32, page_size: u32) -> Self {
    Self {
      page: page.max(1),
      page_size,
    }
  }

  pub fn query_pairs(&self) -> [(&'static str, String); 2] {
    [
      ("page", self.page.to_string()),
      ("page_size", self.page_size.to_string()),
    ]
  }
}

/// One page of a remote listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  /// Server indicated more pages beyond this one
  pub has_more: bool,
}

impl<T> Page<T> {
  pub fn complete(items: Vec<T>) -> Self {
    Self {
      items,
      has_more: false,
    }
  }
}

/// Who asked for a load. Decides whether failures are returned or only
/// logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
  /// Explicit user action; failures are returned to the caller
  User,
  /// Scheduler tick; failures are logged and swallowed
  Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
  pub force: bool,
  pub origin: LoadOrigin,
}

impl LoadOptions {
  pub fn user() -> Self {
    Self {
      force: false,
      origin: LoadOrigin::User,
    }
  }

  pub fn forced(origin: LoadOrigin) -> Self {
    Self {
      force: true,
      origin,
    }
  }
}

/// What a load call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
  /// Contents already answered the request; nothing was fetched
  CacheHit,
  /// Contents were fetched and committed
  Fetched { items: usize },
  /// Another load held the cache; this call did nothing
  Busy,
  /// No further pages to append
  Exhausted,
  /// A background fetch failed; previous contents were kept
  Failed,
  /// Nothing has been applied yet, so there is no view to refresh
  Skipped,
  /// A newer request for the same cache took over while this one waited
  Superseded,
}

impl LoadOutcome {
  pub fn fetched(&self) -> bool {
    matches!(self, LoadOutcome::Fetched { .. })
  }
}
