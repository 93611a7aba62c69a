//! Remote collection endpoints.
//!
//! Each entity type is served by a REST collection offering LIST, CREATE,
//! UPDATE, DELETE and a bulk DELETE. The traits here are the seam between
//! the cache layer and the transport; `client` and the per-collection
//! modules implement them over HTTP.

mod api_types;
pub mod catalog;
pub mod client;
mod error;
pub mod limits;
pub mod transactions;

pub use catalog::{AnalyticsApi, CategoriesApi, DebtsApi};
pub use client::HttpClient;
pub use error::ApiError;
pub use limits::LimitsApi;
pub use transactions::TransactionsApi;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cache::{Cacheable, Page, PageRequest, QueryFilter};

/// Read side of a remote collection.
#[async_trait]
pub trait ListEndpoint<T, F>: Send + Sync
where
  T: Cacheable,
  F: QueryFilter,
{
  async fn list(&self, filter: &F, page: PageRequest) -> Result<Page<T>, ApiError>;
}

/// Entities the client may write, with their payload shapes.
pub trait Mutable: Cacheable {
  type Create: Serialize + fmt::Debug + Send + Sync;
  type Update: Serialize + fmt::Debug + Send + Sync;
}

/// Write side of a remote collection.
#[async_trait]
pub trait MutateEndpoint<T: Mutable>: Send + Sync {
  async fn create(&self, payload: &T::Create) -> Result<T, ApiError>;

  async fn update(&self, id: &str, payload: &T::Update) -> Result<T, ApiError>;

  async fn delete(&self, id: &str) -> Result<(), ApiError>;

  /// Delete several entities in one logical operation.
  ///
  /// Collections without a bulk endpoint fall back to one DELETE per id;
  /// individual failures are collected into the report rather than
  /// aborting the rest.
  async fn delete_many(&self, ids: &[String]) -> Result<BulkDeleteReport, ApiError> {
    let mut report = BulkDeleteReport::default();
    for id in ids {
      match self.delete(id).await {
        Ok(()) => report.deleted_count += 1,
        Err(e) => report.failures.push(DeleteFailure {
          id: id.clone(),
          reason: e.to_string(),
        }),
      }
    }
    Ok(report)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFailure {
  pub id: String,
  pub reason: String,
}

/// Result of a bulk delete. Partial success is reported, not hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteReport {
  pub deleted_count: usize,
  #[serde(default)]
  pub failures: Vec<DeleteFailure>,
}

impl BulkDeleteReport {
  pub fn all(count: usize) -> Self {
    Self {
      deleted_count: count,
      failures: Vec::new(),
    }
  }

  pub fn is_complete(&self) -> bool {
    self.failures.is_empty()
  }

  pub fn is_partial(&self) -> bool {
    self.deleted_count > 0 && !self.failures.is_empty()
  }

  pub fn summary(&self) -> String {
    if self.failures.is_empty() {
      format!("Deleted {}", self.deleted_count)
    } else {
      format!(
        "Deleted {}, {} failed",
        self.deleted_count,
        self.failures.len()
      )
    }
  }
}

/// A completed mutation and the outcome of the refresh that followed it.
///
/// The mutation result is authoritative; a failed follow-up refresh only
/// means the cache is stale until the next load.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<R> {
  pub value: R,
  pub refresh_error: Option<ApiError>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Transaction;
  use std::sync::Mutex;

  /// Endpoint with no bulk support, failing for ids listed in `broken`.
  struct SingleDeleteOnly {
    broken: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
  }

  #[async_trait]
  impl MutateEndpoint<Transaction> for SingleDeleteOnly {
    async fn create(&self, _payload: &<Transaction as Mutable>::Create) -> Result<Transaction, ApiError> {
      Err(ApiError::Validation("unsupported".into()))
    }

    async fn update(
      &self,
      _id: &str,
      _payload: &<Transaction as Mutable>::Update,
    ) -> Result<Transaction, ApiError> {
      Err(ApiError::Validation("unsupported".into()))
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
      self.calls.lock().unwrap().push(id.to_string());
      if self.broken.contains(&id) {
        Err(ApiError::NotFound(id.to_string()))
      } else {
        Ok(())
      }
    }
  }

  #[tokio::test]
  async fn test_default_bulk_delete_reports_partial_failure() {
    let endpoint = SingleDeleteOnly {
      broken: vec!["b"],
      calls: Mutex::new(Vec::new()),
    };
    let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];

    let report = endpoint.delete_many(&ids).await.unwrap();

    assert_eq!(report.deleted_count, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, "b");
    assert!(report.is_partial());
    assert_eq!(*endpoint.calls.lock().unwrap(), ids);
    assert_eq!(report.summary(), "Deleted 2, 1 failed");
  }
}
