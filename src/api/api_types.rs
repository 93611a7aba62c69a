//! Wire-level response shapes.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::Page;

/// Paginated list response: `{ total, items, page, page_size }`.
#[derive(Debug, Deserialize)]
pub struct ApiPaged<T> {
  pub total: u64,
  pub items: Vec<T>,
  pub page: u32,
  pub page_size: u32,
}

impl<T> ApiPaged<T> {
  pub fn into_page(self) -> Page<T> {
    let seen = u64::from(self.page) * u64::from(self.page_size);
    Page {
      has_more: seen < self.total,
      items: self.items,
    }
  }
}

/// Unpaginated list: either a bare array or wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiList<T> {
  Bare(Vec<T>),
  Items { items: Vec<T> },
  Categories { categories: Vec<T> },
}

impl<T> ApiList<T> {
  pub fn into_vec(self) -> Vec<T> {
    match self {
      ApiList::Bare(items) => items,
      ApiList::Items { items } => items,
      ApiList::Categories { categories } => categories,
    }
  }
}

/// Error body. FastAPI-style servers send `{"detail": ...}` where detail is
/// a string or a list of validation errors.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub detail: Value,
}

impl ApiErrorBody {
  pub fn message(&self) -> String {
    match &self.detail {
      Value::String(s) => s.clone(),
      Value::Array(errors) => errors
        .iter()
        .filter_map(|e| e.get("msg").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("; "),
      other => other.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_has_more_from_total() {
    let paged: ApiPaged<u32> = serde_json::from_value(json!({
      "total": 120, "items": [1, 2], "page": 2, "page_size": 50
    }))
    .unwrap();
    assert!(paged.into_page().has_more);

    let last: ApiPaged<u32> = serde_json::from_value(json!({
      "total": 100, "items": [1], "page": 2, "page_size": 50
    }))
    .unwrap();
    assert!(!last.into_page().has_more);
  }

  #[test]
  fn test_list_shapes() {
    let bare: ApiList<u32> = serde_json::from_value(json!([1, 2])).unwrap();
    assert_eq!(bare.into_vec(), vec![1, 2]);
    let wrapped: ApiList<u32> = serde_json::from_value(json!({ "items": [3] })).unwrap();
    assert_eq!(wrapped.into_vec(), vec![3]);
    let chart: ApiList<u32> = serde_json::from_value(json!({ "categories": [4] })).unwrap();
    assert_eq!(chart.into_vec(), vec![4]);
  }

  #[test]
  fn test_error_detail_message() {
    let body: ApiErrorBody = serde_json::from_value(json!({ "detail": "Invalid category" })).unwrap();
    assert_eq!(body.message(), "Invalid category");

    let body: ApiErrorBody = serde_json::from_value(json!({
      "detail": [{ "msg": "field required" }, { "msg": "value too large" }]
    }))
    .unwrap();
    assert_eq!(body.message(), "field required; value too large");
  }
}
