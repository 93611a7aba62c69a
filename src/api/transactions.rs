use async_trait::async_trait;
use reqwest::Method;
use tracing::info;

use crate::cache::{Page, PageRequest, QueryFilter};
use crate::models::{Transaction, TransactionCreate, TransactionFilter, TransactionUpdate};

use super::api_types::ApiPaged;
use super::client::HttpClient;
use super::{ApiError, BulkDeleteReport, ListEndpoint, MutateEndpoint};

/// `/transactions` collection.
#[derive(Clone)]
pub struct TransactionsApi {
  client: HttpClient,
}

impl TransactionsApi {
  pub fn new(client: HttpClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ListEndpoint<Transaction, TransactionFilter> for TransactionsApi {
  async fn list(
    &self,
    filter: &TransactionFilter,
    page: PageRequest,
  ) -> Result<Page<Transaction>, ApiError> {
    let mut query = filter.canonical().pairs();
    query.extend(page.query_pairs());

    let response: ApiPaged<Transaction> = self.client.get("/transactions", &query).await?;
    Ok(response.into_page())
  }
}

#[async_trait]
impl MutateEndpoint<Transaction> for TransactionsApi {
  async fn create(&self, payload: &TransactionCreate) -> Result<Transaction, ApiError> {
    self
      .client
      .send(Method::POST, "/transactions", payload)
      .await
  }

  async fn update(&self, id: &str, payload: &TransactionUpdate) -> Result<Transaction, ApiError> {
    let path = format!("/transactions/{}", id);
    self.client.send(Method::PATCH, &path, payload).await
  }

  async fn delete(&self, id: &str) -> Result<(), ApiError> {
    let path = format!("/transactions/{}", id);
    self.client.delete(&path).await
  }

  /// One request to `DELETE /transactions/bulk`. An empty 204 means every
  /// id was handled; a body with counts is honoured when the server sends
  /// one.
  async fn delete_many(&self, ids: &[String]) -> Result<BulkDeleteReport, ApiError> {
    let body = self
      .client
      .delete_with_body("/transactions/bulk", ids)
      .await?;

    let report = match body {
      Some(value) => serde_json::from_value(value)?,
      None => BulkDeleteReport::all(ids.len()),
    };
    info!(
      requested = ids.len(),
      deleted = report.deleted_count,
      failed = report.failures.len(),
      "Bulk delete finished"
    );
    Ok(report)
  }
}
