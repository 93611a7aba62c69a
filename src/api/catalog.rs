//! Read-only collections: categories and server-side aggregates.

use async_trait::async_trait;

use crate::cache::{Page, PageRequest, QueryFilter};
use crate::models::{BalanceSnapshot, Category, CategoryChartEntry, DebtBalance, PeriodFilter};

use super::api_types::ApiList;
use super::client::HttpClient;
use super::{ApiError, ListEndpoint};

#[derive(Clone)]
pub struct CategoriesApi {
  client: HttpClient,
}

impl CategoriesApi {
  pub fn new(client: HttpClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ListEndpoint<Category, ()> for CategoriesApi {
  async fn list(&self, _filter: &(), _page: PageRequest) -> Result<Page<Category>, ApiError> {
    let response: ApiList<Category> = self.client.get("/categories", &[]).await?;
    Ok(Page::complete(response.into_vec()))
  }
}

/// `/analytics/*`. One client serves both the balance and the expense
/// breakdown; each is a separate collection from the cache's point of view.
#[derive(Clone)]
pub struct AnalyticsApi {
  client: HttpClient,
}

impl AnalyticsApi {
  pub fn new(client: HttpClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ListEndpoint<BalanceSnapshot, PeriodFilter> for AnalyticsApi {
  async fn list(
    &self,
    filter: &PeriodFilter,
    _page: PageRequest,
  ) -> Result<Page<BalanceSnapshot>, ApiError> {
    let query = filter.canonical().pairs();
    let balance: BalanceSnapshot = self.client.get("/analytics/balance", &query).await?;
    Ok(Page::complete(vec![balance]))
  }
}

#[async_trait]
impl ListEndpoint<CategoryChartEntry, PeriodFilter> for AnalyticsApi {
  async fn list(
    &self,
    filter: &PeriodFilter,
    _page: PageRequest,
  ) -> Result<Page<CategoryChartEntry>, ApiError> {
    let mut query = filter.canonical().pairs();
    query.push(("transaction_type", "expense".to_string()));
    let response: ApiList<CategoryChartEntry> =
      self.client.get("/analytics/categories", &query).await?;
    Ok(Page::complete(response.into_vec()))
  }
}

#[derive(Clone)]
pub struct DebtsApi {
  client: HttpClient,
}

impl DebtsApi {
  pub fn new(client: HttpClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ListEndpoint<DebtBalance, ()> for DebtsApi {
  async fn list(&self, _filter: &(), _page: PageRequest) -> Result<Page<DebtBalance>, ApiError> {
    let balance: DebtBalance = self.client.get("/debts/balance", &[]).await?;
    Ok(Page::complete(vec![balance]))
  }
}
