use async_trait::async_trait;
use reqwest::Method;

use crate::cache::{Page, PageRequest, QueryFilter};
use crate::models::{Limit, LimitCreate, LimitUpdate, PeriodFilter};

use super::api_types::ApiList;
use super::client::HttpClient;
use super::{ApiError, ListEndpoint, MutateEndpoint};

/// `/limits` collection. Unpaginated; there is no bulk delete, so
/// `delete_many` uses the per-id fallback.
#[derive(Clone)]
pub struct LimitsApi {
  client: HttpClient,
}

impl LimitsApi {
  pub fn new(client: HttpClient) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ListEndpoint<Limit, PeriodFilter> for LimitsApi {
  async fn list(&self, filter: &PeriodFilter, _page: PageRequest) -> Result<Page<Limit>, ApiError> {
    let query = filter.canonical().pairs();
    let response: ApiList<Limit> = self.client.get("/limits", &query).await?;
    Ok(Page::complete(response.into_vec()))
  }
}

#[async_trait]
impl MutateEndpoint<Limit> for LimitsApi {
  async fn create(&self, payload: &LimitCreate) -> Result<Limit, ApiError> {
    self.client.send(Method::POST, "/limits", payload).await
  }

  async fn update(&self, id: &str, payload: &LimitUpdate) -> Result<Limit, ApiError> {
    let path = format!("/limits/{}", id);
    self.client.send(Method::PATCH, &path, payload).await
  }

  async fn delete(&self, id: &str) -> Result<(), ApiError> {
    let path = format!("/limits/{}", id);
    self.client.delete(&path).await
  }
}
