use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::api_types::ApiErrorBody;
use super::error::ApiError;

/// Thin REST client: base URL, bearer token, JSON in and out.
#[derive(Clone)]
pub struct HttpClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl HttpClient {
  pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
    let base = Url::parse(base_url.trim())
      .map_err(|e| ApiError::Validation(format!("invalid API url {:?}: {}", base_url, e)))?;
    if base.cannot_be_a_base() {
      return Err(ApiError::Validation(format!(
        "API url {:?} cannot carry a path",
        base_url
      )));
    }

    let http = reqwest::Client::builder().timeout(timeout).build()?;

    Ok(Self { http, base, token })
  }

  /// Join `path` onto the base URL, keeping any base path prefix.
  pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
    let mut url = self.base.clone();
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| ApiError::Validation("API url cannot carry a path".into()))?;
      segments.pop_if_empty();
      for segment in path.split('/').filter(|s| !s.is_empty()) {
        segments.push(segment);
      }
    }
    Ok(url)
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
    let url = self.endpoint(path)?;
    let builder = self.http.request(method, url);
    Ok(match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    })
  }

  pub async fn get<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&'static str, String)],
  ) -> Result<T, ApiError> {
    debug!(path, ?query, "GET");
    let response = self.request(Method::GET, path)?.query(query).send().await?;
    let response = check(response, path).await?;
    Ok(response.json::<T>().await?)
  }

  pub async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    debug!(path, %method, "sending");
    let response = self.request(method, path)?.json(body).send().await?;
    let response = check(response, path).await?;
    Ok(response.json::<T>().await?)
  }

  pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
    debug!(path, "DELETE");
    let response = self.request(Method::DELETE, path)?.send().await?;
    check(response, path).await?;
    Ok(())
  }

  /// DELETE with a JSON body. Returns the response body, if any.
  pub async fn delete_with_body<B>(&self, path: &str, body: &B) -> Result<Option<Value>, ApiError>
  where
    B: Serialize + ?Sized,
  {
    debug!(path, "DELETE with body");
    let response = self.request(Method::DELETE, path)?.json(body).send().await?;
    let response = check(response, path).await?;
    if response.status() == StatusCode::NO_CONTENT {
      return Ok(None);
    }
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
      return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&bytes)?))
  }
}

/// Map non-success statuses onto `ApiError`.
async fn check(response: Response, path: &str) -> Result<Response, ApiError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }

  let body = response.text().await.unwrap_or_default();
  let message = match serde_json::from_str::<ApiErrorBody>(&body) {
    Ok(parsed) => parsed.message(),
    Err(_) if body.trim().is_empty() => status.canonical_reason().unwrap_or("error").to_string(),
    Err(_) => body,
  };

  Err(match status {
    StatusCode::UNAUTHORIZED => {
      warn!(path, "401 Unauthorized: token expired or invalid");
      ApiError::Unauthorized
    }
    StatusCode::NOT_FOUND => ApiError::NotFound(format!("{}: {}", path, message)),
    StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
    _ => ApiError::Status {
      status: status.as_u16(),
      message,
    },
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client(base: &str) -> HttpClient {
    HttpClient::new(base, None, Duration::from_secs(5)).unwrap()
  }

  #[test]
  fn test_endpoint_joins_paths() {
    let c = client("http://localhost:8000");
    assert_eq!(
      c.endpoint("/transactions/bulk").unwrap().as_str(),
      "http://localhost:8000/transactions/bulk"
    );
  }

  #[test]
  fn test_endpoint_keeps_base_prefix() {
    let c = client("https://example.com/api/");
    assert_eq!(
      c.endpoint("transactions/abc").unwrap().as_str(),
      "https://example.com/api/transactions/abc"
    );
  }

  #[test]
  fn test_rejects_bad_url() {
    assert!(HttpClient::new("not a url", None, Duration::from_secs(1)).is_err());
    assert!(HttpClient::new("mailto:me@example.com", None, Duration::from_secs(1)).is_err());
  }
}
