use thiserror::Error;

/// Failure talking to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  #[error("network error: {0}")]
  Network(String),

  #[error("server returned {status}: {message}")]
  Status { status: u16, message: String },

  #[error("not authorized: token expired or invalid")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("failed to decode response: {0}")]
  Decode(String),

  #[error("invalid request: {0}")]
  Validation(String),
}

impl ApiError {
  /// Network failures and server-side errors; retrying later may succeed.
  pub fn is_transient(&self) -> bool {
    match self {
      ApiError::Network(_) => true,
      ApiError::Status { status, .. } => *status >= 500,
      _ => false,
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      ApiError::Decode(e.to_string())
    } else if let Some(status) = e.status() {
      ApiError::Status {
        status: status.as_u16(),
        message: e.to_string(),
      }
    } else {
      ApiError::Network(e.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(e: serde_json::Error) -> Self {
    ApiError::Decode(e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_transient_classification() {
    assert!(ApiError::Network("reset".into()).is_transient());
    assert!(ApiError::Status {
      status: 503,
      message: "unavailable".into()
    }
    .is_transient());
    assert!(!ApiError::Status {
      status: 409,
      message: "conflict".into()
    }
    .is_transient());
    assert!(!ApiError::Unauthorized.is_transient());
  }
}
