use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::store::StoreOptions;

/// Largest page the server accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub refresh: RefreshConfig,
  #[serde(default)]
  pub transactions: TransactionsConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default = "default_currency")]
  pub default_currency: String,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  #[serde(default = "default_timeout")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
  #[serde(default = "default_interval")]
  pub interval_secs: u64,
}

impl Default for RefreshConfig {
  fn default() -> Self {
    Self {
      interval_secs: default_interval(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsConfig {
  #[serde(default = "default_page_size")]
  pub page_size: u32,
}

impl Default for TransactionsConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Keep the last fetched contents on disk for a warm start
  #[serde(default = "default_true")]
  pub persist: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self { persist: true }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  #[serde(default = "default_level")]
  pub level: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

fn default_timeout() -> u64 {
  30
}

fn default_interval() -> u64 {
  60
}

fn default_page_size() -> u32 {
  50
}

fn default_true() -> bool {
  true
}

fn default_currency() -> String {
  "UZS".to_string()
}

fn default_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./midas.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/midas/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/midas/config.yaml\n\
                 with at least `api: {{ url: https://... }}`."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("midas.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("midas").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.api.url.trim().is_empty() {
      return Err(eyre!("api.url must not be empty"));
    }
    Ok(config)
  }

  /// Get the API bearer token from environment variables.
  ///
  /// Checks MIDAS_API_TOKEN first, then MIDAS_TOKEN as fallback. A missing
  /// token is not an error here; the server answers 401 and the UI says so.
  pub fn api_token() -> Option<String> {
    std::env::var("MIDAS_API_TOKEN")
      .or_else(|_| std::env::var("MIDAS_TOKEN"))
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs.max(1))
  }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      page_size: self.transactions.page_size.clamp(1, MAX_PAGE_SIZE),
      refresh_interval: Duration::from_secs(self.refresh.interval_secs.max(1)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::parse("api:\n  url: https://midas.example/api\n").unwrap();

    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.default_currency, "UZS");
    assert_eq!(config.log.level, "info");
    assert!(config.cache.persist);

    let options = config.store_options();
    assert_eq!(options.page_size, 50);
    assert_eq!(options.refresh_interval, Duration::from_secs(60));
  }

  #[test]
  fn test_page_size_is_clamped() {
    let config = Config::parse(
      "api:\n  url: http://localhost:8000\ntransactions:\n  page_size: 500\nrefresh:\n  interval_secs: 15\n",
    )
    .unwrap();

    let options = config.store_options();
    assert_eq!(options.page_size, MAX_PAGE_SIZE);
    assert_eq!(options.refresh_interval, Duration::from_secs(15));
  }

  #[test]
  fn test_missing_url_is_rejected() {
    assert!(Config::parse("refresh:\n  interval_secs: 5\n").is_err());
    assert!(Config::parse("api:\n  url: ''\n").is_err());
  }

  #[test]
  fn test_explicit_path_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");
    assert!(Config::load(Some(&missing)).is_err());

    let present = dir.path().join("midas.yaml");
    std::fs::write(&present, "api:\n  url: http://localhost\ncache:\n  persist: false\n").unwrap();
    let config = Config::load(Some(&present)).unwrap();
    assert!(!config.cache.persist);
  }
}
