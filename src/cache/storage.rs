//! Snapshot storage for warm starts.
//!
//! Stores the last committed contents of each collection as one serialized
//! blob per (collection, filter) pair. Snapshots are never treated as a
//! cache hit; they only give the UI something to show before the first
//! fetch completes.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::gate::CanonicalFilter;

/// A stored collection snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
  /// JSON array of entities, in display order
  pub data: Vec<u8>,
  pub item_count: usize,
  pub cached_at: DateTime<Utc>,
}

/// Backend for collection snapshots.
pub trait SnapshotStore: Send + Sync {
  fn save(
    &self,
    collection: &str,
    filter: &CanonicalFilter,
    data: &[u8],
    item_count: usize,
  ) -> Result<()>;

  fn load(&self, collection: &str, filter: &CanonicalFilter) -> Result<Option<Snapshot>>;
}

/// Used when persistence is disabled.
pub struct NoopSnapshots;

impl SnapshotStore for NoopSnapshots {
  fn save(&self, _: &str, _: &CanonicalFilter, _: &[u8], _: usize) -> Result<()> {
    Ok(())
  }

  fn load(&self, _: &str, _: &CanonicalFilter) -> Result<Option<Snapshot>> {
    Ok(None)
  }
}

pub struct SqliteSnapshots {
  conn: Mutex<Connection>,
}

impl SqliteSnapshots {
  /// Open the snapshot database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    conn
      .execute_batch(SNAPSHOT_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("midas").join("cache.db"))
  }
}

const SNAPSHOT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collection_snapshot (
    collection TEXT NOT NULL,
    filter_hash TEXT NOT NULL,
    filter_description TEXT NOT NULL,
    data BLOB NOT NULL,
    item_count INTEGER NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, filter_hash)
);
"#;

impl SnapshotStore for SqliteSnapshots {
  fn save(
    &self,
    collection: &str,
    filter: &CanonicalFilter,
    data: &[u8],
    item_count: usize,
  ) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO collection_snapshot
           (collection, filter_hash, filter_description, data, item_count, cached_at)
         VALUES (?, ?, ?, ?, ?, datetime('now'))",
        params![
          collection,
          filter.cache_hash(),
          filter.to_string(),
          data,
          item_count as i64
        ],
      )
      .map_err(|e| eyre!("Failed to store snapshot: {}", e))?;

    Ok(())
  }

  fn load(&self, collection: &str, filter: &CanonicalFilter) -> Result<Option<Snapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, i64, String)> = conn
      .query_row(
        "SELECT data, item_count, cached_at FROM collection_snapshot
         WHERE collection = ? AND filter_hash = ?",
        params![collection, filter.cache_hash()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot: {}", e))?;

    match row {
      Some((data, item_count, cached_at)) => Ok(Some(Snapshot {
        data,
        item_count: usize::try_from(item_count).unwrap_or_default(),
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(None),
    }
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn store() -> (TempDir, SqliteSnapshots) {
    let dir = TempDir::new().unwrap();
    let store = SqliteSnapshots::open_at(&dir.path().join("nested").join("cache.db")).unwrap();
    (dir, store)
  }

  #[test]
  fn test_save_and_load() {
    let (_dir, store) = store();
    let may = CanonicalFilter::from_pairs([("start_date", "2024-05-01".to_string())]);

    store.save("transaction", &may, b"[1,2]", 2).unwrap();
    let snapshot = store.load("transaction", &may).unwrap().unwrap();

    assert_eq!(snapshot.data, b"[1,2]");
    assert_eq!(snapshot.item_count, 2);
  }

  #[test]
  fn test_keyed_by_collection_and_filter() {
    let (_dir, store) = store();
    let may = CanonicalFilter::from_pairs([("start_date", "2024-05-01".to_string())]);
    let june = CanonicalFilter::from_pairs([("start_date", "2024-06-01".to_string())]);

    store.save("transaction", &may, b"[]", 0).unwrap();

    assert!(store.load("transaction", &june).unwrap().is_none());
    assert!(store.load("limit", &may).unwrap().is_none());
  }

  #[test]
  fn test_save_replaces() {
    let (_dir, store) = store();
    let all = CanonicalFilter::default();

    store.save("category", &all, b"[1]", 1).unwrap();
    store.save("category", &all, b"[1,2,3]", 3).unwrap();

    assert_eq!(store.load("category", &all).unwrap().unwrap().item_count, 3);
  }

  #[test]
  fn test_noop_never_hits() {
    let all = CanonicalFilter::default();
    NoopSnapshots.save("category", &all, b"[1]", 1).unwrap();
    assert!(NoopSnapshots.load("category", &all).unwrap().is_none());
  }
}
