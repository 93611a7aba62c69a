//! Client-side collection caching.
//!
//! - `EntityCache` holds the last fetched contents of one collection, the
//!   filter that produced them, and a busy flag that keeps fetches from
//!   overlapping
//! - the filter equality gate decides between reuse and refetch
//! - snapshot storage gives a warm start across runs

mod entity_cache;
mod gate;
mod storage;
mod traits;

pub use entity_cache::EntityCache;
pub use gate::{decide, decide_filters, CanonicalFilter, GateDecision, QueryFilter};
pub use storage::{NoopSnapshots, Snapshot, SnapshotStore, SqliteSnapshots};
pub use traits::{Cacheable, LoadOptions, LoadOrigin, LoadOutcome, Page, PageRequest};
