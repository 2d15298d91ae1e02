//! Tiered cache for recent tickets.
//!
//! Reads go through three tiers, fastest first:
//! - an in-memory entry with a short freshness window
//! - a persisted snapshot with a longer window, surviving restarts
//! - the remote ticket source, fetched in oversized batches
//!
//! Any successful insert or delete clears both local tiers. Remote failures
//! degrade to the best stale data available instead of failing the read.

mod layer;
mod storage;
mod traits;

pub use layer::{CacheEntry, PersistedSnapshot, TicketCache};
pub use storage::{
  snapshot_key, MemoryStore, NoopStore, SnapshotStore, SqliteStore, StoreRead, StoreWrite,
};
pub use traits::{CacheResult, CacheSource, Clock, ManualClock, SystemClock};
