//! Tiered ticket cache: memory, then persisted snapshot, then remote source.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::SourceError;
use crate::tickets::{NationalId, TicketDraft, TicketRecord, TicketSource, UserSummary};

use super::storage::{SnapshotStore, StoreRead, StoreWrite};
use super::traits::{CacheResult, CacheSource, Clock, SystemClock};

/// The in-memory cache state. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  /// Newest first
  pub records: Vec<TicketRecord>,
  pub fetched_at: DateTime<Utc>,
  /// Largest "most recent N" this entry answers
  pub covered_limit: usize,
  /// The source had no more rows than these when fetched
  #[serde(default)]
  pub exhaustive: bool,
}

impl CacheEntry {
  fn covers(&self, limit: usize) -> bool {
    self.exhaustive || self.covered_limit >= limit
  }

  /// Whether the stored rows themselves answer `limit`.
  fn holds(&self, limit: usize) -> bool {
    self.exhaustive || self.records.len() >= limit
  }

  fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - self.fetched_at < ttl
  }

  fn truncated(&self, limit: usize) -> Vec<TicketRecord> {
    self.records.iter().take(limit).cloned().collect()
  }
}

/// Durable mirror of a [`CacheEntry`], as stored in the snapshot store.
pub type PersistedSnapshot = CacheEntry;

#[derive(Debug, Default)]
struct CacheState {
  entry: Option<CacheEntry>,
  /// Bumped on every invalidation so in-flight fetches can tell they lost
  generation: u64,
}

/// Ticket cache mediating reads through memory, the persisted snapshot and
/// the remote source, and invalidating both local tiers on every write.
pub struct TicketCache<R: TicketSource, S: SnapshotStore> {
  source: R,
  store: S,
  clock: Arc<dyn Clock>,
  memory_ttl: Duration,
  persisted_ttl: Duration,
  min_batch: usize,
  snapshot_key: String,
  state: Mutex<CacheState>,
}

impl<R: TicketSource, S: SnapshotStore> TicketCache<R, S> {
  /// Create a new cache over `source`, persisting snapshots under `snapshot_key`.
  pub fn new(source: R, store: S, config: &CacheConfig, snapshot_key: impl Into<String>) -> Self {
    Self {
      source,
      store,
      clock: Arc::new(SystemClock),
      memory_ttl: config.memory_ttl(),
      persisted_ttl: config.persisted_ttl(),
      min_batch: config.min_batch.max(1),
      snapshot_key: snapshot_key.into(),
      state: Mutex::new(CacheState::default()),
    }
  }

  /// Replace the time source used for freshness checks.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn source(&self) -> &R {
    &self.source
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// `covered_limit` of the current in-memory entry, if any.
  pub fn covered_limit(&self) -> Option<usize> {
    self.lock().entry.as_ref().map(|e| e.covered_limit)
  }

  fn lock(&self) -> MutexGuard<'_, CacheState> {
    // The state is only ever replaced whole, so a poisoned guard is still consistent.
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Fetch the `limit` most recent tickets from the fastest valid tier.
  ///
  /// 1. In-memory entry, if fresh and large enough
  /// 2. Persisted snapshot, if fresh and large enough (promoted to memory)
  /// 3. Remote fetch of at least `min_batch` rows, refreshing both tiers
  /// 4. On remote failure, the snapshot or memory entry regardless of age
  ///
  /// Never fails: remote errors are reported through `notice`.
  pub async fn fetch_recent(&self, limit: usize) -> CacheResult<Vec<TicketRecord>> {
    if limit == 0 {
      return CacheResult::empty(Vec::new(), None);
    }

    let now = self.clock.now();
    let generation = {
      let state = self.lock();
      if let Some(entry) = &state.entry {
        if entry.is_fresh(now, self.memory_ttl) && entry.covers(limit) {
          debug!(limit, "ticket cache hit (memory)");
          let records = entry.truncated(limit);
          return CacheResult::from_cache(records, entry.fetched_at, CacheSource::Memory);
        }
      }
      state.generation
    };

    let snapshot = self.read_snapshot();
    if let Some(snapshot) = &snapshot {
      if snapshot.is_fresh(now, self.persisted_ttl) && snapshot.holds(limit) {
        debug!(limit, "ticket cache hit (persisted)");
        let records = snapshot.truncated(limit);
        let fetched_at = snapshot.fetched_at;
        let mut state = self.lock();
        if state.generation == generation {
          state.entry = Some(CacheEntry {
            covered_limit: snapshot.records.len(),
            ..snapshot.clone()
          });
        }
        return CacheResult::from_cache(records, fetched_at, CacheSource::Persisted);
      }
    }

    let batch = limit.max(self.min_batch);
    debug!(limit, batch, "ticket cache miss, fetching from remote");

    match self.source.list_recent(batch).await {
      Ok(records) => self.install(records, batch, limit, now, generation),
      Err(e) => {
        warn!(error = %e, "remote ticket fetch failed, falling back to local data");
        self.fallback(snapshot, limit, e)
      }
    }
  }

  /// Install a freshly fetched batch, unless the fetch lost a race.
  fn install(
    &self,
    records: Vec<TicketRecord>,
    batch: usize,
    limit: usize,
    started: DateTime<Utc>,
    generation: u64,
  ) -> CacheResult<Vec<TicketRecord>> {
    let fetched_at = self.clock.now();
    let entry = CacheEntry {
      exhaustive: records.len() < batch,
      covered_limit: records.len(),
      records,
      fetched_at,
    };

    let mut state = self.lock();

    if state.generation != generation {
      // A write landed while we were fetching; these rows may predate it.
      debug!("discarding fetch that raced an invalidation");
      return CacheResult::from_network(entry.truncated(limit), fetched_at);
    }

    if let Some(current) = &state.entry {
      if current.fetched_at >= started && current.covers(limit) {
        debug!("discarding fetch superseded by a concurrent refresh");
        return CacheResult::from_network(current.truncated(limit), current.fetched_at);
      }
    }

    info!(count = entry.records.len(), batch, "ticket cache refreshed from remote");
    let result = entry.truncated(limit);
    state.entry = Some(entry.clone());
    drop(state);

    self.write_snapshot(&entry);
    CacheResult::from_network(result, fetched_at)
  }

  /// Best available stale data after a remote failure, else empty.
  fn fallback(
    &self,
    snapshot: Option<PersistedSnapshot>,
    limit: usize,
    error: SourceError,
  ) -> CacheResult<Vec<TicketRecord>> {
    let stale = snapshot.or_else(|| self.lock().entry.clone());
    match stale {
      Some(entry) => CacheResult::offline(entry.truncated(limit), entry.fetched_at, error),
      None => CacheResult::empty(Vec::new(), Some(error)),
    }
  }

  /// Look up the most recent affected-user summary for `identifier`.
  ///
  /// Always goes to the remote source; identifiers that do not normalize to
  /// 11 digits return nothing without any I/O.
  pub async fn find_by_identifier(&self, identifier: &str) -> CacheResult<Option<UserSummary>> {
    let Some(identifier) = NationalId::parse(identifier) else {
      debug!("rejecting malformed identifier lookup");
      return CacheResult::empty(None, None);
    };

    match self.source.find_by_identifier(&identifier).await {
      Ok(records) => {
        let summary = records
          .iter()
          .filter(|r| r.affected_user_identifier.as_ref() == Some(&identifier))
          .filter_map(TicketRecord::user_summary)
          .next();
        CacheResult::from_network(summary, self.clock.now())
      }
      Err(e) => {
        warn!(error = %e, "affected-user lookup failed");
        CacheResult::empty(None, Some(e))
      }
    }
  }

  /// Create a ticket remotely. On success both local tiers are cleared.
  pub async fn insert(&self, draft: &TicketDraft) -> Result<TicketRecord, SourceError> {
    let record = self.source.insert(draft).await.inspect_err(|e| {
      warn!(error = %e, "ticket insert failed");
    })?;
    info!(id = %record.id, "ticket created");
    self.invalidate();
    Ok(record)
  }

  /// Delete a ticket remotely. On success both local tiers are cleared.
  pub async fn remove(&self, id: &str) -> Result<(), SourceError> {
    self.source.delete(id).await.inspect_err(|e| {
      warn!(id, error = %e, "ticket delete failed");
    })?;
    info!(id, "ticket deleted");
    self.invalidate();
    Ok(())
  }

  /// Clear the in-memory entry and delete the persisted snapshot.
  pub fn invalidate(&self) {
    {
      let mut state = self.lock();
      state.entry = None;
      state.generation += 1;
    }
    if let StoreWrite::Failed(e) = self.store.try_delete(&self.snapshot_key) {
      warn!(error = %e, "failed to delete ticket snapshot");
    }
    debug!("ticket cache invalidated");
  }

  fn read_snapshot(&self) -> Option<PersistedSnapshot> {
    match self.store.try_read(&self.snapshot_key) {
      StoreRead::Hit(payload) => match serde_json::from_slice(&payload) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
          warn!(error = %e, "ignoring undecodable ticket snapshot");
          None
        }
      },
      StoreRead::Absent => None,
      StoreRead::Failed(e) => {
        warn!(error = %e, "failed to read ticket snapshot");
        None
      }
    }
  }

  fn write_snapshot(&self, snapshot: &PersistedSnapshot) {
    let payload = match serde_json::to_vec(snapshot) {
      Ok(payload) => payload,
      Err(e) => {
        warn!(error = %e, "failed to serialize ticket snapshot");
        return;
      }
    };
    if let StoreWrite::Failed(e) = self.store.try_write(&self.snapshot_key, &payload) {
      warn!(error = %e, "failed to write ticket snapshot");
    }
  }
}
