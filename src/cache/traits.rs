//! Core types shared by the cache tiers.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

use crate::error::SourceError;

/// Result from a cache read, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Which tier answered
  pub source: CacheSource,
  /// When the data was fetched from the remote source (if known)
  pub cached_at: Option<DateTime<Utc>>,
  /// Remote failure encountered while answering, for display
  pub notice: Option<SourceError>,
}

impl<T> CacheResult<T> {
  /// Fresh data straight from the remote source.
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: Some(fetched_at),
      notice: None,
    }
  }

  /// Data served by one of the local tiers without I/O to the remote.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>, source: CacheSource) -> Self {
    Self {
      data,
      source,
      cached_at: Some(cached_at),
      notice: None,
    }
  }

  /// Remote failed; serving whatever the local tiers still had.
  pub fn offline(data: T, cached_at: DateTime<Utc>, error: SourceError) -> Self {
    Self {
      data,
      source: CacheSource::Stale,
      cached_at: Some(cached_at),
      notice: Some(error),
    }
  }

  /// Nothing could be served.
  pub fn empty(data: T, notice: Option<SourceError>) -> Self {
    Self {
      data,
      source: CacheSource::Empty,
      cached_at: None,
      notice,
    }
  }

  pub fn is_degraded(&self) -> bool {
    self.notice.is_some()
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// In-memory entry, within its freshness window
  Memory,
  /// Persisted snapshot, within its freshness window
  Persisted,
  /// Fresh data from the remote source
  Network,
  /// Remote failed; possibly stale local data
  Stale,
  /// No data available (invalid input, or remote failed with nothing cached)
  Empty,
}

impl std::fmt::Display for CacheSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Memory => write!(f, "memory"),
      Self::Persisted => write!(f, "persisted"),
      Self::Network => write!(f, "network"),
      Self::Stale => write!(f, "stale"),
      Self::Empty => write!(f, "empty"),
    }
  }
}

/// Time source for freshness checks.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(start),
    }
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}
