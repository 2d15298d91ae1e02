//! Error types for the remote and persistent tiers.

use thiserror::Error;

/// Failure reported by the remote ticket source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
  /// Transport failure (connection refused, DNS, TLS, ...)
  #[error("Remote ticket source unavailable: {0}")]
  Unavailable(String),
  #[error("Remote ticket source timed out")]
  Timeout,
  /// The source answered but refused the request (write conflict, bad payload, auth)
  #[error("Remote ticket source rejected the request ({status}): {message}")]
  Rejected { status: u16, message: String },
  #[error("Failed to decode remote response: {0}")]
  Decode(String),
  #[error("Remote ticket source is not configured")]
  NotConfigured,
}

impl SourceError {
  /// Whether retrying the same request later may succeed.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Unavailable(_) | Self::Timeout)
  }
}

impl From<reqwest::Error> for SourceError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      Self::Timeout
    } else if e.is_decode() {
      Self::Decode(e.to_string())
    } else if let Some(status) = e.status() {
      Self::Rejected {
        status: status.as_u16(),
        message: e.to_string(),
      }
    } else {
      Self::Unavailable(e.to_string())
    }
  }
}

/// Failure of the persistent local store. Never leaves the cache layer.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Snapshot storage error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("Snapshot storage lock poisoned")]
  Poisoned,
  #[error("Snapshot storage I/O error: {0}")]
  Io(#[from] std::io::Error),
}
