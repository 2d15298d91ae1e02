//! Snapshot storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;

/// Outcome of reading a snapshot.
#[derive(Debug)]
pub enum StoreRead {
  Hit(Vec<u8>),
  Absent,
  Failed(StoreError),
}

/// Outcome of writing or deleting a snapshot.
#[derive(Debug)]
pub enum StoreWrite {
  Done,
  Failed(StoreError),
}

impl<E: Into<StoreError>> From<std::result::Result<(), E>> for StoreWrite {
  fn from(result: std::result::Result<(), E>) -> Self {
    match result {
      Ok(()) => Self::Done,
      Err(e) => Self::Failed(e.into()),
    }
  }
}

/// Durable key/value storage for cache snapshots.
///
/// Best effort: every failure is reported as a value, never raised, so the
/// cache treats a broken store the same as an empty one.
pub trait SnapshotStore: Send + Sync {
  fn try_read(&self, key: &str) -> StoreRead;

  /// Replace whatever is stored under `key`.
  fn try_write(&self, key: &str, payload: &[u8]) -> StoreWrite;

  /// Remove `key`. Removing an absent key succeeds.
  fn try_delete(&self, key: &str) -> StoreWrite;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Box<T> {
  fn try_read(&self, key: &str) -> StoreRead {
    (**self).try_read(key)
  }

  fn try_write(&self, key: &str, payload: &[u8]) -> StoreWrite {
    (**self).try_write(key, payload)
  }

  fn try_delete(&self, key: &str) -> StoreWrite {
    (**self).try_delete(key)
  }
}

/// Fixed snapshot key for one remote table.
pub fn snapshot_key(url: &str, table: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.trim_end_matches('/').as_bytes());
  hasher.update(b"\0");
  hasher.update(table.as_bytes());
  format!("ticket-snapshot:{}", hex::encode(hasher.finalize()))
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStore;

impl SnapshotStore for NoopStore {
  fn try_read(&self, _key: &str) -> StoreRead {
    StoreRead::Absent
  }

  fn try_write(&self, _key: &str, _payload: &[u8]) -> StoreWrite {
    StoreWrite::Done
  }

  fn try_delete(&self, _key: &str) -> StoreWrite {
    StoreWrite::Done
  }
}

/// In-process store. Can be switched into a failing mode to exercise the
/// degraded paths.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
  failing: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn contains(&self, key: &str) -> bool {
    self
      .entries
      .lock()
      .map(|entries| entries.contains_key(key))
      .unwrap_or(false)
  }

  fn guard(&self) -> std::result::Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StoreError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(StoreError::Io(std::io::Error::other(
        "store switched to failing mode",
      )));
    }
    self.entries.lock().map_err(|_| StoreError::Poisoned)
  }
}

impl SnapshotStore for MemoryStore {
  fn try_read(&self, key: &str) -> StoreRead {
    match self.guard() {
      Ok(entries) => match entries.get(key) {
        Some(payload) => StoreRead::Hit(payload.clone()),
        None => StoreRead::Absent,
      },
      Err(e) => StoreRead::Failed(e),
    }
  }

  fn try_write(&self, key: &str, payload: &[u8]) -> StoreWrite {
    self
      .guard()
      .map(|mut entries| {
        entries.insert(key.to_string(), payload.to_vec());
      })
      .into()
  }

  fn try_delete(&self, key: &str) -> StoreWrite {
    self
      .guard()
      .map(|mut entries| {
        entries.remove(key);
      })
      .into()
  }
}

/// SQLite-based snapshot storage.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the snapshot table.
const SNAPSHOT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshot_cache (
    key TEXT PRIMARY KEY,
    payload BLOB NOT NULL,
    written_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open the store at `path`, or at the default location when `None`.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a throwaway in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SNAPSHOT_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("ticketdesk").join("cache.db"))
  }

  fn read(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    let payload = conn
      .query_row(
        "SELECT payload FROM snapshot_cache WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(payload)
  }

  fn write(&self, key: &str, payload: &[u8]) -> std::result::Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute(
      "INSERT OR REPLACE INTO snapshot_cache (key, payload, written_at)
       VALUES (?, ?, datetime('now'))",
      params![key, payload],
    )?;
    Ok(())
  }

  fn delete(&self, key: &str) -> std::result::Result<(), StoreError> {
    let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
    conn.execute("DELETE FROM snapshot_cache WHERE key = ?", params![key])?;
    Ok(())
  }
}

impl SnapshotStore for SqliteStore {
  fn try_read(&self, key: &str) -> StoreRead {
    match self.read(key) {
      Ok(Some(payload)) => StoreRead::Hit(payload),
      Ok(None) => StoreRead::Absent,
      Err(e) => StoreRead::Failed(e),
    }
  }

  fn try_write(&self, key: &str, payload: &[u8]) -> StoreWrite {
    self.write(key, payload).into()
  }

  fn try_delete(&self, key: &str) -> StoreWrite {
    self.delete(key).into()
  }
}
