//! Persistent store backends for cache snapshots.
//!
//! The store is a plain key-to-bytes map on device storage. It must
//! tolerate absence (first run); content validation is the persistence
//! adapter's job, so corrupt bytes are returned as-is and rejected
//! upstream.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for snapshot store backends.
pub trait SnapshotStore: Send + Sync {
  /// Read the value for a key, `None` when absent.
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// Write (or overwrite) the value for a key.
  fn set(&self, key: &str, value: &[u8]) -> Result<()>;

  /// Delete a key. Deleting an absent key is not an error.
  fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store: backs tests and memory-only degraded mode.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SnapshotStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(key.to_string(), value.to_vec());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.remove(key);
    Ok(())
  }
}

/// SQLite-backed store, the production backend on both mobile and
/// desktop shells.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the snapshot table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS snapshots (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open (or create) the store at the default location.
  pub fn open_default() -> Result<Self> {
    Self::open(&Self::default_path()?)
  }

  /// Open (or create) the store at an explicit path.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// In-memory SQLite database, for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("liftlog").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }
}

impl SnapshotStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM snapshots WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot: {}", e))
  }

  fn set(&self, key: &str, value: &[u8]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO snapshots (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write snapshot: {}", e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM snapshots WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete snapshot: {}", e))?;

    Ok(())
  }
}
