//! Snapshot persistence: mirrors the ledger into the persistent store
//! and seeds it back at startup.
//!
//! Only `Success` entries are persisted; pending and error entries are
//! meaningless across a restart. The blob is a versioned, checksummed,
//! timestamped envelope; anything that fails validation (unknown
//! version, corrupt payload, bad checksum, too old) discards the whole
//! snapshot rather than merging a partial one. Store failures are logged
//! and swallowed: the cache degrades to memory-only for the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::ledger::CacheLedger;
use super::traits::{CacheEntry, FetchStatus};
use crate::store::SnapshotStore;

/// Fixed store key for the snapshot blob.
pub const SNAPSHOT_KEY: &str = "cache_snapshot_v1";

/// Bump whenever `PersistedEntry` changes shape in a way old payloads
/// cannot satisfy; mismatched snapshots are silently discarded.
const SNAPSHOT_VERSION: u32 = 1;

/// One persisted ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry {
  pub key: String,
  pub data: Value,
  pub fetched_at: DateTime<Utc>,
  pub stale_after_secs: i64,
}

/// Versioned envelope around the serialized entries.
///
/// `payload` is the entries array as a JSON string; `checksum` is the
/// SHA-256 of those exact bytes, so bit rot in device storage reads as
/// "absent" instead of seeding garbage.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
  version: u32,
  saved_at: DateTime<Utc>,
  checksum: String,
  payload: String,
}

fn checksum(payload: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(payload.as_bytes());
  hex::encode(hasher.finalize())
}

/// Build the persistable rows from a ledger: `Success` entries with
/// data only.
pub fn collect_rows(ledger: &CacheLedger) -> Vec<PersistedEntry> {
  let mut rows: Vec<PersistedEntry> = ledger
    .entries()
    .filter(|(_, entry)| entry.status == FetchStatus::Success)
    .filter_map(|(key, entry)| {
      let data = entry.data.clone()?;
      let fetched_at = entry.fetched_at?;
      Some(PersistedEntry {
        key: key.clone(),
        data,
        fetched_at,
        stale_after_secs: entry.stale_after.num_seconds(),
      })
    })
    .collect();
  // Stable blob bytes for identical ledgers.
  rows.sort_by(|a, b| a.key.cmp(&b.key));
  rows
}

pub struct PersistenceAdapter {
  store: Arc<dyn SnapshotStore>,
  max_age: Duration,
  save_pending: AtomicBool,
}

impl PersistenceAdapter {
  pub fn new(store: Arc<dyn SnapshotStore>, max_age: Duration) -> Self {
    Self {
      store,
      max_age,
      save_pending: AtomicBool::new(false),
    }
  }

  /// Serialize and write a snapshot. Store failures degrade to
  /// memory-only with a warning.
  pub fn write_snapshot(&self, rows: Vec<PersistedEntry>) {
    let payload = match serde_json::to_string(&rows) {
      Ok(payload) => payload,
      Err(e) => {
        warn!(error = %e, "failed to serialize cache snapshot");
        return;
      }
    };

    let envelope = Envelope {
      version: SNAPSHOT_VERSION,
      saved_at: Utc::now(),
      checksum: checksum(&payload),
      payload,
    };

    let bytes = match serde_json::to_vec(&envelope) {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(error = %e, "failed to serialize snapshot envelope");
        return;
      }
    };

    match self.store.set(SNAPSHOT_KEY, &bytes) {
      Ok(()) => debug!(entries = rows.len(), "cache snapshot saved"),
      Err(e) => warn!(error = %e, "failed to persist cache snapshot"),
    }
  }

  /// Read and validate the persisted snapshot.
  ///
  /// Returns `None` (removing the blob where it is unusable) for: no
  /// snapshot, store read failure, unparseable content, version or
  /// checksum mismatch, or age over the maximum. Expiry is a deliberate
  /// no-op, not an error.
  pub fn load_snapshot(&self) -> Option<Vec<PersistedEntry>> {
    let bytes = match self.store.get(SNAPSHOT_KEY) {
      Ok(Some(bytes)) => bytes,
      Ok(None) => return None,
      Err(e) => {
        warn!(error = %e, "failed to read cache snapshot");
        return None;
      }
    };

    let envelope: Envelope = match serde_json::from_slice(&bytes) {
      Ok(envelope) => envelope,
      Err(e) => {
        warn!(error = %e, "corrupt cache snapshot, discarding");
        self.remove_snapshot();
        return None;
      }
    };

    if envelope.version != SNAPSHOT_VERSION {
      debug!(
        found = envelope.version,
        expected = SNAPSHOT_VERSION,
        "snapshot version mismatch, discarding"
      );
      self.remove_snapshot();
      return None;
    }

    if checksum(&envelope.payload) != envelope.checksum {
      warn!("snapshot checksum mismatch, discarding");
      self.remove_snapshot();
      return None;
    }

    if Utc::now() - envelope.saved_at > self.max_age {
      debug!(saved_at = %envelope.saved_at, "snapshot expired, discarding");
      self.remove_snapshot();
      return None;
    }

    match serde_json::from_str(&envelope.payload) {
      Ok(rows) => Some(rows),
      Err(e) => {
        warn!(error = %e, "corrupt snapshot payload, discarding");
        self.remove_snapshot();
        None
      }
    }
  }

  pub fn remove_snapshot(&self) {
    if let Err(e) = self.store.remove(SNAPSHOT_KEY) {
      warn!(error = %e, "failed to remove cache snapshot");
    }
  }

  /// Claim the (single) pending save slot. Returns false when a save is
  /// already scheduled, coalescing rapid cache changes into one write.
  pub fn try_begin_save(&self) -> bool {
    !self.save_pending.swap(true, Ordering::SeqCst)
  }

  pub fn end_save(&self) {
    self.save_pending.store(false, Ordering::SeqCst);
  }
}

/// Convert a persisted row back into a ledger entry.
pub fn row_to_entry(row: &PersistedEntry) -> CacheEntry {
  CacheEntry {
    status: FetchStatus::Success,
    data: Some(row.data.clone()),
    error: None,
    fetched_at: Some(row.fetched_at),
    stale_after: Duration::seconds(row.stale_after_secs),
  }
}
