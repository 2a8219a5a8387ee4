//! The cache front: an explicitly constructed `Cache` handle wired to a
//! snapshot store.
//!
//! `Cache` owns the ledger behind a mutex that is only ever held for
//! synchronous, run-to-completion sections (never across an await), so
//! reads observe complete entries. Fetches and commits suspend outside
//! the lock and hand their results back through the ledger, tagged with
//! the fetch start time and the generation captured when they began.
//!
//! Reads are stale-while-revalidate: a stale entry is served immediately
//! and refreshed in the background; only a key with nothing servable
//! blocks on the network. Subscribers get a change tick and re-read the
//! keys they display, the same poll-style integration an event-loop UI
//! uses.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::ledger::CacheLedger;
use super::persist::{collect_rows, row_to_entry, PersistenceAdapter};
use super::retry::{OpKind, RetryPolicy};
use super::session::{is_sign_out, Identity};
use super::traits::{CacheEntry, FetchStatus, QueryKey};
use crate::config::CacheConfig;
use crate::error::FetchError;
use crate::store::SnapshotStore;

pub struct Cache {
  inner: Arc<CacheInner>,
}

struct CacheInner {
  ledger: Mutex<CacheLedger>,
  persist: PersistenceAdapter,
  retry: RetryPolicy,
  changed: watch::Sender<u64>,
  save_debounce: StdDuration,
  snapshot_max_age: Duration,
}

impl Clone for Cache {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl Cache {
  /// Create a cache instance backed by the given snapshot store.
  ///
  /// Instances are independent: tests construct their own instead of
  /// sharing process-global state.
  pub fn new(config: &CacheConfig, store: Arc<dyn SnapshotStore>) -> Self {
    let (changed, _) = watch::channel(0u64);
    let snapshot_max_age = Duration::days(config.snapshot_max_age_days);

    Self {
      inner: Arc::new(CacheInner {
        ledger: Mutex::new(CacheLedger::new(Duration::seconds(
          config.stale_after_secs as i64,
        ))),
        persist: PersistenceAdapter::new(store, snapshot_max_age),
        retry: RetryPolicy::from_config(&config.retry),
        changed,
        save_debounce: StdDuration::from_millis(config.save_debounce_ms),
        snapshot_max_age,
      }),
    }
  }

  /// Current entry for a key. Side-effect-free.
  pub fn read<K: QueryKey>(&self, key: &K) -> CacheEntry {
    self.ledger().read(&key.cache_key())
  }

  /// Change tick. Bumped on every ledger change; subscribers re-read
  /// the keys they care about when it moves.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.inner.changed.subscribe()
  }

  /// Read a key, fetching if needed.
  ///
  /// - Fresh entry: returned as-is, no fetch.
  /// - Fetch already in flight: current entry returned as-is.
  /// - Stale entry with servable data: returned immediately, refreshed
  ///   in the background.
  /// - Nothing servable: fetched in the foreground.
  ///
  /// The fetcher is invoked through the retry policy with read limits.
  pub async fn query<K, F, Fut>(&self, key: &K, fetcher: F) -> CacheEntry
  where
    K: QueryKey,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
  {
    let cache_key = key.cache_key();
    let entry = self.ledger().read(&cache_key);

    match entry.status {
      FetchStatus::Pending => return entry,
      FetchStatus::Success if !entry.is_stale() => return entry,
      _ => {}
    }

    if entry.has_data() {
      let cache = self.clone();
      let description = key.description();
      tokio::spawn(async move {
        cache.run_fetch(&cache_key, &description, fetcher).await;
      });
      entry
    } else {
      self.run_fetch(&cache_key, &key.description(), fetcher).await;
      self.ledger().read(&cache_key)
    }
  }

  /// Fetch a key unconditionally, in the foreground.
  pub async fn refetch<K, F, Fut>(&self, key: &K, fetcher: F) -> CacheEntry
  where
    K: QueryKey,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
  {
    let cache_key = key.cache_key();
    self.run_fetch(&cache_key, &key.description(), fetcher).await;
    self.ledger().read(&cache_key)
  }

  /// Mark the given keys stale now. Data is kept; the next read of an
  /// invalidated key triggers a refetch.
  pub fn invalidate<K: QueryKey>(&self, keys: &[K]) {
    self.ledger().invalidate(keys);
    self.notify_change();
  }

  /// Invalidate every key matching a predicate over canonical forms
  /// (e.g. a whole family of parameterized list queries).
  pub fn invalidate_where(&self, pred: impl Fn(&str) -> bool) {
    self.ledger().invalidate_where(pred);
    self.notify_change();
  }

  /// Apply a status-preserving data patch to a key. Used for list
  /// surgery when an item is known to have changed elsewhere.
  pub fn patch<K: QueryKey>(&self, key: &K, f: impl FnOnce(Option<Value>) -> Option<Value>) {
    self.ledger().patch(&key.cache_key(), f);
    self.notify_change();
    self.schedule_save();
  }

  /// Seed the ledger from the persisted snapshot. Call once at startup;
  /// keys already populated by a live fetch are left alone.
  pub fn restore(&self) {
    let Some(rows) = self.inner.persist.load_snapshot() else {
      return;
    };

    let mut seeded = 0usize;
    {
      let mut ledger = self.ledger();
      for row in &rows {
        if ledger.seed(row.key.clone(), row_to_entry(row)) {
          seeded += 1;
        }
      }
    }

    if seeded > 0 {
      self.notify_change();
    }
    info!(seeded, total = rows.len(), "cache snapshot restored");
  }

  /// Flush the ledger to the store. Call at clean shutdown.
  pub fn dispose(&self) {
    self.save_now();
  }

  /// React to a session identity transition. Only sign-out touches the
  /// cache: the ledger is cleared and the persisted snapshot deleted
  /// before any next sign-in can observe them.
  pub fn handle_identity_change(&self, previous: &Identity, current: &Identity) {
    if is_sign_out(previous, current) {
      info!("sign-out: wiping cache and persisted snapshot");
      self.sign_out_wipe();
    }
  }

  fn sign_out_wipe(&self) {
    // Generation bump first: any in-flight fetch, commit, or save that
    // started before the wipe now fails its generation check.
    self.ledger().clear();
    self.inner.persist.remove_snapshot();
    self.notify_change();
  }

  /// Shared fetch path: begin, await the fetcher under the read retry
  /// policy, then resolve or fail - unless the cache was cleared while
  /// the fetch was in flight, in which case the result is discarded.
  async fn run_fetch<F, Fut>(&self, cache_key: &str, description: &str, fetcher: F)
  where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
  {
    let generation = {
      let mut ledger = self.ledger();
      ledger.begin(cache_key);
      ledger.generation()
    };
    self.notify_change();

    let started_at = Utc::now();
    debug!(key = description, "fetching");
    let result = self.inner.retry.run(OpKind::Read, fetcher).await;

    {
      let mut ledger = self.ledger();
      if ledger.generation() != generation {
        debug!(key = description, "fetch result discarded: cache was cleared");
        return;
      }
      match result {
        Ok(data) => {
          ledger.resolve(cache_key, data, started_at);
        }
        Err(error) => {
          warn!(key = description, error = %error, "fetch failed");
          ledger.fail(cache_key, error);
        }
      }
    }
    self.notify_change();
    self.schedule_save();
  }

  /// Write the current ledger to the store, unless a clear supersedes
  /// the write. An empty ledger removes the blob instead of persisting
  /// an empty snapshot.
  fn save_now(&self) {
    let (rows, generation) = {
      let mut ledger = self.ledger();
      ledger.evict_older_than(Utc::now() - self.inner.snapshot_max_age);
      (collect_rows(&ledger), ledger.generation())
    };

    if rows.is_empty() {
      self.inner.persist.remove_snapshot();
      return;
    }

    self.inner.persist.write_snapshot(rows);
    if self.ledger().generation() != generation {
      self.inner.persist.remove_snapshot();
    }
  }

  /// Schedule a debounced save; rapid changes coalesce into one write.
  pub(super) fn schedule_save(&self) {
    if !self.inner.persist.try_begin_save() {
      return;
    }
    let cache = self.clone();
    tokio::spawn(async move {
      tokio::time::sleep(cache.inner.save_debounce).await;
      cache.inner.persist.end_save();
      cache.save_now();
    });
  }

  pub(super) fn ledger(&self) -> MutexGuard<'_, CacheLedger> {
    // Mutations run to completion without suspension; recover the guard
    // on poison rather than propagating a panic from another task.
    match self.inner.ledger.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  pub(super) fn retry(&self) -> &RetryPolicy {
    &self.inner.retry
  }

  pub(super) fn notify_change(&self) {
    self.inner.changed.send_modify(|tick| *tick += 1);
  }
}
