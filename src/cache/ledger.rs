//! The cache ledger: an in-memory, single-writer map of canonical query
//! keys to cache entries.
//!
//! All mutations are synchronous and run to completion, so an entry can
//! never be observed half-updated. Async work (fetches, commits) happens
//! around the ledger and hands results back through `resolve`/`fail`,
//! which carry the fetch's start time and the ledger generation captured
//! when the fetch began:
//!
//! - `resolve` is last-writer-by-fetch-time: a result whose fetch started
//!   before the one already recorded is dropped, so concurrent fetches
//!   for the same key converge deterministically regardless of arrival
//!   order.
//! - `clear()` bumps the generation counter; callers compare it against
//!   the generation they captured and discard results that straddle a
//!   clear (sign-out must not be repopulated by a late fetch).

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::debug;

use super::traits::{CacheEntry, FetchStatus, QueryKey};
use crate::error::FetchError;

pub struct CacheLedger {
  entries: HashMap<String, CacheEntry>,
  default_stale_after: Duration,
  generation: u64,
}

impl CacheLedger {
  pub fn new(default_stale_after: Duration) -> Self {
    Self {
      entries: HashMap::new(),
      default_stale_after,
      generation: 0,
    }
  }

  /// Current generation. Bumped by `clear()`.
  pub fn generation(&self) -> u64 {
    self.generation
  }

  /// Current entry for a key, or an idle placeholder. Side-effect-free.
  pub fn read(&self, key: &str) -> CacheEntry {
    self
      .entries
      .get(key)
      .cloned()
      .unwrap_or_else(|| CacheEntry::idle(self.default_stale_after))
  }

  /// Entry for a key only if one exists. Used for rollback snapshots,
  /// where "absent" and "idle" must stay distinguishable.
  pub fn snapshot(&self, key: &str) -> Option<CacheEntry> {
    self.entries.get(key).cloned()
  }

  /// Restore a key to a prior snapshot (`None` removes the entry).
  pub fn restore(&mut self, key: &str, snapshot: Option<CacheEntry>) {
    match snapshot {
      Some(entry) => {
        self.entries.insert(key.to_string(), entry);
      }
      None => {
        self.entries.remove(key);
      }
    }
  }

  /// Mark a fetch as in flight. Idempotent if already pending; existing
  /// data is retained so stale values stay servable during revalidation.
  pub fn begin(&mut self, key: &str) {
    let entry = self
      .entries
      .entry(key.to_string())
      .or_insert_with(|| CacheEntry::idle(self.default_stale_after));
    entry.status = FetchStatus::Pending;
  }

  /// Record a successful fetch that started at `started_at`.
  ///
  /// Returns false (and leaves the entry untouched) when the entry
  /// already holds a result from a later-started fetch: the winner is
  /// the latest fetch time, not the latest arrival.
  pub fn resolve(&mut self, key: &str, data: Value, started_at: DateTime<Utc>) -> bool {
    let default_stale_after = self.default_stale_after;
    let entry = self
      .entries
      .entry(key.to_string())
      .or_insert_with(|| CacheEntry::idle(default_stale_after));

    if let Some(current) = entry.fetched_at {
      if started_at < current {
        debug!(key, "dropping out-of-date resolve");
        return false;
      }
    }

    entry.status = FetchStatus::Success;
    entry.data = Some(data);
    entry.error = None;
    entry.fetched_at = Some(started_at);
    entry.stale_after = default_stale_after;
    true
  }

  /// Record a failed fetch. Prior data and its fetch time are retained
  /// (last-good-value), so a failed background refresh keeps serving the
  /// previous result with the error flagged alongside.
  pub fn fail(&mut self, key: &str, error: FetchError) {
    let entry = self
      .entries
      .entry(key.to_string())
      .or_insert_with(|| CacheEntry::idle(self.default_stale_after));
    entry.status = FetchStatus::Error;
    entry.error = Some(error);
  }

  /// Apply a data-only transformation without changing status or fetch
  /// metadata. Used for optimistic writes and list surgery.
  pub fn patch(&mut self, key: &str, f: impl FnOnce(Option<Value>) -> Option<Value>) {
    let entry = self
      .entries
      .entry(key.to_string())
      .or_insert_with(|| CacheEntry::idle(self.default_stale_after));
    entry.data = f(entry.data.take());
  }

  /// Mark the given keys stale immediately, keeping their data. The next
  /// read of an invalidated key triggers a refetch.
  pub fn invalidate<K: QueryKey>(&mut self, keys: &[K]) {
    for key in keys {
      self.invalidate_raw(&key.cache_key());
    }
  }

  pub fn invalidate_raw(&mut self, key: &str) {
    if let Some(entry) = self.entries.get_mut(key) {
      entry.stale_after = Duration::zero();
      debug!(key, "invalidated");
    }
  }

  /// Invalidate every entry whose canonical key matches the predicate.
  /// Lets one mutation invalidate a family of related reads (e.g. all
  /// history pages, regardless of parameters).
  pub fn invalidate_where(&mut self, pred: impl Fn(&str) -> bool) {
    for (key, entry) in self.entries.iter_mut() {
      if pred(key) {
        entry.stale_after = Duration::zero();
        debug!(key, "invalidated by predicate");
      }
    }
  }

  /// Reset the ledger to empty and bump the generation so in-flight
  /// results are discarded on arrival.
  pub fn clear(&mut self) {
    self.entries.clear();
    self.generation += 1;
    debug!(generation = self.generation, "ledger cleared");
  }

  /// Seed an entry from a restored snapshot. First successful write per
  /// key wins: a key already populated by a live fetch is left alone so
  /// a slow disk read cannot clobber a fast network response.
  pub fn seed(&mut self, key: String, entry: CacheEntry) -> bool {
    match self.entries.get(&key) {
      Some(existing) if existing.has_data() => false,
      _ => {
        self.entries.insert(key, entry);
        true
      }
    }
  }

  /// Drop entries whose data has outlived the retention window, bounding
  /// ledger growth across long sessions.
  pub fn evict_older_than(&mut self, cutoff: DateTime<Utc>) {
    self.entries.retain(|_, entry| match entry.fetched_at {
      Some(fetched_at) => fetched_at >= cutoff,
      // Entries without a fetch time are in-flight or optimistic; keep.
      None => true,
    });
  }

  pub fn entries(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn ledger() -> CacheLedger {
    CacheLedger::new(Duration::minutes(5))
  }

  #[test]
  fn test_resolve_produces_fresh_entry() {
    let mut ledger = ledger();
    ledger.begin("templates:list");
    ledger.resolve("templates:list", json!([{"id": 1, "name": "Push"}]), Utc::now());

    let entry = ledger.read("templates:list");
    assert_eq!(entry.status, FetchStatus::Success);
    assert_eq!(entry.data, Some(json!([{"id": 1, "name": "Push"}])));
    // Freshly resolved entries are never immediately stale.
    assert!(!entry.is_stale());
  }

  #[test]
  fn test_fail_keeps_last_good_data() {
    let mut ledger = ledger();
    let first_fetch = Utc::now();
    ledger.resolve("templates:list", json!([1, 2]), first_fetch);
    ledger.fail(
      "templates:list",
      FetchError::Transport("connection reset".into()),
    );

    let entry = ledger.read("templates:list");
    assert_eq!(entry.status, FetchStatus::Error);
    assert!(entry.error.is_some());
    // Stale data remains servable after a failed background refresh.
    assert_eq!(entry.data, Some(json!([1, 2])));
    assert_eq!(entry.fetched_at, Some(first_fetch));
  }

  #[test]
  fn test_out_of_order_resolve_is_dropped() {
    let mut ledger = ledger();
    let t0 = Utc::now();
    let t1 = t0 + Duration::seconds(1);

    // The fetch started at t1 finishes first.
    assert!(ledger.resolve("templates:list", json!(["newer"]), t1));
    // The older fetch's result arrives late and must lose.
    assert!(!ledger.resolve("templates:list", json!(["older"]), t0));

    let entry = ledger.read("templates:list");
    assert_eq!(entry.data, Some(json!(["newer"])));
    assert_eq!(entry.fetched_at, Some(t1));
  }

  #[test]
  fn test_invalidate_marks_stale_but_keeps_data() {
    let mut ledger = ledger();
    ledger.resolve("templates:list", json!([1]), Utc::now());
    assert!(!ledger.read("templates:list").is_stale());

    ledger.invalidate_raw("templates:list");

    let entry = ledger.read("templates:list");
    assert!(entry.is_stale());
    assert_eq!(entry.status, FetchStatus::Success);
    assert_eq!(entry.data, Some(json!([1])));
  }

  #[test]
  fn test_invalidate_where_matches_family() {
    let mut ledger = ledger();
    let now = Utc::now();
    ledger.resolve("templates:list", json!([]), now);
    ledger.resolve("templates:detail:7", json!({}), now);
    ledger.resolve("exercises:catalog", json!([]), now);

    ledger.invalidate_where(|key| key.starts_with("templates:"));

    assert!(ledger.read("templates:list").is_stale());
    assert!(ledger.read("templates:detail:7").is_stale());
    assert!(!ledger.read("exercises:catalog").is_stale());
  }

  #[test]
  fn test_patch_preserves_status_and_metadata() {
    let mut ledger = ledger();
    let fetched = Utc::now();
    ledger.resolve("templates:list", json!([{"id": 1}]), fetched);

    ledger.patch("templates:list", |data| {
      let mut items = match data {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
      };
      items.push(json!({"id": 99}));
      Some(Value::Array(items))
    });

    let entry = ledger.read("templates:list");
    assert_eq!(entry.status, FetchStatus::Success);
    assert_eq!(entry.fetched_at, Some(fetched));
    assert_eq!(entry.data, Some(json!([{"id": 1}, {"id": 99}])));
  }

  #[test]
  fn test_begin_is_idempotent_and_keeps_data() {
    let mut ledger = ledger();
    ledger.resolve("templates:list", json!([1]), Utc::now());
    ledger.begin("templates:list");
    ledger.begin("templates:list");

    let entry = ledger.read("templates:list");
    assert_eq!(entry.status, FetchStatus::Pending);
    assert_eq!(entry.data, Some(json!([1])));
  }

  #[test]
  fn test_clear_empties_and_bumps_generation() {
    let mut ledger = ledger();
    ledger.resolve("templates:list", json!([1]), Utc::now());
    let generation = ledger.generation();

    ledger.clear();

    assert!(ledger.is_empty());
    assert_eq!(ledger.generation(), generation + 1);
    let entry = ledger.read("templates:list");
    assert_eq!(entry.status, FetchStatus::Idle);
    assert!(entry.data.is_none());
  }

  #[test]
  fn test_seed_never_overwrites_live_data() {
    let mut ledger = ledger();
    ledger.resolve("templates:list", json!(["live"]), Utc::now());

    let mut restored = CacheEntry::idle(Duration::minutes(5));
    restored.status = FetchStatus::Success;
    restored.data = Some(json!(["from disk"]));
    restored.fetched_at = Some(Utc::now() - Duration::hours(1));

    assert!(!ledger.seed("templates:list".into(), restored.clone()));
    assert_eq!(ledger.read("templates:list").data, Some(json!(["live"])));

    assert!(ledger.seed("exercises:catalog".into(), restored));
    assert!(ledger.read("exercises:catalog").has_data());
  }

  #[test]
  fn test_evict_older_than() {
    let mut ledger = ledger();
    let now = Utc::now();
    ledger.resolve("old", json!(1), now - Duration::days(10));
    ledger.resolve("recent", json!(2), now);
    ledger.begin("inflight");

    ledger.evict_older_than(now - Duration::days(7));

    assert_eq!(ledger.read("old").status, FetchStatus::Idle);
    assert!(ledger.read("recent").has_data());
    assert_eq!(ledger.read("inflight").status, FetchStatus::Pending);
  }
}
