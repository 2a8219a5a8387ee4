//! Core types for the caching system: query keys and cache entries.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::FetchError;

/// Trait for query identifiers.
///
/// A query key names a requestable resource plus its input parameters.
/// Two keys denote the same logical query iff their canonical forms are
/// equal; equality is structural, never reference-based. Domain modules
/// define keys as tagged-union enums (see `workout::WorkoutQueryKey`).
pub trait QueryKey {
  /// Canonical string form, used internally for ledger lookups.
  ///
  /// Must be deterministic in the key's fields. Family predicates for
  /// invalidation match on this form, so related queries should share a
  /// prefix (e.g. `templates:list`, `templates:detail:7`).
  fn cache_key(&self) -> String;

  /// Human-readable label for logs.
  fn description(&self) -> String;
}

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
  /// Never fetched
  Idle,
  /// A fetch is in flight
  Pending,
  /// Last fetch succeeded; `data` is populated
  Success,
  /// Last fetch failed; prior `data` (if any) is retained
  Error,
}

/// A single ledger entry: type-erased data plus fetch metadata.
///
/// Invariants: `Success` implies `data` is populated and `error` is not;
/// `Error` implies `error` is populated. Prior data survives a failed
/// refresh so stale values stay servable.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub status: FetchStatus,
  pub data: Option<Value>,
  pub error: Option<FetchError>,
  /// When the fetch that produced `data` started.
  pub fetched_at: Option<DateTime<Utc>>,
  /// How long after `fetched_at` the entry counts as stale.
  pub stale_after: Duration,
}

impl CacheEntry {
  /// A fresh entry that has never been fetched.
  pub fn idle(stale_after: Duration) -> Self {
    Self {
      status: FetchStatus::Idle,
      data: None,
      error: None,
      fetched_at: None,
      stale_after,
    }
  }

  /// Whether the entry needs revalidation on next read.
  ///
  /// Entries with no recorded fetch time are always stale; stale entries
  /// are still servable (stale-while-revalidate).
  pub fn is_stale(&self) -> bool {
    match self.fetched_at {
      Some(fetched_at) => Utc::now() - fetched_at > self.stale_after,
      None => true,
    }
  }

  /// Whether the entry holds servable data (fresh or stale).
  pub fn has_data(&self) -> bool {
    self.data.is_some()
  }

  /// Deserialize the entry's data into a domain type.
  ///
  /// Returns `None` when there is no data or it does not match `T`'s
  /// shape (e.g. an optimistic placeholder written by a different
  /// screen's patch).
  pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
    self
      .data
      .as_ref()
      .and_then(|v| serde_json::from_value(v.clone()).ok())
  }
}
