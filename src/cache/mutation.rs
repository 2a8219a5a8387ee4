//! Optimistic mutations: apply a speculative patch, commit the real
//! request, reconcile on settle.
//!
//! The rollback/invalidate protocol is implemented once, here, instead
//! of being hand-written per call site. Rollback restores the full
//! pre-mutation snapshot of every target key.

use std::future::Future;

use serde_json::Value;
use tracing::{debug, warn};

use super::layer::Cache;
use super::retry::OpKind;
use super::traits::{CacheEntry, QueryKey};
use crate::error::FetchError;

type PatchFn = Box<dyn Fn(Option<Value>) -> Option<Value> + Send + Sync>;

/// A mutation: the read keys it affects plus the optimistic patch
/// applied to each of them while the commit is in flight.
///
/// The patch receives each target's current data snapshot and returns
/// the speculative replacement. Targets with differently-shaped data
/// (a list and a detail entry, say) are handled by matching on the
/// shape inside the patch.
pub struct Mutation<K> {
  targets: Vec<K>,
  patch: PatchFn,
}

impl<K: QueryKey> Mutation<K> {
  pub fn new(
    targets: Vec<K>,
    patch: impl Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
  ) -> Self {
    Self {
      targets,
      patch: Box::new(patch),
    }
  }

  /// Mutation affecting a single read key.
  pub fn single(
    target: K,
    patch: impl Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
  ) -> Self {
    Self::new(vec![target], patch)
  }

  pub fn targets(&self) -> &[K] {
    &self.targets
  }
}

impl Cache {
  /// Perform an optimistic mutation.
  ///
  /// 1. Snapshot every target key, synchronously, before any suspension.
  /// 2. Apply the optimistic patch to each target.
  /// 3. Await the commit under the retry policy's mutation limits; by
  ///    the time an error reaches the failure branch here, retryability
  ///    has already been exhausted or excluded.
  /// 4. Success: keep the patch. Failure: restore every target to its
  ///    full pre-mutation snapshot. A concurrent edit to a target made
  ///    during a failed commit window is rolled back with it - known
  ///    limitation; the settle invalidation below re-syncs from the
  ///    server either way.
  /// 5. Both branches invalidate all targets, so the next read
  ///    reconciles with server truth rather than trusting the guess.
  ///
  /// A commit that settles after a sign-out wipe leaves the ledger
  /// alone; its result is still returned to the caller. There is no
  /// coordinator-level in-flight guard: once settled, an identical
  /// retry is accepted (debouncing double-taps is the UI's concern).
  pub async fn mutate<K, C, Fut>(
    &self,
    mutation: Mutation<K>,
    commit: C,
  ) -> Result<Value, FetchError>
  where
    K: QueryKey,
    C: Fn() -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
  {
    let keys: Vec<String> = mutation.targets.iter().map(|k| k.cache_key()).collect();

    let (rollback, generation) = {
      let mut ledger = self.ledger();
      let rollback: Vec<(String, Option<CacheEntry>)> = keys
        .iter()
        .map(|key| (key.clone(), ledger.snapshot(key)))
        .collect();
      for key in &keys {
        ledger.patch(key, |data| (mutation.patch)(data));
      }
      (rollback, ledger.generation())
    };
    self.notify_change();
    debug!(targets = keys.len(), "optimistic patch applied, committing");

    let result = self.retry().run(OpKind::Mutation, commit).await;

    {
      let mut ledger = self.ledger();
      if ledger.generation() != generation {
        debug!("mutation settled after cache clear, result discarded");
        return result;
      }

      if let Err(error) = &result {
        warn!(error = %error, "commit failed, rolling back optimistic patch");
        for (key, snapshot) in rollback {
          ledger.restore(&key, snapshot);
        }
      }

      // Settle: invalidate on success and failure alike, so the ledger
      // resynchronizes with the server's authoritative state.
      for key in &keys {
        ledger.invalidate_raw(key);
      }
    }
    self.notify_change();
    self.schedule_save();

    result
  }
}
