//! Session identity and the sign-out invalidator.
//!
//! Identity lifecycle is owned by an external session source; the cache
//! only observes transitions. The single transition that matters is
//! sign-out: the ledger and the persisted snapshot are wiped before any
//! next sign-in can observe them, which is what prevents one account's
//! cached data leaking into another's session. Every other transition
//! is a cache no-op - a fresh sign-in starts from whatever is persisted,
//! which is safe precisely because sign-out always wiped first.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::layer::Cache;

/// The signed-in principal as reported by the session source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
  /// No one is signed in.
  Anonymous,
  /// A signed-in principal, identified by an opaque token.
  SignedIn(String),
}

impl Identity {
  pub fn is_signed_in(&self) -> bool {
    matches!(self, Identity::SignedIn(_))
  }
}

/// Whether a transition is a sign-out.
pub fn is_sign_out(previous: &Identity, current: &Identity) -> bool {
  previous.is_signed_in() && !current.is_signed_in()
}

/// Subscribe a cache to a session source's identity stream.
///
/// The returned task runs until the sender side is dropped, forwarding
/// each transition to [`Cache::handle_identity_change`].
pub fn spawn_invalidator(
  cache: Cache,
  mut identities: watch::Receiver<Identity>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut previous = identities.borrow().clone();
    while identities.changed().await.is_ok() {
      let current = identities.borrow().clone();
      debug!(?previous, ?current, "identity transition");
      cache.handle_identity_change(&previous, &current);
      previous = current;
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::traits::{FetchStatus, QueryKey};
  use crate::config::CacheConfig;
  use crate::store::MemoryStore;
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;

  struct Key(&'static str);

  impl QueryKey for Key {
    fn cache_key(&self) -> String {
      self.0.to_string()
    }

    fn description(&self) -> String {
      self.0.to_string()
    }
  }

  #[test]
  fn test_sign_out_detection() {
    let alice = Identity::SignedIn("alice".into());
    let bob = Identity::SignedIn("bob".into());

    assert!(is_sign_out(&alice, &Identity::Anonymous));
    assert!(!is_sign_out(&Identity::Anonymous, &alice));
    assert!(!is_sign_out(&Identity::Anonymous, &Identity::Anonymous));
    // Account switches go through an explicit sign-out first; a direct
    // signed-in to signed-in transition is not one.
    assert!(!is_sign_out(&alice, &bob));
  }

  #[tokio::test]
  async fn test_invalidator_wipes_on_sign_out() {
    let cache = Cache::new(&CacheConfig::default(), Arc::new(MemoryStore::new()));
    cache
      .refetch(&Key("templates"), || async { Ok(json!([{"id": 1}])) })
      .await;

    let (tx, rx) = watch::channel(Identity::SignedIn("alice".into()));
    let invalidator = spawn_invalidator(cache.clone(), rx);

    tx.send(Identity::Anonymous).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let entry = cache.read(&Key("templates"));
    assert_eq!(entry.status, FetchStatus::Idle);
    assert!(entry.data.is_none());

    drop(tx);
    invalidator.await.unwrap();
  }

  #[tokio::test]
  async fn test_invalidator_ignores_sign_in() {
    let cache = Cache::new(&CacheConfig::default(), Arc::new(MemoryStore::new()));
    cache
      .refetch(&Key("templates"), || async { Ok(json!([{"id": 1}])) })
      .await;

    let (tx, rx) = watch::channel(Identity::Anonymous);
    let invalidator = spawn_invalidator(cache.clone(), rx);

    tx.send(Identity::SignedIn("alice".into())).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(cache.read(&Key("templates")).has_data());

    drop(tx);
    invalidator.await.unwrap();
  }
}
