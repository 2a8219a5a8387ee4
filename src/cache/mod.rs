//! Client-side cache core: stale-while-revalidate reads, optimistic
//! mutations, durable snapshots, and session-scoped invalidation.
//!
//! The moving parts:
//! - `CacheLedger`: the in-memory, single-writer map of query keys to
//!   entries, with deterministic tie-breaking for racing fetches
//! - `Cache`: the dependency-injected front that orchestrates fetching,
//!   persistence, and subscriptions around the ledger
//! - `Mutation`: the optimistic patch / commit / rollback protocol
//! - `RetryPolicy`: classified, attempt-bounded exponential backoff
//! - `PersistenceAdapter`: versioned snapshots in a `SnapshotStore`
//! - `Identity` + `spawn_invalidator`: sign-out wipes

mod layer;
mod ledger;
mod mutation;
mod persist;
mod retry;
mod session;
mod traits;

pub use layer::Cache;
pub use ledger::CacheLedger;
pub use mutation::Mutation;
pub use persist::{PersistenceAdapter, PersistedEntry, SNAPSHOT_KEY};
pub use retry::{OpKind, RetryPolicy};
pub use session::{is_sign_out, spawn_invalidator, Identity};
pub use traits::{CacheEntry, FetchStatus, QueryKey};
