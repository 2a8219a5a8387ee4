//! Client-side data core for LiftLog, shared by the web and mobile
//! shells.
//!
//! Almost everything about the product is view code; this crate is the
//! part with correctness stakes: a local cache of server-derived data
//! that serves stale-but-fast reads, applies optimistic writes and rolls
//! them back on failure, survives restarts through durable snapshots,
//! and is wiped deterministically when the signed-in identity changes.
//!
//! Construct a [`Cache`] with a [`store::SnapshotStore`] backend and
//! hand it to a [`workout::WorkoutStore`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use liftlog_core::cache::{spawn_invalidator, Cache};
//! use liftlog_core::config::Config;
//! use liftlog_core::store::SqliteStore;
//! use liftlog_core::workout::{ApiClient, WorkoutStore};
//!
//! # fn session_identities() -> tokio::sync::watch::Receiver<liftlog_core::cache::Identity> { unimplemented!() }
//! # #[tokio::main]
//! # async fn main() -> color_eyre::Result<()> {
//! let config = Config::load(None)?;
//! let store = Arc::new(SqliteStore::open_default()?);
//! let cache = Cache::new(&config.cache, store);
//! cache.restore();
//!
//! let api = ApiClient::new(&config.api)?.with_token(Config::get_api_token()?);
//! let workouts = WorkoutStore::new(cache.clone(), api);
//!
//! // Wire the session source's identity stream to the cache.
//! let _invalidator = spawn_invalidator(cache.clone(), session_identities());
//!
//! let templates = workouts.templates().await;
//! println!("{:?}", templates.status);
//!
//! cache.dispose();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod workout;

pub use cache::{Cache, CacheEntry, FetchStatus, Identity, Mutation, QueryKey, RetryPolicy};
pub use error::FetchError;
