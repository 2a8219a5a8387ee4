//! LiftLog domain: query keys, models, API client, and the cached
//! store the UI shells talk to.

pub mod client;
pub mod keys;
pub mod store;
pub mod types;

pub use client::ApiClient;
pub use keys::{is_history_query, is_template_query, WorkoutQueryKey};
pub use store::WorkoutStore;
