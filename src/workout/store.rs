//! Cached access to LiftLog data: the reference consumer of the cache.
//!
//! Wraps the API client and a `Cache` instance. Reads go through
//! `Cache::query` (stale-while-revalidate); writes go through
//! `Cache::mutate` with an optimistic patch, so every screen gets the
//! same rollback/invalidate behavior without hand-writing it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{Cache, CacheEntry, Mutation};
use crate::error::FetchError;

use super::client::ApiClient;
use super::keys::WorkoutQueryKey;
use super::types::{NewTemplate, NewWorkoutLog, Template, WorkoutLog};

/// LiftLog data access with transparent caching.
#[derive(Clone)]
pub struct WorkoutStore {
  cache: Cache,
  api: ApiClient,
}

fn encode<T: Serialize>(value: &T) -> Result<Value, FetchError> {
  serde_json::to_value(value).map_err(|e| FetchError::Transport(format!("serialize: {}", e)))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, FetchError> {
  serde_json::from_value(value).map_err(|e| FetchError::Transport(format!("deserialize: {}", e)))
}

impl WorkoutStore {
  pub fn new(cache: Cache, api: ApiClient) -> Self {
    Self { cache, api }
  }

  /// The underlying cache, for subscriptions and lifecycle calls.
  pub fn cache(&self) -> &Cache {
    &self.cache
  }

  // ===== Reads =====

  pub async fn templates(&self) -> CacheEntry {
    let api = self.api.clone();
    self
      .cache
      .query(&WorkoutQueryKey::TemplateList, move || {
        let api = api.clone();
        async move { api.fetch_templates().await.and_then(|t| encode(&t)) }
      })
      .await
  }

  pub async fn template(&self, id: u64) -> CacheEntry {
    let api = self.api.clone();
    self
      .cache
      .query(&WorkoutQueryKey::TemplateById { id }, move || {
        let api = api.clone();
        async move { api.fetch_template(id).await.and_then(|t| encode(&t)) }
      })
      .await
  }

  pub async fn history(&self, page: u32) -> CacheEntry {
    let api = self.api.clone();
    self
      .cache
      .query(&WorkoutQueryKey::WorkoutHistory { page }, move || {
        let api = api.clone();
        async move { api.fetch_history(page).await.and_then(|w| encode(&w)) }
      })
      .await
  }

  pub async fn exercises(&self) -> CacheEntry {
    let api = self.api.clone();
    self
      .cache
      .query(&WorkoutQueryKey::ExerciseCatalog, move || {
        let api = api.clone();
        async move { api.fetch_exercises().await.and_then(|e| encode(&e)) }
      })
      .await
  }

  pub async fn profile_stats(&self) -> CacheEntry {
    let api = self.api.clone();
    self
      .cache
      .query(&WorkoutQueryKey::ProfileStats, move || {
        let api = api.clone();
        async move { api.fetch_profile_stats().await.and_then(|s| encode(&s)) }
      })
      .await
  }

  /// Warm the cache with the primary screens' data, concurrently.
  /// Called after sign-in and on pull-to-refresh; failures land in the
  /// individual entries rather than aborting the batch.
  pub async fn prefetch_all(&self) {
    futures::join!(
      self.templates(),
      self.exercises(),
      self.history(0),
      self.profile_stats(),
    );
  }

  // ===== Writes =====

  /// Create a template. The new template appears in the cached list
  /// immediately (with a placeholder id of 0); the settle invalidation
  /// swaps in the server's version on the next read.
  pub async fn create_template(&self, new: NewTemplate) -> Result<Template, FetchError> {
    let optimistic = encode(&Template {
      id: 0,
      name: new.name.clone(),
      exercises: new.exercises.clone(),
    })?;

    let mutation = Mutation::single(WorkoutQueryKey::TemplateList, append_to_list(optimistic));

    let api = self.api.clone();
    let committed = self
      .cache
      .mutate(mutation, move || {
        let api = api.clone();
        let payload = new.clone();
        async move { api.create_template(&payload).await.and_then(|t| encode(&t)) }
      })
      .await?;

    decode(committed)
  }

  /// Delete a template: removed from the cached list and its detail
  /// entry blanked while the delete is in flight, both restored if the
  /// server refuses.
  pub async fn delete_template(&self, id: u64) -> Result<(), FetchError> {
    let mutation = Mutation::new(
      vec![
        WorkoutQueryKey::TemplateList,
        WorkoutQueryKey::TemplateById { id },
      ],
      without_template(id),
    );

    let api = self.api.clone();
    self
      .cache
      .mutate(mutation, move || {
        let api = api.clone();
        async move { api.delete_template(id).await.map(|_| Value::Null) }
      })
      .await?;

    Ok(())
  }

  /// Log a workout. It shows up at the top of the first history page
  /// immediately; profile stats are invalidated on settle since streaks
  /// and records are computed server-side.
  pub async fn log_workout(&self, new: NewWorkoutLog) -> Result<WorkoutLog, FetchError> {
    let optimistic = encode(&WorkoutLog {
      id: 0,
      template_id: new.template_id,
      started_at: new.started_at,
      duration_secs: new.duration_secs,
      sets: new.sets.clone(),
      notes: new.notes.clone(),
    })?;

    let mutation = Mutation::new(
      vec![
        WorkoutQueryKey::WorkoutHistory { page: 0 },
        WorkoutQueryKey::ProfileStats,
      ],
      prepend_to_list(optimistic),
    );

    let api = self.api.clone();
    let committed = self
      .cache
      .mutate(mutation, move || {
        let api = api.clone();
        let payload = new.clone();
        async move { api.log_workout(&payload).await.and_then(|w| encode(&w)) }
      })
      .await?;

    decode(committed)
  }

  /// Mark one set of an in-progress workout complete, locally only.
  /// List surgery on the cached entry; the full log is committed when
  /// the workout finishes.
  pub fn toggle_set_completed(&self, page: u32, workout_id: u64, set_index: usize) {
    self
      .cache
      .patch(&WorkoutQueryKey::WorkoutHistory { page }, move |data| {
        let mut data = data?;
        if let Some(items) = data.as_array_mut() {
          for item in items {
            if item.get("id").and_then(Value::as_u64) == Some(workout_id) {
              if let Some(set) = item
                .get_mut("sets")
                .and_then(Value::as_array_mut)
                .and_then(|sets| sets.get_mut(set_index))
              {
                if let Some(completed) = set.get("completed").and_then(Value::as_bool) {
                  set["completed"] = Value::Bool(!completed);
                }
              }
            }
          }
        }
        Some(data)
      });
  }
}

// ============================================================================
// Optimistic patches
// ============================================================================

/// Append an item to a list snapshot; a missing entry becomes a
/// one-item list.
fn append_to_list(item: Value) -> impl Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static {
  move |data| {
    let mut items = match data {
      Some(Value::Array(items)) => items,
      _ => Vec::new(),
    };
    items.push(item.clone());
    Some(Value::Array(items))
  }
}

/// Prepend an item to a list snapshot. Non-list snapshots (a stats
/// object sharing the mutation's target set) pass through untouched and
/// only get the settle invalidation.
fn prepend_to_list(item: Value) -> impl Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static {
  move |data| match data {
    Some(Value::Array(mut items)) => {
      items.insert(0, item.clone());
      Some(Value::Array(items))
    }
    other => other,
  }
}

/// Remove a template from whatever shape the target holds: filtered out
/// of list snapshots, detail snapshots blanked entirely.
fn without_template(id: u64) -> impl Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static {
  move |data| match data {
    Some(Value::Array(items)) => Some(Value::Array(
      items
        .into_iter()
        .filter(|item| item.get("id").and_then(Value::as_u64) != Some(id))
        .collect(),
    )),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_append_to_list() {
    let patch = append_to_list(json!({"id": 99, "name": "Legs"}));

    assert_eq!(
      patch(Some(json!([{"id": 1}]))),
      Some(json!([{"id": 1}, {"id": 99, "name": "Legs"}]))
    );
    // A never-fetched list starts from the optimistic item alone.
    assert_eq!(patch(None), Some(json!([{"id": 99, "name": "Legs"}])));
  }

  #[test]
  fn test_prepend_leaves_non_lists_untouched() {
    let patch = prepend_to_list(json!({"id": 99}));

    assert_eq!(
      patch(Some(json!([{"id": 1}]))),
      Some(json!([{"id": 99}, {"id": 1}]))
    );
    // The stats object in the same target set is not a list; it passes
    // through and only gets invalidated on settle.
    assert_eq!(
      patch(Some(json!({"total_workouts": 12}))),
      Some(json!({"total_workouts": 12}))
    );
    assert_eq!(patch(None), None);
  }

  #[test]
  fn test_without_template_handles_both_shapes() {
    let patch = without_template(7);

    assert_eq!(
      patch(Some(json!([{"id": 7}, {"id": 8}]))),
      Some(json!([{"id": 8}]))
    );
    // The detail entry for the deleted template is blanked.
    assert_eq!(patch(Some(json!({"id": 7, "name": "Push"}))), None);
    assert_eq!(patch(None), None);
  }

  fn offline_store() -> (Cache, WorkoutStore) {
    use crate::config::{ApiConfig, CacheConfig, RetryConfig};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    let config = CacheConfig {
      retry: RetryConfig {
        base_delay_ms: 1,
        max_read_retries: 0,
        max_mutation_retries: 0,
        ..RetryConfig::default()
      },
      ..CacheConfig::default()
    };
    let cache = Cache::new(&config, Arc::new(MemoryStore::new()));
    // Nothing listens on port 1; every request fails fast with a
    // transport error.
    let api = ApiClient::new(&ApiConfig {
      url: "http://127.0.0.1:1".into(),
    })
    .expect("client builds without touching the network");
    let store = WorkoutStore::new(cache.clone(), api);
    (cache, store)
  }

  #[tokio::test]
  async fn test_toggle_set_completed_flips_the_flag() {
    let (cache, store) = offline_store();

    let key = WorkoutQueryKey::WorkoutHistory { page: 0 };
    cache
      .refetch(&key, || async {
        Ok(json!([{
          "id": 42,
          "template_id": null,
          "started_at": "2026-08-01T10:00:00Z",
          "duration_secs": 3600,
          "sets": [
            {"exercise_id": 1, "reps": 5, "weight_kg": 100.0, "completed": false}
          ],
          "notes": null
        }]))
      })
      .await;

    store.toggle_set_completed(0, 42, 0);

    let logs: Vec<WorkoutLog> = cache.read(&key).decode().unwrap();
    assert!(logs[0].sets[0].completed);

    // Toggling an index that does not exist is a no-op, not a panic.
    store.toggle_set_completed(0, 42, 5);
    let logs: Vec<WorkoutLog> = cache.read(&key).decode().unwrap();
    assert!(logs[0].sets[0].completed);
  }

  #[tokio::test]
  async fn test_prefetch_all_touches_every_primary_key() {
    use crate::cache::FetchStatus;

    let (cache, store) = offline_store();
    store.prefetch_all().await;

    // Unreachable API: every entry settles to an error, but each key
    // was attempted and carries the classified failure.
    for key in [
      WorkoutQueryKey::TemplateList,
      WorkoutQueryKey::ExerciseCatalog,
      WorkoutQueryKey::WorkoutHistory { page: 0 },
      WorkoutQueryKey::ProfileStats,
    ] {
      let entry = cache.read(&key);
      assert_eq!(entry.status, FetchStatus::Error);
      assert!(matches!(entry.error, Some(FetchError::Transport(_))));
    }
  }
}
