//! Query keys for LiftLog data.

use crate::cache::QueryKey;

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for LiftLog API reads.
///
/// Keys are structural: two values with the same variant and fields
/// denote the same logical query. Canonical forms share a prefix per
/// resource family so one mutation can invalidate every related read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkoutQueryKey {
  /// All templates for the current user
  TemplateList,
  /// A single template by id
  TemplateById { id: u64 },
  /// Paged workout history
  WorkoutHistory { page: u32 },
  /// The exercise catalog
  ExerciseCatalog,
  /// Aggregate profile statistics
  ProfileStats,
}

impl QueryKey for WorkoutQueryKey {
  fn cache_key(&self) -> String {
    match self {
      Self::TemplateList => "templates:list".to_string(),
      Self::TemplateById { id } => format!("templates:detail:{}", id),
      Self::WorkoutHistory { page } => format!("workouts:history:{}", page),
      Self::ExerciseCatalog => "exercises:catalog".to_string(),
      Self::ProfileStats => "profile:stats".to_string(),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::TemplateList => "template list".to_string(),
      Self::TemplateById { id } => format!("template {}", id),
      Self::WorkoutHistory { page } => format!("workout history page {}", page),
      Self::ExerciseCatalog => "exercise catalog".to_string(),
      Self::ProfileStats => "profile stats".to_string(),
    }
  }
}

// ============================================================================
// Family predicates for invalidation
// ============================================================================

/// Matches every template query (list and details, any id).
pub fn is_template_query(cache_key: &str) -> bool {
  cache_key.starts_with("templates:")
}

/// Matches every history page, regardless of page number.
pub fn is_history_query(cache_key: &str) -> bool {
  cache_key.starts_with("workouts:history:")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keys_are_structural() {
    assert_eq!(
      WorkoutQueryKey::TemplateById { id: 7 }.cache_key(),
      WorkoutQueryKey::TemplateById { id: 7 }.cache_key()
    );
    assert_ne!(
      WorkoutQueryKey::TemplateById { id: 7 }.cache_key(),
      WorkoutQueryKey::TemplateById { id: 8 }.cache_key()
    );
    assert_ne!(
      WorkoutQueryKey::TemplateList.cache_key(),
      WorkoutQueryKey::ExerciseCatalog.cache_key()
    );
  }

  #[test]
  fn test_template_family_predicate() {
    assert!(is_template_query(
      &WorkoutQueryKey::TemplateList.cache_key()
    ));
    assert!(is_template_query(
      &WorkoutQueryKey::TemplateById { id: 3 }.cache_key()
    ));
    assert!(!is_template_query(
      &WorkoutQueryKey::ExerciseCatalog.cache_key()
    ));
    assert!(!is_template_query(
      &WorkoutQueryKey::WorkoutHistory { page: 0 }.cache_key()
    ));
  }

  #[test]
  fn test_history_family_predicate() {
    assert!(is_history_query(
      &WorkoutQueryKey::WorkoutHistory { page: 0 }.cache_key()
    ));
    assert!(is_history_query(
      &WorkoutQueryKey::WorkoutHistory { page: 12 }.cache_key()
    ));
    assert!(!is_history_query(
      &WorkoutQueryKey::TemplateList.cache_key()
    ));
  }
}
