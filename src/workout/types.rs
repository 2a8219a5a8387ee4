//! Domain models shared by the web and mobile shells.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reusable workout template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub exercises: Vec<TemplateExercise>,
}

/// One exercise slot in a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
  pub exercise_id: u64,
  pub sets: u32,
  pub reps: u32,
  /// Target weight; None for bodyweight movements
  pub weight_kg: Option<f64>,
}

/// Payload for creating a template (the server assigns the id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTemplate {
  pub name: String,
  #[serde(default)]
  pub exercises: Vec<TemplateExercise>,
}

/// Catalog entry for an exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
  pub id: u64,
  pub name: String,
  pub muscle_group: Option<String>,
}

/// One performed set inside a logged workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
  pub exercise_id: u64,
  pub reps: u32,
  pub weight_kg: f64,
  #[serde(default)]
  pub completed: bool,
}

/// A completed (or in-progress) workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutLog {
  pub id: u64,
  /// Template this workout started from, if any
  pub template_id: Option<u64>,
  pub started_at: DateTime<Utc>,
  pub duration_secs: Option<u64>,
  #[serde(default)]
  pub sets: Vec<WorkoutSet>,
  pub notes: Option<String>,
}

/// Payload for logging a workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkoutLog {
  pub template_id: Option<u64>,
  pub started_at: DateTime<Utc>,
  pub duration_secs: Option<u64>,
  #[serde(default)]
  pub sets: Vec<WorkoutSet>,
  pub notes: Option<String>,
}

/// Aggregate profile statistics computed server-side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
  pub total_workouts: u64,
  pub current_streak_days: u32,
  /// Personal records keyed by exercise name
  #[serde(default)]
  pub personal_records: Vec<PersonalRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
  pub exercise_id: u64,
  pub exercise_name: String,
  pub weight_kg: f64,
  pub achieved_at: DateTime<Utc>,
}
