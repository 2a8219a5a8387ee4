//! Configuration for the client data core.
//!
//! A YAML file carries the API endpoint and cache tuning; the API token
//! comes from the environment so it never lands in a config file synced
//! between devices.

use std::path::{Path, PathBuf};

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the LiftLog API, e.g. `https://api.liftlog.app`.
  pub url: String,
}

/// Cache tuning. Every field has a default, so the whole section can be
/// omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds before a resolved entry counts as stale.
  pub stale_after_secs: u64,
  /// Persisted snapshots older than this are discarded at startup.
  pub snapshot_max_age_days: i64,
  /// Debounce window for coalescing snapshot writes.
  pub save_debounce_ms: u64,
  #[serde(default)]
  pub retry: RetryConfig,
}

/// Seconds before a resolved entry counts as stale.
/// 5 minutes balances freshness against refetching on every screen
/// visit; matches the server's own cache headers for list endpoints.
const DEFAULT_STALE_AFTER_SECS: u64 = 300;

/// Persisted snapshots older than a week describe a routine the user
/// has likely moved past; start clean instead.
const DEFAULT_SNAPSHOT_MAX_AGE_DAYS: i64 = 7;

/// Debounce for snapshot writes. 1s coalesces a burst of set-by-set
/// edits during a workout into one write.
const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_after_secs: DEFAULT_STALE_AFTER_SECS,
      snapshot_max_age_days: DEFAULT_SNAPSHOT_MAX_AGE_DAYS,
      save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
      retry: RetryConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub base_delay_ms: u64,
  pub read_delay_cap_ms: u64,
  /// Lower than the read cap: a user is usually watching a mutation.
  pub mutation_delay_cap_ms: u64,
  pub max_read_retries: u32,
  /// Fewer than reads; replaying a write is riskier than replaying a
  /// read.
  pub max_mutation_retries: u32,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      base_delay_ms: 500,
      read_delay_cap_ms: 8000,
      mutation_delay_cap_ms: 2000,
      max_read_retries: 3,
      max_mutation_retries: 2,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./liftlog.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/liftlog/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/liftlog/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("liftlog.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("liftlog").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the API token from environment variables.
  pub fn get_api_token() -> Result<String> {
    std::env::var("LIFTLOG_API_TOKEN")
      .map_err(|_| eyre!("API token not found. Set the LIFTLOG_API_TOKEN environment variable."))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_defaults() {
    let cache = CacheConfig::default();
    assert_eq!(cache.stale_after_secs, 300);
    assert_eq!(cache.snapshot_max_age_days, 7);
    assert_eq!(cache.retry.max_read_retries, 3);
    assert_eq!(cache.retry.max_mutation_retries, 2);
    assert!(cache.retry.mutation_delay_cap_ms < cache.retry.read_delay_cap_ms);
  }

  #[test]
  fn test_parse_minimal_config() {
    let config: Config = serde_yaml::from_str("api:\n  url: https://api.liftlog.app\n").unwrap();
    assert_eq!(config.api.url, "https://api.liftlog.app");
    // The cache section falls back to defaults wholesale.
    assert_eq!(config.cache.stale_after_secs, 300);
  }

  #[test]
  fn test_parse_partial_cache_overrides() {
    let yaml = r#"
api:
  url: https://staging.liftlog.app
cache:
  stale_after_secs: 60
  retry:
    max_read_retries: 1
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.api.url, "https://staging.liftlog.app");
    assert_eq!(config.cache.stale_after_secs, 60);
    // Unset fields keep their defaults.
    assert_eq!(config.cache.save_debounce_ms, 1000);
    assert_eq!(config.cache.retry.max_read_retries, 1);
    assert_eq!(config.cache.retry.max_mutation_retries, 2);
  }
}
