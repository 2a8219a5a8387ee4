//! Retry policy: classified, attempt-bounded exponential backoff.
//!
//! Rejections are terminal and surface immediately. Transient failures
//! (transport, 5xx-class) retry with a doubling delay under a ceiling.
//! Mutations replay server-side writes, so they get fewer attempts and a
//! lower delay ceiling than reads.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::FetchError;

/// What kind of operation is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
  Read,
  Mutation,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
  base_delay: Duration,
  read_delay_cap: Duration,
  mutation_delay_cap: Duration,
  max_read_retries: u32,
  max_mutation_retries: u32,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::from_config(&RetryConfig::default())
  }
}

impl RetryPolicy {
  pub fn from_config(config: &RetryConfig) -> Self {
    Self {
      base_delay: Duration::from_millis(config.base_delay_ms),
      read_delay_cap: Duration::from_millis(config.read_delay_cap_ms),
      mutation_delay_cap: Duration::from_millis(config.mutation_delay_cap_ms),
      max_read_retries: config.max_read_retries,
      max_mutation_retries: config.max_mutation_retries,
    }
  }

  fn max_retries(&self, kind: OpKind) -> u32 {
    match kind {
      OpKind::Read => self.max_read_retries,
      OpKind::Mutation => self.max_mutation_retries,
    }
  }

  fn delay_cap(&self, kind: OpKind) -> Duration {
    match kind {
      OpKind::Read => self.read_delay_cap,
      OpKind::Mutation => self.mutation_delay_cap,
    }
  }

  /// Whether the given failure, the `attempt`-th in a row, should be
  /// retried. Rejections never retry.
  pub fn should_retry(&self, error: &FetchError, attempt: u32, kind: OpKind) -> bool {
    error.is_transient() && attempt <= self.max_retries(kind)
  }

  /// Backoff before the `attempt`-th retry (attempts count from 1):
  /// `min(base * 2^(attempt-1), cap)`.
  pub fn delay_for(&self, attempt: u32, kind: OpKind) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = self.base_delay.saturating_mul(1u32 << exponent);
    delay.min(self.delay_cap(kind))
  }

  /// Drive an async operation through the policy, sleeping between
  /// attempts. Returns the first success or the error that exhausted
  /// (or was excluded from) retrying.
  pub async fn run<T, F, Fut>(&self, kind: OpKind, op: F) -> Result<T, FetchError>
  where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
  {
    let mut attempt = 0u32;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(error) => {
          attempt += 1;
          if !self.should_retry(&error, attempt, kind) {
            return Err(error);
          }
          let delay = self.delay_for(attempt, kind);
          warn!(
            error = %error,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "transient failure, backing off"
          );
          tokio::time::sleep(delay).await;
        }
      }
    }
  }
}
