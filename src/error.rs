//! Error taxonomy for fetch and commit operations.
//!
//! Every failure that can reach a cache entry is classified into one of
//! three buckets: the server rejected the request (terminal), the server
//! failed (transient), or the request never got a response (transient).
//! The retry policy keys off this classification.

use thiserror::Error;

/// Maximum length for response bodies carried inside error values.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Classified failure of a fetch or commit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
  /// The server explicitly rejected the request (4xx-class: bad input,
  /// unauthorized). Never retried.
  #[error("request rejected ({status}): {message}")]
  Rejected { status: u16, message: String },

  /// The server failed or is unavailable (5xx-class, rate limiting).
  #[error("server error ({status}): {message}")]
  Upstream { status: u16, message: String },

  /// Connection-level failure: timeout, DNS, refused connection.
  #[error("transport error: {0}")]
  Transport(String),
}

impl FetchError {
  /// Truncate a response body so error values stay log-friendly.
  fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
      body.to_string()
    } else {
      let mut end = MAX_ERROR_BODY_LENGTH;
      while !body.is_char_boundary(end) {
        end -= 1;
      }
      format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
  }

  /// Classify an HTTP status + body into an error value.
  pub fn from_status(status: u16, body: &str) -> Self {
    let message = Self::truncate_body(body);
    match status {
      400..=499 => FetchError::Rejected { status, message },
      500..=599 => FetchError::Upstream { status, message },
      // Anything else on a JSON API is a misconfigured endpoint; treat it
      // as terminal so we do not hammer it with retries.
      _ => FetchError::Rejected { status, message },
    }
  }

  /// Whether retrying this error class can ever help.
  pub fn is_transient(&self) -> bool {
    !matches!(self, FetchError::Rejected { .. })
  }
}

impl From<reqwest::Error> for FetchError {
  fn from(err: reqwest::Error) -> Self {
    FetchError::Transport(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_status_classification() {
    assert!(matches!(
      FetchError::from_status(400, "bad input"),
      FetchError::Rejected { status: 400, .. }
    ));
    assert!(matches!(
      FetchError::from_status(401, ""),
      FetchError::Rejected { status: 401, .. }
    ));
    assert!(matches!(
      FetchError::from_status(503, "down"),
      FetchError::Upstream { status: 503, .. }
    ));
  }

  #[test]
  fn test_transience() {
    assert!(!FetchError::from_status(422, "").is_transient());
    assert!(FetchError::from_status(500, "").is_transient());
    assert!(FetchError::Transport("timed out".into()).is_transient());
  }

  #[test]
  fn test_body_truncation() {
    let long_body = "x".repeat(2000);
    let err = FetchError::from_status(500, &long_body);
    let FetchError::Upstream { message, .. } = err else {
      panic!("expected upstream error");
    };
    assert!(message.len() < 600);
    assert!(message.contains("truncated"));
  }
}
