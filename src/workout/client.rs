//! Typed HTTP client for the LiftLog API.
//!
//! Thin by design: each method is one endpoint returning a domain type.
//! Responses are classified into the `FetchError` taxonomy here, so the
//! retry policy and the cache see error classes, not status codes.

use std::time::Duration;

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ApiConfig;
use crate::error::FetchError;

use super::types::{
  Exercise, NewTemplate, NewWorkoutLog, ProfileStats, Template, WorkoutLog,
};

/// HTTP request timeout.
/// 30s allows slow mobile links while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for LiftLog.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  base_url: String,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()?;

    Ok(Self {
      client,
      base_url: config.url.trim_end_matches('/').to_string(),
      token: None,
    })
  }

  /// A client carrying a bearer token, sharing the connection pool.
  pub fn with_token(&self, token: String) -> Self {
    Self {
      client: self.client.clone(),
      base_url: self.base_url.clone(),
      token: Some(token),
    }
  }

  fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
    let url = format!("{}{}", self.base_url, path);
    let mut builder = self.client.request(method, url);
    if let Some(ref token) = self.token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
  }

  /// Classify a non-success response into the error taxonomy.
  async fn check(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    if response.status().is_success() {
      Ok(response)
    } else {
      let status = response.status().as_u16();
      let body = response.text().await.unwrap_or_default();
      Err(FetchError::from_status(status, &body))
    }
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
    let response = self.request(reqwest::Method::GET, path).send().await?;
    let response = Self::check(response).await?;
    Ok(response.json().await?)
  }

  async fn post<T: DeserializeOwned, B: Serialize>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, FetchError> {
    let response = self
      .request(reqwest::Method::POST, path)
      .json(body)
      .send()
      .await?;
    let response = Self::check(response).await?;
    Ok(response.json().await?)
  }

  async fn delete(&self, path: &str) -> Result<(), FetchError> {
    let response = self.request(reqwest::Method::DELETE, path).send().await?;
    Self::check(response).await?;
    Ok(())
  }

  // ===== Reads =====

  pub async fn fetch_templates(&self) -> Result<Vec<Template>, FetchError> {
    self.get("/v1/templates").await
  }

  pub async fn fetch_template(&self, id: u64) -> Result<Template, FetchError> {
    self.get(&format!("/v1/templates/{}", id)).await
  }

  pub async fn fetch_history(&self, page: u32) -> Result<Vec<WorkoutLog>, FetchError> {
    self.get(&format!("/v1/workouts?page={}", page)).await
  }

  pub async fn fetch_exercises(&self) -> Result<Vec<Exercise>, FetchError> {
    self.get("/v1/exercises").await
  }

  pub async fn fetch_profile_stats(&self) -> Result<ProfileStats, FetchError> {
    self.get("/v1/profile/stats").await
  }

  // ===== Writes =====

  pub async fn create_template(&self, template: &NewTemplate) -> Result<Template, FetchError> {
    self.post("/v1/templates", template).await
  }

  pub async fn delete_template(&self, id: u64) -> Result<(), FetchError> {
    self.delete(&format!("/v1/templates/{}", id)).await
  }

  pub async fn log_workout(&self, workout: &NewWorkoutLog) -> Result<WorkoutLog, FetchError> {
    self.post("/v1/workouts", workout).await
  }
}
