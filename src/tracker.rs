//! Activity tracker integration for burned-calorie sync
//!
//! Handles OAuth against the tracker cloud API and fetches daily activity
//! summaries. The tracker is authoritative for burned calories; the engine
//! overwrites its stored value with whatever comes back here.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::{Read, Write};
use std::net::TcpListener;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const TRACKER_AUTH_URL: &str = "https://cloud.fittrack.example/oauth/authorize";
const TRACKER_TOKEN_URL: &str = "https://api.fittrack.example/oauth/token";
const TRACKER_API_BASE: &str = "https://api.fittrack.example/v1";
const REDIRECT_PORT: u16 = 8765;
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// ---------------------------------------------------------------------------
/// OAuth Data Structures
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrackerConfig {
  pub client_id: String,
  pub client_secret: String,
  pub redirect_uri: String,
}

impl TrackerConfig {
  pub fn from_env() -> Result<Self, TrackerError> {
    Ok(Self {
      client_id: env::var("TRACKER_CLIENT_ID")
        .map_err(|_| TrackerError::MissingConfig("TRACKER_CLIENT_ID".into()))?,
      client_secret: env::var("TRACKER_CLIENT_SECRET")
        .map_err(|_| TrackerError::MissingConfig("TRACKER_CLIENT_SECRET".into()))?,
      redirect_uri: format!("http://localhost:{}/callback", REDIRECT_PORT),
    })
  }
}

/// Response from the tracker token endpoint
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_in: i64, // seconds
  pub token_type: String,
}

/// Stored token state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerTokens {
  pub access_token: String,
  pub refresh_token: String,
  pub expires_at: DateTime<Utc>,
}

impl TrackerTokens {
  pub fn from_response(resp: TokenResponse) -> Self {
    let expires_at = Utc::now() + Duration::seconds(resp.expires_in);
    Self {
      access_token: resp.access_token,
      refresh_token: resp.refresh_token,
      expires_at,
    }
  }

  pub fn needs_refresh(&self) -> bool {
    let buffer = Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES);
    Utc::now() + buffer >= self.expires_at
  }
}

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TrackerError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(String),

  #[error("OAuth error: {0}")]
  OAuth(String),

  #[error("Callback server error: {0}")]
  Server(String),

  #[error("Database error: {0}")]
  Database(String),

  #[error("API error: {0}")]
  Api(String),
}

impl From<reqwest::Error> for TrackerError {
  fn from(e: reqwest::Error) -> Self {
    TrackerError::Request(e.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// OAuth URL Generation
/// ---------------------------------------------------------------------------

pub fn build_auth_url(config: &TrackerConfig) -> Result<String, TrackerError> {
  let mut url =
    url::Url::parse(TRACKER_AUTH_URL).map_err(|e| TrackerError::OAuth(e.to_string()))?;

  url
    .query_pairs_mut()
    .append_pair("client_id", &config.client_id)
    .append_pair("redirect_uri", &config.redirect_uri)
    .append_pair("response_type", "code")
    .append_pair("scope", "activity:read");

  Ok(url.to_string())
}

/// ---------------------------------------------------------------------------
/// Token Exchange (Authorization Code -> Tokens)
/// ---------------------------------------------------------------------------

pub async fn exchange_code_for_tokens(
  config: &TrackerConfig,
  code: &str,
) -> Result<TrackerTokens, TrackerError> {
  let client = Client::new();

  let response = client
    .post(TRACKER_TOKEN_URL)
    .form(&[
      ("client_id", config.client_id.as_str()),
      ("client_secret", config.client_secret.as_str()),
      ("code", code),
      ("grant_type", "authorization_code"),
      ("redirect_uri", config.redirect_uri.as_str()),
    ])
    .send()
    .await?;

  if !response.status().is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(TrackerError::OAuth(format!(
      "Token exchange failed: {}",
      error_text
    )));
  }

  let token_response: TokenResponse = response.json().await?;
  Ok(TrackerTokens::from_response(token_response))
}

/// ---------------------------------------------------------------------------
/// Token Refresh
/// ---------------------------------------------------------------------------

pub async fn refresh_tokens(
  config: &TrackerConfig,
  refresh_token: &str,
) -> Result<TrackerTokens, TrackerError> {
  let client = Client::new();

  let response = client
    .post(TRACKER_TOKEN_URL)
    .form(&[
      ("client_id", config.client_id.as_str()),
      ("client_secret", config.client_secret.as_str()),
      ("refresh_token", refresh_token),
      ("grant_type", "refresh_token"),
    ])
    .send()
    .await?;

  if !response.status().is_success() {
    let error_text = response.text().await.unwrap_or_default();
    return Err(TrackerError::OAuth(format!(
      "Token refresh failed: {}",
      error_text
    )));
  }

  let token_response: TokenResponse = response.json().await?;
  Ok(TrackerTokens::from_response(token_response))
}

/// ---------------------------------------------------------------------------
/// OAuth Callback Server
/// ---------------------------------------------------------------------------

pub struct CallbackResult {
  pub code: String,
}

pub fn wait_for_callback() -> Result<CallbackResult, String> {
  let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
    .map_err(|e| format!("Failed to bind: {}", e))?;

  println!("Listening for OAuth callback on port {}...", REDIRECT_PORT);

  // Accept one connection
  let mut stream = listener
    .incoming()
    .next()
    .ok_or_else(|| "No connection received".to_string())?
    .map_err(|e| format!("Connection error: {}", e))?;

  // Read HTTP request
  let mut buffer = [0; 1024];
  let bytes_read = stream
    .read(&mut buffer)
    .map_err(|e| format!("Failed to read: {}", e))?;

  let request = String::from_utf8_lossy(&buffer[..bytes_read]);

  // Extract code from query string
  let code = request
    .lines()
    .next()
    .and_then(|line| {
      // Parse "GET /callback?code=XXX HTTP/1.1"
      let parts: Vec<&str> = line.split_whitespace().collect();
      if parts.len() >= 2 {
        let path = parts[1];
        if let Some(query_start) = path.find('?') {
          let query = &path[query_start + 1..];
          for pair in query.split('&') {
            let kv: Vec<&str> = pair.split('=').collect();
            if kv.len() == 2 && kv[0] == "code" {
              return Some(kv[1].to_string());
            }
          }
        }
      }
      None
    })
    .ok_or_else(|| "No code in callback".to_string())?;

  // Send success response
  let response = "HTTP/1.1 200 OK\r\n\r\n<html><body><h1>Tracker Connected!</h1><p>You can close this window.</p></body></html>";
  stream
    .write_all(response.as_bytes())
    .map_err(|e| format!("Failed to write response: {}", e))?;

  println!("Received authorization code");

  Ok(CallbackResult { code })
}

/// ---------------------------------------------------------------------------
/// Daily Activity Summary
/// ---------------------------------------------------------------------------

/// One day of activity from the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
  pub day: String, // ISO date (YYYY-MM-DD)
  pub active_calories: i32,
  pub total_calories: Option<i32>,
  pub steps: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DailySummaryResponse {
  data: Vec<DailySummary>,
}

/// Fetch the activity summary for one date. A 404 means the tracker has no
/// data for that day yet (watch not synced), which is normal, not an error.
pub async fn fetch_daily_summary(
  access_token: &str,
  date: NaiveDate,
) -> Result<Option<DailySummary>, TrackerError> {
  fetch_daily_summary_from(TRACKER_API_BASE, access_token, date).await
}

async fn fetch_daily_summary_from(
  api_base: &str,
  access_token: &str,
  date: NaiveDate,
) -> Result<Option<DailySummary>, TrackerError> {
  let client = Client::new();
  let url = format!("{}/daily_activity?day={}", api_base, date);

  let response = client.get(&url).bearer_auth(access_token).send().await?;

  if response.status() == StatusCode::NOT_FOUND {
    return Ok(None);
  }
  if !response.status().is_success() {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    return Err(TrackerError::Api(format!(
      "Daily activity API error {}: {}",
      status, error_text
    )));
  }

  let summary: DailySummaryResponse = response.json().await?;
  Ok(summary.data.into_iter().next())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn test_build_auth_url_contains_params() {
    let config = TrackerConfig {
      client_id: "abc123".to_string(),
      client_secret: "secret".to_string(),
      redirect_uri: "http://localhost:8765/callback".to_string(),
    };

    let url = build_auth_url(&config).unwrap();
    assert!(url.contains("client_id=abc123"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("scope=activity%3Aread"));
    assert!(!url.contains("secret"));
  }

  #[test]
  fn test_config_from_env_missing() {
    temp_env::with_vars_unset(["TRACKER_CLIENT_ID", "TRACKER_CLIENT_SECRET"], || {
      let result = TrackerConfig::from_env();
      assert!(matches!(result, Err(TrackerError::MissingConfig(_))));
    });
  }

  #[test]
  fn test_needs_refresh_near_expiry() {
    let fresh = TrackerTokens {
      access_token: "a".to_string(),
      refresh_token: "r".to_string(),
      expires_at: Utc::now() + Duration::hours(2),
    };
    assert!(!fresh.needs_refresh());

    let stale = TrackerTokens {
      access_token: "a".to_string(),
      refresh_token: "r".to_string(),
      expires_at: Utc::now() + Duration::minutes(2),
    };
    assert!(stale.needs_refresh());
  }

  #[tokio::test]
  async fn test_fetch_daily_summary_parses_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/daily_activity?day=2025-03-12")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        r#"{"data": [{"day": "2025-03-12", "active_calories": 420, "total_calories": 2450, "steps": 9200}]}"#,
      )
      .create_async()
      .await;

    let summary = fetch_daily_summary_from(&server.url(), "token", date(2025, 3, 12))
      .await
      .unwrap()
      .unwrap();

    assert_eq!(summary.active_calories, 420);
    assert_eq!(summary.steps, Some(9200));
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_fetch_daily_summary_404_is_none() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/daily_activity?day=2025-03-12")
      .with_status(404)
      .create_async()
      .await;

    let summary = fetch_daily_summary_from(&server.url(), "token", date(2025, 3, 12))
      .await
      .unwrap();
    assert!(summary.is_none());
  }

  #[tokio::test]
  async fn test_fetch_daily_summary_server_error() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/daily_activity?day=2025-03-12")
      .with_status(500)
      .with_body("boom")
      .create_async()
      .await;

    let result = fetch_daily_summary_from(&server.url(), "token", date(2025, 3, 12)).await;
    assert!(matches!(result, Err(TrackerError::Api(_))));
  }
}
