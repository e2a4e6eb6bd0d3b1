use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tauri::State;

use super::{after_mutation, persist};
use crate::db::AppState;
use crate::storage;
use crate::tracker::{
  build_auth_url, exchange_code_for_tokens, fetch_daily_summary, refresh_tokens,
  wait_for_callback, TrackerConfig,
};

/// ---------------------------------------------------------------------------
/// Start OAuth Flow
/// ---------------------------------------------------------------------------

/// Initiates tracker OAuth by returning the authorization URL.
/// Frontend should open this URL in the default browser.
#[tauri::command]
pub async fn tracker_start_auth() -> Result<String, String> {
  let config = TrackerConfig::from_env().map_err(|e| e.to_string())?;
  let auth_url = build_auth_url(&config).map_err(|e| e.to_string())?;
  Ok(auth_url)
}

/// ---------------------------------------------------------------------------
/// Wait for Callback and Exchange Code
/// ---------------------------------------------------------------------------

/// Waits for the OAuth callback, exchanges the code for tokens, and stores
/// them. This should be called immediately after tracker_start_auth.
#[tauri::command]
pub async fn tracker_complete_auth(state: State<'_, Arc<AppState>>) -> Result<(), String> {
  let config = TrackerConfig::from_env().map_err(|e| e.to_string())?;

  // Wait for callback (blocking - runs in Tauri's async runtime)
  let callback = tokio::task::spawn_blocking(wait_for_callback)
    .await
    .map_err(|e| e.to_string())??;

  // Exchange authorization code for tokens
  let tokens = exchange_code_for_tokens(&config, &callback.code)
    .await
    .map_err(|e| e.to_string())?;

  storage::save_tracker_tokens(&state.db, &tokens).await?;

  println!("Tracker OAuth completed successfully");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Check Authentication Status
/// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TrackerAuthStatus {
  pub is_authenticated: bool,
  pub expires_at: Option<String>,
  pub needs_refresh: bool,
}

#[tauri::command]
pub async fn tracker_get_auth_status(
  state: State<'_, Arc<AppState>>,
) -> Result<TrackerAuthStatus, String> {
  match storage::load_tracker_tokens(&state.db).await? {
    Some(tokens) => Ok(TrackerAuthStatus {
      is_authenticated: true,
      expires_at: Some(tokens.expires_at.to_rfc3339()),
      needs_refresh: tokens.needs_refresh(),
    }),
    None => Ok(TrackerAuthStatus {
      is_authenticated: false,
      expires_at: None,
      needs_refresh: false,
    }),
  }
}

/// ---------------------------------------------------------------------------
/// Token Refresh
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn tracker_refresh_auth(state: State<'_, Arc<AppState>>) -> Result<(), String> {
  let config = TrackerConfig::from_env().map_err(|e| e.to_string())?;

  let current_tokens = storage::load_tracker_tokens(&state.db)
    .await?
    .ok_or_else(|| "No tokens to refresh".to_string())?;

  let new_tokens = refresh_tokens(&config, &current_tokens.refresh_token)
    .await
    .map_err(|e| e.to_string())?;

  storage::save_tracker_tokens(&state.db, &new_tokens).await?;

  println!("Tracker tokens refreshed");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Disconnect
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn tracker_disconnect(state: State<'_, Arc<AppState>>) -> Result<(), String> {
  storage::delete_tracker_tokens(&state.db).await?;

  println!("Tracker disconnected");
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Burned Calorie Sync
/// ---------------------------------------------------------------------------

/// Pull the day's burned calories from the tracker and overwrite the stored
/// value. Returns the synced amount, or None when the tracker has no data
/// for that day yet.
#[tauri::command]
pub async fn tracker_sync_burned(
  state: State<'_, Arc<AppState>>,
  date: Option<NaiveDate>,
) -> Result<Option<i32>, String> {
  let now = state.clock.now();
  let date = date.unwrap_or_else(|| now.date_naive());

  let tokens = storage::load_tracker_tokens(&state.db)
    .await?
    .ok_or_else(|| "Tracker not connected".to_string())?;

  let tokens = if tokens.needs_refresh() {
    let config = TrackerConfig::from_env().map_err(|e| e.to_string())?;
    let refreshed = refresh_tokens(&config, &tokens.refresh_token)
      .await
      .map_err(|e| e.to_string())?;
    storage::save_tracker_tokens(&state.db, &refreshed).await?;
    refreshed
  } else {
    tokens
  };

  let Some(summary) = fetch_daily_summary(&tokens.access_token, date)
    .await
    .map_err(|e| e.to_string())?
  else {
    println!("No tracker data for {} yet", date);
    return Ok(None);
  };

  {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(now.date_naive());
    engine.update_burned_calories(date, summary.active_calories);
    after_mutation(&mut engine, &state.policy, date, now);
  }

  persist(&state);
  println!(
    "Synced {} burned kcal for {} from tracker",
    summary.active_calories, date
  );
  Ok(Some(summary.active_calories))
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
