//! Background jobs
//!
//! Commands return as soon as the in-memory state is committed; persistence
//! and tracker sync run afterwards on the async runtime. A job carries plain
//! values and re-reads the shared state when it executes, so a job scheduled
//! against stale state can never clobber a newer commit.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::db::AppState;
use crate::{storage, tracker};

#[derive(Debug, Clone)]
pub enum Job {
  /// Write the current engine state back to SQLite
  PersistState,
  /// Pull burned calories for one date from the activity tracker
  SyncBurned { date: NaiveDate },
}

/// Fire and forget. Failures are logged, never surfaced to the frontend;
/// the next command's persist will retry implicitly.
pub fn spawn(state: Arc<AppState>, job: Job) {
  tauri::async_runtime::spawn(async move {
    if let Err(e) = run(&state, job.clone()).await {
      eprintln!("Background job {:?} failed: {}", job, e);
    }
  });
}

async fn run(state: &Arc<AppState>, job: Job) -> Result<(), String> {
  match job {
    Job::PersistState => {
      let snapshot = state.engine.read().await.clone();
      storage::save_state(&state.db, &snapshot).await
    }
    Job::SyncBurned { date } => sync_burned(state, date).await,
  }
}

async fn sync_burned(state: &Arc<AppState>, date: NaiveDate) -> Result<(), String> {
  let Some(tokens) = storage::load_tracker_tokens(&state.db).await? else {
    // Not connected; nothing to sync
    return Ok(());
  };

  let tokens = if tokens.needs_refresh() {
    let config = tracker::TrackerConfig::from_env().map_err(|e| e.to_string())?;
    let refreshed = tracker::refresh_tokens(&config, &tokens.refresh_token)
      .await
      .map_err(|e| e.to_string())?;
    storage::save_tracker_tokens(&state.db, &refreshed).await?;
    refreshed
  } else {
    tokens
  };

  let Some(summary) = tracker::fetch_daily_summary(&tokens.access_token, date)
    .await
    .map_err(|e| e.to_string())?
  else {
    return Ok(());
  };

  let snapshot = {
    let mut engine = state.engine.write().await;
    engine.update_burned_calories(date, summary.active_calories);
    engine.clone()
  };

  storage::save_state(&state.db, &snapshot).await?;
  println!(
    "Synced {} burned kcal for {} from tracker",
    summary.active_calories, date
  );
  Ok(())
}
