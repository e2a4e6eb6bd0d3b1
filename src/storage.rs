//! Engine state persistence
//!
//! The whole engine state lives in one JSON blob in the `app_state` table.
//! The engine only ever loads it at startup and writes it back after a
//! committed transition; nothing queries inside the blob.

use chrono::{DateTime, Utc};

use crate::db::DbPool;
use crate::engine::EngineState;
use crate::tracker::TrackerTokens;

const STATE_KEY: &str = "engine_state";

/// Load the persisted engine state. A missing row means first launch; a blob
/// that no longer parses is treated the same way rather than wedging the app.
pub async fn load_state(db: &DbPool) -> Result<EngineState, String> {
  let row: Option<(String,)> =
    sqlx::query_as("SELECT value FROM app_state WHERE key = ?1")
      .bind(STATE_KEY)
      .fetch_optional(db)
      .await
      .map_err(|e| e.to_string())?;

  let Some((blob,)) = row else {
    return Ok(EngineState::default());
  };

  match serde_json::from_str(&blob) {
    Ok(state) => Ok(state),
    Err(e) => {
      eprintln!("Stored engine state is unreadable, starting fresh: {}", e);
      Ok(EngineState::default())
    }
  }
}

pub async fn save_state(db: &DbPool, state: &EngineState) -> Result<(), String> {
  let blob = serde_json::to_string(state).map_err(|e| e.to_string())?;

  sqlx::query(
    r#"
    INSERT INTO app_state (key, value)
    VALUES (?1, ?2)
    ON CONFLICT(key) DO UPDATE SET
      value = excluded.value,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(STATE_KEY)
  .bind(&blob)
  .execute(db)
  .await
  .map_err(|e| e.to_string())?;

  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tracker Token Persistence
/// ---------------------------------------------------------------------------

pub async fn load_tracker_tokens(db: &DbPool) -> Result<Option<TrackerTokens>, String> {
  let row: Option<(String, String, DateTime<Utc>)> = sqlx::query_as(
    "SELECT access_token, refresh_token, expires_at FROM tracker_auth WHERE id = 1",
  )
  .fetch_optional(db)
  .await
  .map_err(|e| e.to_string())?;

  Ok(row.map(|(access, refresh, expires)| TrackerTokens {
    access_token: access,
    refresh_token: refresh,
    expires_at: expires,
  }))
}

pub async fn save_tracker_tokens(db: &DbPool, tokens: &TrackerTokens) -> Result<(), String> {
  sqlx::query(
    r#"
    INSERT INTO tracker_auth (id, access_token, refresh_token, expires_at)
    VALUES (1, ?1, ?2, ?3)
    ON CONFLICT(id) DO UPDATE SET
      access_token = excluded.access_token,
      refresh_token = excluded.refresh_token,
      expires_at = excluded.expires_at,
      updated_at = CURRENT_TIMESTAMP
    "#,
  )
  .bind(&tokens.access_token)
  .bind(&tokens.refresh_token)
  .bind(tokens.expires_at)
  .execute(db)
  .await
  .map_err(|e| e.to_string())?;

  Ok(())
}

pub async fn delete_tracker_tokens(db: &DbPool) -> Result<(), String> {
  sqlx::query("DELETE FROM tracker_auth WHERE id = 1")
    .execute(db)
    .await
    .map_err(|e| e.to_string())?;
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{setup_test_db, teardown_test_db};
  use chrono::NaiveDate;

  #[tokio::test]
  async fn test_missing_row_yields_default_state() {
    let db = setup_test_db().await;
    let state = load_state(&db).await.unwrap();
    assert!(state.goal.is_none());
    assert!(state.records.is_empty());
    teardown_test_db(db).await;
  }

  #[tokio::test]
  async fn test_round_trip_preserves_state() {
    let db = setup_test_db().await;

    let mut state = EngineState::default();
    let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
    state.set_weekly_goal(2000, today);
    state.log_meal(today, "Lunch", 650, today.and_hms_opt(12, 0, 0).unwrap().and_utc());

    save_state(&db, &state).await.unwrap();
    let loaded = load_state(&db).await.unwrap();

    assert_eq!(loaded.goal.as_ref().unwrap().daily_baseline, 2000);
    assert_eq!(loaded.record(today).unwrap().consumed, 650);
    assert_eq!(loaded.record(today).unwrap().meals.len(), 1);

    teardown_test_db(db).await;
  }

  #[tokio::test]
  async fn test_save_overwrites_previous_blob() {
    let db = setup_test_db().await;
    let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();

    let mut state = EngineState::default();
    state.set_weekly_goal(2000, today);
    save_state(&db, &state).await.unwrap();

    state.set_weekly_goal(1800, today);
    save_state(&db, &state).await.unwrap();

    let loaded = load_state(&db).await.unwrap();
    assert_eq!(loaded.goal.as_ref().unwrap().daily_baseline, 1800);

    teardown_test_db(db).await;
  }

  #[tokio::test]
  async fn test_tracker_tokens_round_trip() {
    let db = setup_test_db().await;
    assert!(load_tracker_tokens(&db).await.unwrap().is_none());

    let tokens = TrackerTokens {
      access_token: "access".to_string(),
      refresh_token: "refresh".to_string(),
      expires_at: chrono::Utc::now() + chrono::Duration::hours(2),
    };
    save_tracker_tokens(&db, &tokens).await.unwrap();

    let loaded = load_tracker_tokens(&db).await.unwrap().unwrap();
    assert_eq!(loaded.access_token, "access");

    delete_tracker_tokens(&db).await.unwrap();
    assert!(load_tracker_tokens(&db).await.unwrap().is_none());

    teardown_test_db(db).await;
  }

  #[tokio::test]
  async fn test_corrupt_blob_falls_back_to_default() {
    let db = setup_test_db().await;

    sqlx::query("INSERT INTO app_state (key, value) VALUES ('engine_state', 'not json')")
      .execute(&db)
      .await
      .unwrap();

    let state = load_state(&db).await.unwrap();
    assert!(state.goal.is_none());

    teardown_test_db(db).await;
  }
}
