use std::sync::Arc;

use chrono::NaiveDate;
use tauri::State;

use super::persist;
use crate::db::AppState;
use crate::llm::ClaudeClient;
use crate::models::{OvereatingEvent, RecoveryPlan, RecoverySession};
use crate::recovery::{self, SuggestionContext};

/// ---------------------------------------------------------------------------
/// Detection Commands
/// ---------------------------------------------------------------------------

/// Run overeating detection for a date (default today). Pace-aware by
/// default so a heavy day after an under-budget stretch doesn't nag.
#[tauri::command]
pub async fn detect_overeating(
  state: State<'_, Arc<AppState>>,
  date: Option<NaiveDate>,
  pace_aware: Option<bool>,
) -> Result<Option<OvereatingEvent>, String> {
  let now = state.clock.now();
  let date = date.unwrap_or_else(|| now.date_naive());

  let event = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(now.date_naive());
    if pace_aware.unwrap_or(true) {
      recovery::detect_pace_aware(&mut engine, &state.policy, date, now)
    } else {
      recovery::detect(&mut engine, &state.policy, date, now)
    }
  };

  persist(&state);
  Ok(event)
}

#[tauri::command]
pub async fn acknowledge_overeating_event(
  state: State<'_, Arc<AppState>>,
  event_id: i64,
) -> Result<bool, String> {
  let acknowledged = {
    let mut engine = state.engine.write().await;
    recovery::acknowledge_event(&mut engine, event_id)
  };

  if acknowledged {
    persist(&state);
  }
  Ok(acknowledged)
}

/// Drop unacknowledged events that are too old to act on, measured from
/// `date` (default today).
#[tauri::command]
pub async fn cleanup_stale_recovery_events(
  state: State<'_, Arc<AppState>>,
  date: Option<NaiveDate>,
) -> Result<usize, String> {
  let date = date.unwrap_or_else(|| state.clock.today());
  let removed = {
    let mut engine = state.engine.write().await;
    let before = engine.events.len();
    recovery::cleanup_stale_events(&mut engine, date);
    before - engine.events.len()
  };

  if removed > 0 {
    persist(&state);
    println!("Removed {} stale overeating event(s)", removed);
  }
  Ok(removed)
}

/// ---------------------------------------------------------------------------
/// Recovery Plan
/// ---------------------------------------------------------------------------

/// Build the recovery option menu for an event. Activity suggestions come
/// from Claude when an API key is configured; otherwise the plan ships
/// without them.
#[tauri::command]
pub async fn get_recovery_plan(
  state: State<'_, Arc<AppState>>,
  event_id: i64,
) -> Result<RecoveryPlan, String> {
  let today = state.clock.today();

  let (mut plan, context) = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(today);
    let plan = recovery::create_recovery_plan(&engine, event_id, today)?;
    let context = engine
      .events
      .iter()
      .find(|e| e.id == event_id)
      .map(|e| SuggestionContext::for_event(&engine, e));
    (plan, context)
  };

  if let (Ok(client), Some(context)) = (ClaudeClient::from_env(), context) {
    let context_json = serde_json::to_string(&context).map_err(|e| e.to_string())?;
    match client.generate_activity_suggestions(&context_json).await {
      Ok((suggestions, usage)) => {
        println!(
          "Activity suggestions generated ({} in / {} out tokens)",
          usage.input_tokens, usage.output_tokens
        );
        plan.activity_suggestions = suggestions;
      }
      Err(e) => {
        eprintln!("Activity suggestions unavailable: {}", e);
      }
    }
  }

  Ok(plan)
}

/// ---------------------------------------------------------------------------
/// Session Commands
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn start_recovery_session(
  state: State<'_, Arc<AppState>>,
  event_id: i64,
  option_id: String,
) -> Result<RecoverySession, String> {
  let today = state.clock.today();
  let session = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(today);
    recovery::start_session(&mut engine, event_id, &option_id, today)?
  };

  persist(&state);
  println!(
    "Recovery session started: option '{}' for {} days",
    session.option_id, session.duration_days
  );
  Ok(session)
}

#[tauri::command]
pub async fn abandon_recovery_session(
  state: State<'_, Arc<AppState>>,
) -> Result<bool, String> {
  let today = state.clock.today();
  let abandoned = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(today);
    recovery::abandon_session(&mut engine, today)
  };

  if abandoned {
    persist(&state);
    println!("Recovery session abandoned");
  }
  Ok(abandoned)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::*;
  use serial_test::serial;
  use tauri::Manager;

  async fn seed_overeating(state: &Arc<AppState>) -> i64 {
    let mut engine = state.engine.write().await;
    engine.set_weekly_goal(2000, state.clock.today());
    engine.log_meal(state.clock.today(), "Feast", 2700, state.clock.now());
    let event = crate::recovery::detect(
      &mut engine,
      &state.policy,
      state.clock.today(),
      state.clock.now(),
    )
    .expect("excess should trigger an event");
    event.id
  }

  #[tokio::test]
  #[serial]
  async fn test_detect_command_creates_event() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    {
      let mut engine = state.engine.write().await;
      engine.set_weekly_goal(2000, state.clock.today());
      engine.log_meal(state.clock.today(), "Feast", 2700, state.clock.now());
    }
    let app = tauri::test::mock_app();
    app.manage(state);

    let event = detect_overeating(app.state(), None, Some(false))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(event.excess_calories, 700);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_full_session_lifecycle() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let event_id = seed_overeating(&state).await;
    let app = tauri::test::mock_app();
    app.manage(state.clone());

    let session = start_recovery_session(app.state(), event_id, "steady".to_string())
      .await
      .unwrap();
    assert_eq!(session.duration_days, 3);

    // Second start is rejected while the first is active
    let err = start_recovery_session(app.state(), event_id, "gentle".to_string()).await;
    assert!(err.is_err());

    assert!(abandon_recovery_session(app.state()).await.unwrap());
    assert!(!abandon_recovery_session(app.state()).await.unwrap());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_cleanup_accepts_explicit_date() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let event_id = seed_overeating(&state).await;
    let app = tauri::test::mock_app();
    app.manage(state);

    // Fresh as of the clock's today, stale from three days later
    let removed = cleanup_stale_recovery_events(app.state(), None).await.unwrap();
    assert_eq!(removed, 0);

    let later = test_today() + chrono::Duration::days(3);
    let removed = cleanup_stale_recovery_events(app.state(), Some(later))
      .await
      .unwrap();
    assert_eq!(removed, 1);

    assert!(!acknowledge_overeating_event(app.state(), event_id).await.unwrap());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_acknowledge_unknown_event() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let app = tauri::test::mock_app();
    app.manage(state);

    assert!(!acknowledge_overeating_event(app.state(), 999).await.unwrap());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_recovery_plan_without_api_key() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let event_id = seed_overeating(&state).await;
    let app = tauri::test::mock_app();
    app.manage(state);

    std::env::remove_var("ANTHROPIC_API_KEY");
    let plan = get_recovery_plan(app.state(), event_id).await.unwrap();

    assert_eq!(plan.options.len(), 3);
    assert!(plan.activity_suggestions.is_empty());

    teardown_test_db(pool).await;
  }
}
