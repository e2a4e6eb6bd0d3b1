use std::sync::Arc;

use chrono::NaiveDate;
use tauri::State;

use super::{after_mutation, persist};
use crate::db::AppState;
use crate::models::{WeeklyGoal, MIN_DAILY_CALORIES};

/// ---------------------------------------------------------------------------
/// Intake Logging
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn log_meal(
  state: State<'_, Arc<AppState>>,
  name: String,
  calories: i32,
  date: Option<NaiveDate>,
) -> Result<(), String> {
  if calories < 0 {
    return Err("Meal calories cannot be negative".to_string());
  }

  let now = state.clock.now();
  let date = date.unwrap_or_else(|| now.date_naive());
  {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(now.date_naive());
    engine.log_meal(date, &name, calories, now);
    after_mutation(&mut engine, &state.policy, date, now);
  }

  persist(&state);
  Ok(())
}

#[tauri::command]
pub async fn log_workout(
  state: State<'_, Arc<AppState>>,
  name: String,
  calories_burned: i32,
  date: Option<NaiveDate>,
) -> Result<(), String> {
  if calories_burned < 0 {
    return Err("Burned calories cannot be negative".to_string());
  }

  let now = state.clock.now();
  let date = date.unwrap_or_else(|| now.date_naive());
  {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(now.date_naive());
    engine.log_workout(date, &name, calories_burned, now);
    after_mutation(&mut engine, &state.policy, date, now);
  }

  persist(&state);
  Ok(())
}

/// Manual correction of a day's consumed total (e.g. after a mislogged meal)
#[tauri::command]
pub async fn update_daily_calories(
  state: State<'_, Arc<AppState>>,
  date: NaiveDate,
  consumed: i32,
) -> Result<(), String> {
  let now = state.clock.now();
  {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(now.date_naive());
    engine.update_daily_calories(date, consumed);
    after_mutation(&mut engine, &state.policy, date, now);
  }

  persist(&state);
  Ok(())
}

#[tauri::command]
pub async fn update_burned_calories(
  state: State<'_, Arc<AppState>>,
  date: NaiveDate,
  burned: i32,
) -> Result<(), String> {
  let now = state.clock.now();
  {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(now.date_naive());
    engine.update_burned_calories(date, burned);
    after_mutation(&mut engine, &state.policy, date, now);
  }

  persist(&state);
  Ok(())
}

#[tauri::command]
pub async fn log_water_glass(
  state: State<'_, Arc<AppState>>,
  date: Option<NaiveDate>,
) -> Result<i32, String> {
  let now = state.clock.now();
  let date = date.unwrap_or_else(|| now.date_naive());
  let glasses = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(now.date_naive());
    engine.log_water_glass(date);
    engine
      .record(date)
      .and_then(|r| r.water_glasses)
      .unwrap_or(0)
  };

  persist(&state);
  Ok(glasses)
}

/// ---------------------------------------------------------------------------
/// Weekly Goal
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn set_weekly_goal(
  state: State<'_, Arc<AppState>>,
  daily_baseline: i32,
) -> Result<WeeklyGoal, String> {
  if daily_baseline < MIN_DAILY_CALORIES {
    return Err(format!(
      "Daily baseline must be at least {} kcal",
      MIN_DAILY_CALORIES
    ));
  }

  let now = state.clock.now();
  let today = now.date_naive();
  let goal = {
    let mut engine = state.engine.write().await;
    engine.set_weekly_goal(daily_baseline, today);
    after_mutation(&mut engine, &state.policy, today, now);
    engine.goal.clone()
  };

  persist(&state);
  goal.ok_or_else(|| "Goal was not stored".to_string())
}

#[tauri::command]
pub async fn get_weekly_goal(
  state: State<'_, Arc<AppState>>,
) -> Result<Option<WeeklyGoal>, String> {
  let today = state.clock.today();
  let mut engine = state.engine.write().await;
  engine.ensure_current_week(today);
  Ok(engine.goal.clone())
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

  #[tokio::test]
  #[serial]
  async fn test_set_goal_then_log_meal() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let app = tauri::test::mock_app();
    app.manage(state.clone());

    let goal = set_weekly_goal(app.state(), 2000).await.unwrap();
    assert_eq!(goal.weekly_allowance, 14000);

    log_meal(app.state(), "Lunch".to_string(), 650, None)
      .await
      .unwrap();

    let engine = state.engine.read().await;
    let record = engine.record(state.clock.today()).unwrap();
    assert_eq!(record.consumed, 650);
    assert_eq!(record.meals.len(), 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_set_goal_rejects_sub_floor_baseline() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let app = tauri::test::mock_app();
    app.manage(state);

    let result = set_weekly_goal(app.state(), 1000).await;
    assert!(result.is_err());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_negative_meal_rejected() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let app = tauri::test::mock_app();
    app.manage(state);

    set_weekly_goal(app.state(), 2000).await.unwrap();
    let result = log_meal(app.state(), "Oops".to_string(), -100, None).await;
    assert!(result.is_err());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_overeating_detected_after_logging() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let app = tauri::test::mock_app();
    app.manage(state.clone());

    set_weekly_goal(app.state(), 2000).await.unwrap();
    log_meal(app.state(), "Feast".to_string(), 2700, None)
      .await
      .unwrap();

    let engine = state.engine.read().await;
    let event = engine.pending_event().unwrap();
    assert_eq!(event.excess_calories, 700);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  #[serial]
  async fn test_water_glasses_accumulate() {
    let pool = setup_test_db().await;
    let state = test_app_state(pool.clone());
    let app = tauri::test::mock_app();
    app.manage(state);

    set_weekly_goal(app.state(), 2000).await.unwrap();
    assert_eq!(log_water_glass(app.state(), None).await.unwrap(), 1);
    assert_eq!(log_water_glass(app.state(), None).await.unwrap(), 2);

    teardown_test_db(pool).await;
  }
}
