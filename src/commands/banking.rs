use std::sync::Arc;

use chrono::NaiveDate;
use tauri::State;

use super::persist;
use crate::banking::{self, BankingValidation};
use crate::db::AppState;

/// ---------------------------------------------------------------------------
/// Banking Commands
/// ---------------------------------------------------------------------------

/// Dry-run validation for the planning UI. Never mutates.
#[tauri::command]
pub async fn validate_banking_plan(
  state: State<'_, Arc<AppState>>,
  target_date: NaiveDate,
  daily_reduction: i32,
) -> Result<BankingValidation, String> {
  let today = state.clock.today();
  let mut engine = state.engine.write().await;
  engine.ensure_current_week(today);
  Ok(banking::validate(
    &engine,
    &state.policy,
    today,
    target_date,
    daily_reduction,
  ))
}

/// Create a plan. The validation result is returned either way; the plan is
/// only applied when it came back valid.
#[tauri::command]
pub async fn create_banking_plan(
  state: State<'_, Arc<AppState>>,
  target_date: NaiveDate,
  daily_reduction: i32,
) -> Result<BankingValidation, String> {
  let today = state.clock.today();
  let validation = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(today);
    banking::create_plan(&mut engine, &state.policy, today, target_date, daily_reduction)
  };

  if validation.is_valid {
    persist(&state);
    println!(
      "Banking plan created: {} kcal/day toward {}",
      daily_reduction, target_date
    );
  }
  Ok(validation)
}

#[tauri::command]
pub async fn update_banking_plan(
  state: State<'_, Arc<AppState>>,
  target_date: NaiveDate,
  daily_reduction: i32,
) -> Result<BankingValidation, String> {
  let today = state.clock.today();
  let validation = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(today);
    banking::update_plan(&mut engine, &state.policy, today, target_date, daily_reduction)
  };

  // Cancellation already happened even if the replacement was rejected
  persist(&state);
  Ok(validation)
}

#[tauri::command]
pub async fn cancel_banking_plan(state: State<'_, Arc<AppState>>) -> Result<bool, String> {
  let today = state.clock.today();
  let cancelled = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(today);
    banking::cancel_plan(&mut engine)
  };

  if cancelled {
    persist(&state);
    println!("Banking plan cancelled");
  }
  Ok(cancelled)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
