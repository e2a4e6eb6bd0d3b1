pub mod banking;
pub mod log;
pub mod recovery;
pub mod tracker;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tauri::State;

use crate::budget::{MetabolismProfile, PlannedActivity, Redistribution, WeeklyProgress};
use crate::db::AppState;
use crate::engine::EngineState;
use crate::models::{BudgetPolicy, DailyRecord, OvereatingEvent, RecoverySession};
use crate::{banking as banking_core, jobs};

/// ---------------------------------------------------------------------------
/// Shared Helpers
/// ---------------------------------------------------------------------------

/// Schedule the post-commit persist. Called after every mutation, outside the
/// write lock.
pub(crate) fn persist(state: &State<'_, Arc<AppState>>) {
  jobs::spawn(state.inner().clone(), jobs::Job::PersistState);
}

/// Standard pipeline after any intake/goal mutation: re-check overeating for
/// the touched date, refresh session adherence, drop stale events, and
/// redistribute the remaining budget. Redistribution is skipped while a
/// recovery session is steering the targets.
pub(crate) fn after_mutation(
  engine: &mut EngineState,
  policy: &BudgetPolicy,
  date: NaiveDate,
  now: DateTime<Utc>,
) {
  let today = now.date_naive();
  crate::recovery::detect(engine, policy, date, now);
  crate::recovery::update_adherence(engine, today);
  crate::recovery::cleanup_stale_events(engine, today);
  if engine.active_session().is_none() {
    engine.apply_redistribution(today, &[], None);
  }
}

/// ---------------------------------------------------------------------------
/// Week Progress
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_current_week_progress(
  state: State<'_, Arc<AppState>>,
) -> Result<WeeklyProgress, String> {
  let today = state.clock.today();
  let progress = {
    let mut engine = state.engine.write().await;
    engine.ensure_current_week(today);
    engine
      .weekly_progress(today)
      .ok_or_else(|| "No weekly goal set".to_string())?
  };

  // Opportunistic: refresh today's burned calories from the tracker while
  // the user looks at the week view
  jobs::spawn(state.inner().clone(), jobs::Job::SyncBurned { date: today });

  Ok(progress)
}

#[tauri::command]
pub async fn get_calorie_redistribution(
  state: State<'_, Arc<AppState>>,
  planned_activities: Option<Vec<PlannedActivity>>,
  profile: Option<MetabolismProfile>,
) -> Result<Redistribution, String> {
  let today = state.clock.today();
  let mut engine = state.engine.write().await;
  engine.ensure_current_week(today);

  let goal = engine
    .goal
    .clone()
    .ok_or_else(|| "No weekly goal set".to_string())?;
  let progress = WeeklyProgress::compute(&goal, engine.records.values(), today);
  let banked = crate::budget::banked_so_far(
    goal.active_banking_plan(),
    engine.records.values(),
    today,
  );

  Ok(crate::budget::redistribute(
    &goal,
    &progress,
    today,
    planned_activities.as_deref().unwrap_or(&[]),
    profile.as_ref(),
    banked,
  ))
}

/// ---------------------------------------------------------------------------
/// Daily Queries
/// ---------------------------------------------------------------------------

/// Everything the day view needs in one call
#[derive(Debug, Serialize)]
pub struct DailyProgress {
  pub date: NaiveDate,
  pub target: i32,
  pub consumed: i32,
  pub burned: i32,
  pub remaining: i32,
  pub record: Option<DailyRecord>,
}

#[tauri::command]
pub async fn get_remaining_calories_for_today(
  state: State<'_, Arc<AppState>>,
) -> Result<i32, String> {
  let now = state.clock.now();
  let mut engine = state.engine.write().await;
  engine.ensure_current_week(now.date_naive());

  let remaining = engine
    .remaining_calories_for_today(now)
    .ok_or_else(|| "No weekly goal set".to_string())?;
  drop(engine);

  // First read of the day may have locked the target
  persist(&state);
  Ok(remaining)
}

#[tauri::command]
pub async fn get_daily_progress(
  state: State<'_, Arc<AppState>>,
  date: Option<NaiveDate>,
) -> Result<DailyProgress, String> {
  let now = state.clock.now();
  let today = now.date_naive();
  let date = date.unwrap_or(today);

  let mut engine = state.engine.write().await;
  engine.ensure_current_week(today);
  engine
    .goal
    .as_ref()
    .ok_or_else(|| "No weekly goal set".to_string())?;

  let target = if date == today {
    engine
      .effective_target_today(now)
      .ok_or_else(|| "No weekly goal set".to_string())?
  } else {
    engine
      .get_locked_target(date, today)
      .or_else(|| engine.record(date).map(|r| r.effective_base_target()))
      .unwrap_or_else(|| engine.goal.as_ref().map(|g| g.daily_baseline).unwrap_or(0))
  };

  let record = engine.record(date).cloned();
  let consumed = record.as_ref().map(|r| r.consumed).unwrap_or(0);
  let burned = record.as_ref().map(|r| r.burned).unwrap_or(0);

  Ok(DailyProgress {
    date,
    target,
    consumed,
    burned,
    remaining: target - consumed + burned,
    record,
  })
}

#[tauri::command]
pub async fn get_locked_daily_target(
  state: State<'_, Arc<AppState>>,
  date: NaiveDate,
) -> Result<Option<i32>, String> {
  let today = state.clock.today();
  let engine = state.engine.read().await;
  Ok(engine.get_locked_target(date, today))
}

/// ---------------------------------------------------------------------------
/// Banking / Recovery Status
/// ---------------------------------------------------------------------------

#[tauri::command]
pub async fn get_calorie_bank_status(
  state: State<'_, Arc<AppState>>,
) -> Result<banking_core::CalorieBankStatus, String> {
  let today = state.clock.today();
  let mut engine = state.engine.write().await;
  engine.ensure_current_week(today);
  banking_core::bank_status(&engine, today).ok_or_else(|| "No weekly goal set".to_string())
}

#[tauri::command]
pub async fn get_pending_overeating_event(
  state: State<'_, Arc<AppState>>,
) -> Result<Option<OvereatingEvent>, String> {
  let engine = state.engine.read().await;
  Ok(engine.pending_event().cloned())
}

#[tauri::command]
pub async fn get_active_recovery_session(
  state: State<'_, Arc<AppState>>,
) -> Result<Option<RecoverySession>, String> {
  let today = state.clock.today();
  let mut engine = state.engine.write().await;
  engine.ensure_current_week(today);
  Ok(engine.active_session().cloned())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
