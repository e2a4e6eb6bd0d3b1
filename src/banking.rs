//! Calorie Banking Planner
//!
//! Pre-pay for one future high-calorie day by shaving a fixed reduction off
//! every day between tomorrow and the target date. Validation is a
//! structured result (errors, warnings, impact preview), never an exception:
//! the frontend renders it either way.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::engine::EngineState;
use crate::models::{BankingPlan, BudgetPolicy, MIN_DAILY_CALORIES};

/// Maximum distance of the banked day from today
const MAX_TARGET_DAYS_OUT: i64 = 7;

/// ---------------------------------------------------------------------------
/// Validation Result
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedDay {
  pub date: NaiveDate,
  pub current_target: i32,
  pub reduced_target: i32,
}

/// Preview of what the plan would do, shown before the user commits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingImpact {
  pub affected_days: Vec<AffectedDay>,
  pub minimum_daily_calories: i32,
  pub total_banked: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingValidation {
  pub is_valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
  pub impact: Option<BankingImpact>,
}

impl BankingValidation {
  fn rejected(errors: Vec<String>) -> Self {
    Self {
      is_valid: false,
      errors,
      warnings: Vec::new(),
      impact: None,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Validation
/// ---------------------------------------------------------------------------

pub fn validate(
  state: &EngineState,
  policy: &BudgetPolicy,
  today: NaiveDate,
  target_date: NaiveDate,
  daily_reduction: i32,
) -> BankingValidation {
  let Some(goal) = state.goal.as_ref() else {
    return BankingValidation::rejected(vec!["No active weekly goal".to_string()]);
  };

  let mut errors = Vec::new();
  let mut warnings = Vec::new();

  if target_date <= today {
    errors.push("Target date must be in the future".to_string());
  }
  if (target_date - today).num_days() > MAX_TARGET_DAYS_OUT {
    errors.push(format!(
      "Target date must be within {} days",
      MAX_TARGET_DAYS_OUT
    ));
  }
  if daily_reduction <= 0 {
    errors.push("Daily reduction must be positive".to_string());
  }
  if daily_reduction > policy.banking_reduction_cap {
    errors.push(format!(
      "Daily reduction exceeds the {} kcal cap",
      policy.banking_reduction_cap
    ));
  }
  if state.active_session().is_some() {
    // Banking and recovery both spend the same remaining-day slack;
    // composing them can pin multiple days to the safety floor at once
    errors.push("Cannot bank calories while a recovery session is active".to_string());
  }
  if goal.active_banking_plan().is_some() {
    errors.push("A banking plan is already active".to_string());
  }

  if !errors.is_empty() {
    return BankingValidation::rejected(errors);
  }

  let affected_dates = affected_dates(today, target_date);
  if affected_dates.is_empty() {
    return BankingValidation::rejected(vec![
      "At least one full day is needed between tomorrow and the target date".to_string(),
    ]);
  }

  let affected_days: Vec<AffectedDay> = affected_dates
    .iter()
    .map(|&date| {
      let current_target = state
        .record(date)
        .map(|r| r.target)
        .unwrap_or(goal.daily_baseline);
      AffectedDay {
        date,
        current_target,
        reduced_target: current_target - daily_reduction,
      }
    })
    .collect();

  let minimum_daily_calories = affected_days
    .iter()
    .map(|d| d.reduced_target)
    .min()
    .unwrap_or(i32::MAX);
  let total_banked = daily_reduction * affected_days.len() as i32;

  if minimum_daily_calories < MIN_DAILY_CALORIES {
    errors.push(format!(
      "Plan would push a day to {} kcal, below the {} kcal minimum",
      minimum_daily_calories, MIN_DAILY_CALORIES
    ));
  } else if minimum_daily_calories < MIN_DAILY_CALORIES + policy.banking_floor_margin {
    warnings.push(format!(
      "Reduced days land close to the {} kcal minimum",
      MIN_DAILY_CALORIES
    ));
  }

  if daily_reduction > policy.banking_reduction_warning {
    warnings.push(format!(
      "A {} kcal daily reduction is hard to sustain",
      daily_reduction
    ));
  }

  BankingValidation {
    is_valid: errors.is_empty(),
    errors,
    warnings,
    impact: Some(BankingImpact {
      affected_days,
      minimum_daily_calories,
      total_banked,
    }),
  }
}

/// Every day strictly between today and the target date, i.e. tomorrow
/// through the day before the banked day.
fn affected_dates(today: NaiveDate, target_date: NaiveDate) -> Vec<NaiveDate> {
  let mut dates = Vec::new();
  let mut d = today + Duration::days(1);
  while d < target_date {
    dates.push(d);
    d += Duration::days(1);
  }
  dates
}

/// ---------------------------------------------------------------------------
/// Plan Lifecycle
/// ---------------------------------------------------------------------------

/// Validate and, when valid, apply the overlay and activate the plan.
/// Returns the validation either way so the caller can surface errors and
/// warnings uniformly.
pub fn create_plan(
  state: &mut EngineState,
  policy: &BudgetPolicy,
  today: NaiveDate,
  target_date: NaiveDate,
  daily_reduction: i32,
) -> BankingValidation {
  let validation = validate(state, policy, today, target_date, daily_reduction);
  let Some(impact) = validation.impact.as_ref().filter(|_| validation.is_valid) else {
    return validation;
  };
  let total_banked = impact.total_banked;
  let affected: Vec<NaiveDate> = impact.affected_days.iter().map(|d| d.date).collect();

  for date in &affected {
    let record = state.ensure_record(*date);
    record.banking_adjustment = Some(-daily_reduction);
    record.adjusted_target = Some((record.target - daily_reduction).max(MIN_DAILY_CALORIES));
  }

  let target_record = state.ensure_record(target_date);
  target_record.banking_adjustment = Some(total_banked);
  target_record.adjusted_target = Some(target_record.target + total_banked);

  if let Some(goal) = state.goal.as_mut() {
    goal.banking_plan = Some(BankingPlan {
      target_date,
      daily_reduction,
      total_banked,
      remaining_days_count: affected.len() as i32,
      is_active: true,
    });
  }

  validation
}

/// Clear the overlay from every record and drop the plan.
/// Returns whether there was an active plan to cancel.
pub fn cancel_plan(state: &mut EngineState) -> bool {
  let had_plan = state
    .goal
    .as_ref()
    .is_some_and(|g| g.active_banking_plan().is_some());

  for record in state.records.values_mut() {
    record.clear_banking_overlay();
  }
  if let Some(goal) = state.goal.as_mut() {
    goal.banking_plan = None;
  }

  had_plan
}

/// Updating is cancel-then-create; there is no in-place patching of a plan.
pub fn update_plan(
  state: &mut EngineState,
  policy: &BudgetPolicy,
  today: NaiveDate,
  target_date: NaiveDate,
  daily_reduction: i32,
) -> BankingValidation {
  cancel_plan(state);
  create_plan(state, policy, today, target_date, daily_reduction)
}

/// ---------------------------------------------------------------------------
/// Bank Status
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalorieBankStatus {
  pub active_plan: Option<BankingPlan>,
  pub is_banking_available: bool,
  pub days_until_target: Option<i64>,
}

pub fn bank_status(state: &EngineState, today: NaiveDate) -> Option<CalorieBankStatus> {
  let goal = state.goal.as_ref()?;

  // 1 day to reduce plus 1 day to spend on
  let days_left_in_week = 7 - crate::budget::days_elapsed_in_week(goal, today);
  let is_banking_available =
    days_left_in_week >= 2 && goal.active_banking_plan().is_none() && state.active_session().is_none();

  let active_plan = goal.active_banking_plan().cloned();
  let days_until_target = active_plan
    .as_ref()
    .map(|p| (p.target_date - today).num_days());

  Some(CalorieBankStatus {
    active_plan,
    is_banking_available,
    days_until_target,
  })
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
