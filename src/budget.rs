//! Deterministic weekly budget math
//!
//! Pure aggregation and redistribution over the daily record store. Nothing
//! in this module mutates state; the engine feeds it committed records and
//! writes the results back.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{BankingPlan, DailyRecord, WeeklyGoal, MIN_DAILY_CALORIES};

/// Standard moderate-activity estimate of daily energy expenditure, used as
/// the reference point when scaling targets from an observed metabolism
/// profile.
const MODERATE_DAILY_BURN_ESTIMATE: f64 = 2200.0;

/// Minimum profile confidence before historical signals influence targets
const PROFILE_CONFIDENCE_FLOOR: f64 = 0.6;

/// Default share of a planned workout's expected burn credited to that day
const TRAINING_SHIFT_FRACTION: f64 = 0.30;

/// ---------------------------------------------------------------------------
/// Weekly Progress
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectedOutcome {
  OnTrack,
  OverBudget,
  UnderBudget,
}

/// Aggregated totals for the goal's week. Burned calories *increase* the
/// remaining budget - they are earned allowance, not merely logged exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyProgress {
  pub total_consumed: i32,
  pub total_burned: i32,
  pub remaining_calories: i32,
  pub projected_outcome: ProjectedOutcome,
}

impl WeeklyProgress {
  /// Aggregate the records that fall inside the goal's week. Pure; the
  /// caller is responsible for the no-goal case.
  pub fn compute<'a>(
    goal: &WeeklyGoal,
    records: impl Iterator<Item = &'a DailyRecord>,
    today: NaiveDate,
  ) -> Self {
    let mut total_consumed = 0;
    let mut total_burned = 0;

    for record in records.filter(|r| goal.contains(r.date)) {
      total_consumed += record.consumed;
      total_burned += record.burned;
    }

    let remaining_calories = goal.current_week_allowance - total_consumed + total_burned;

    let days_elapsed = days_elapsed_in_week(goal, today);
    let projected_outcome = if days_elapsed == 0 {
      ProjectedOutcome::OnTrack
    } else {
      let net = (total_consumed - total_burned) as f64;
      let projected_week = net / days_elapsed as f64 * 7.0;
      let allowance = goal.current_week_allowance as f64;
      if projected_week > allowance * 1.05 {
        ProjectedOutcome::OverBudget
      } else if projected_week < allowance * 0.95 {
        ProjectedOutcome::UnderBudget
      } else {
        ProjectedOutcome::OnTrack
      }
    };

    Self {
      total_consumed,
      total_burned,
      remaining_calories,
      projected_outcome,
    }
  }
}

/// Monday-based day index of `today` within the goal's week, clamped to 0-6.
/// Doubles as the count of fully elapsed days.
pub fn days_elapsed_in_week(goal: &WeeklyGoal, today: NaiveDate) -> i32 {
  ((today - goal.week_start_date).num_days() as i32).clamp(0, 6)
}

/// ---------------------------------------------------------------------------
/// Redistribution Inputs
/// ---------------------------------------------------------------------------

/// A known upcoming high-intensity day, from the planned-activity signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedActivity {
  pub date: NaiveDate,
  pub expected_burn: i32,
}

/// Historical metabolism signal derived from past activity-sync data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetabolismProfile {
  /// Observed average total daily energy expenditure
  pub observed_daily_burn: f64,
  /// Average active-day burn over rest-day burn; 1.0 = no difference
  pub active_rest_ratio: f64,
  /// 0.0 - 1.0
  pub confidence: f64,
}

impl MetabolismProfile {
  fn is_confident(&self) -> bool {
    self.confidence >= PROFILE_CONFIDENCE_FLOOR
  }
}

/// ---------------------------------------------------------------------------
/// Redistribution Output
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentReason {
  OnTrack,
  OverBudget,
  UnderBudget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTarget {
  pub date: NaiveDate,
  pub target: i32,
}

/// Recommended targets for today and every remaining day of the week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redistribution {
  pub daily_targets: Vec<DailyTarget>,
  pub adjustment_reason: AdjustmentReason,
}

/// ---------------------------------------------------------------------------
/// Redistribution Engine
/// ---------------------------------------------------------------------------

/// Compute recommended targets for each remaining day (today inclusive).
///
/// `banked_so_far` is the sum of banking reductions already applied to
/// elapsed days; pace judgement must not penalize a user for under-eating
/// they were asked to do.
pub fn redistribute(
  goal: &WeeklyGoal,
  progress: &WeeklyProgress,
  today: NaiveDate,
  planned: &[PlannedActivity],
  profile: Option<&MetabolismProfile>,
  banked_so_far: i32,
) -> Redistribution {
  let today_index = days_elapsed_in_week(goal, today);
  let remaining_days = 7 - today_index;
  let remaining_dates: Vec<NaiveDate> = goal
    .week_dates()
    .into_iter()
    .skip(today_index as usize)
    .collect();

  let mut base = progress.remaining_calories as f64 / remaining_days as f64;

  // Historical scaling: a confidently hot or cold metabolism shifts the base
  // target by 5% around the moderate-activity reference.
  if let Some(profile) = profile.filter(|p| p.is_confident()) {
    if profile.observed_daily_burn > MODERATE_DAILY_BURN_ESTIMATE * 1.05 {
      base *= 1.05;
    } else if profile.observed_daily_burn < MODERATE_DAILY_BURN_ESTIMATE * 0.95 {
      base *= 0.95;
    }
  }

  let mut targets: Vec<DailyTarget> = remaining_dates
    .iter()
    .map(|&date| DailyTarget {
      date,
      target: base.round() as i32,
    })
    .collect();

  apply_training_shift(&mut targets, planned, profile);

  // The floor always wins, applied after every other adjustment
  for t in &mut targets {
    t.target = t.target.max(MIN_DAILY_CALORIES);
  }

  let adjustment_reason = compute_adjustment_reason(goal, progress, today_index, banked_so_far);

  Redistribution {
    daily_targets: targets,
    adjustment_reason,
  }
}

/// Move a share of each training day's expected burn onto that day's target
/// and take an equal amount back from the non-training remaining days.
fn apply_training_shift(
  targets: &mut [DailyTarget],
  planned: &[PlannedActivity],
  profile: Option<&MetabolismProfile>,
) {
  let fraction = match profile.filter(|p| p.is_confident()) {
    // A pronounced active/rest split justifies crediting more of the burn
    Some(p) => (TRAINING_SHIFT_FRACTION * p.active_rest_ratio).clamp(0.25, 0.40),
    None => TRAINING_SHIFT_FRACTION,
  };

  let mut total_shift = 0i32;
  let mut training_dates = Vec::new();

  for activity in planned {
    if let Some(target) = targets.iter_mut().find(|t| t.date == activity.date) {
      let bonus = (activity.expected_burn as f64 * fraction).round() as i32;
      target.target += bonus;
      total_shift += bonus;
      training_dates.push(activity.date);
    }
  }

  if total_shift == 0 {
    return;
  }

  let rest_days: Vec<usize> = targets
    .iter()
    .enumerate()
    .filter(|(_, t)| !training_dates.contains(&t.date))
    .map(|(i, _)| i)
    .collect();

  if rest_days.is_empty() {
    return;
  }

  let per_day = total_shift / rest_days.len() as i32;
  let mut remainder = total_shift - per_day * rest_days.len() as i32;

  for idx in rest_days {
    let mut reduction = per_day;
    if remainder > 0 {
      reduction += 1;
      remainder -= 1;
    }
    targets[idx].target -= reduction;
  }
}

/// Pace-based judgement: compare net consumption so far against where a
/// steady week would be by now, with leniency that tightens as the week
/// progresses.
fn compute_adjustment_reason(
  goal: &WeeklyGoal,
  progress: &WeeklyProgress,
  days_elapsed: i32,
  banked_so_far: i32,
) -> AdjustmentReason {
  let net = progress.total_consumed - progress.total_burned;

  let expected_by_now = (goal.weekly_allowance as f64 / 7.0) * days_elapsed as f64;
  // Banking lowers what the user was expected to have eaten by now
  let deviation = net as f64 - (expected_by_now - banked_so_far as f64);

  // It is impossible to be meaningfully over budget with under 15% of the
  // week's allowance used, whatever the pace math says.
  let usage_ratio = progress.total_consumed as f64 / goal.current_week_allowance.max(1) as f64;
  if usage_ratio < 0.15 {
    return if deviation < 0.0 {
      AdjustmentReason::UnderBudget
    } else {
      AdjustmentReason::OnTrack
    };
  }

  let week_progress = days_elapsed as f64 / 7.0;
  let threshold = (goal.daily_baseline as f64 * 0.3) * (0.5 + week_progress).min(1.0);

  if deviation > threshold {
    AdjustmentReason::OverBudget
  } else if deviation < -threshold {
    AdjustmentReason::UnderBudget
  } else {
    AdjustmentReason::OnTrack
  }
}

/// Banking reductions already applied to days that are now in the past.
pub fn banked_so_far<'a>(
  plan: Option<&BankingPlan>,
  records: impl Iterator<Item = &'a DailyRecord>,
  today: NaiveDate,
) -> i32 {
  if plan.filter(|p| p.is_active).is_none() {
    return 0;
  }

  records
    .filter(|r| r.date < today)
    .filter_map(|r| r.banking_adjustment)
    .filter(|adj| *adj < 0)
    .map(|adj| -adj)
    .sum()
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
