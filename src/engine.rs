//! Engine state and transitions
//!
//! One immutable-in-spirit state value plus pure transition methods. All
//! mutation goes through a single writer (the command layer holds the write
//! lock); readers only ever see committed state. Time is always passed in -
//! the engine never reads the wall clock itself.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::budget::{self, MetabolismProfile, PlannedActivity, WeeklyProgress};
use crate::models::{
  week_start_for, DailyRecord, MealEntry, OvereatingEvent, RecoverySession, SessionStatus,
  WeeklyGoal, WorkoutEntry, MIN_DAILY_CALORIES,
};

/// ---------------------------------------------------------------------------
/// Engine State
/// ---------------------------------------------------------------------------

/// The whole persisted engine state, serialized as one blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineState {
  #[serde(default)]
  pub goal: Option<WeeklyGoal>,

  /// Ordered per-day records; the BTreeMap keeps iteration date-ordered
  #[serde(default)]
  pub records: BTreeMap<NaiveDate, DailyRecord>,

  #[serde(default)]
  pub events: Vec<OvereatingEvent>,

  #[serde(default)]
  pub sessions: Vec<RecoverySession>,

  #[serde(default)]
  pub next_event_id: i64,

  #[serde(default)]
  pub next_session_id: i64,
}

impl EngineState {
  /// Lazily create the record for `date`. New records start at the goal's
  /// baseline target; redistribution refines them afterwards.
  pub fn ensure_record(&mut self, date: NaiveDate) -> &mut DailyRecord {
    let baseline = self.goal.as_ref().map(|g| g.daily_baseline).unwrap_or(0);
    self
      .records
      .entry(date)
      .or_insert_with(|| DailyRecord::new(date, baseline))
  }

  pub fn record(&self, date: NaiveDate) -> Option<&DailyRecord> {
    self.records.get(&date)
  }

  pub fn active_session(&self) -> Option<&RecoverySession> {
    self.sessions.iter().find(|s| s.is_active())
  }

  pub fn active_session_mut(&mut self) -> Option<&mut RecoverySession> {
    self.sessions.iter_mut().find(|s| s.is_active())
  }

  pub fn pending_event(&self) -> Option<&OvereatingEvent> {
    self.events.iter().find(|e| !e.user_acknowledged)
  }

  pub fn allocate_event_id(&mut self) -> i64 {
    self.next_event_id += 1;
    self.next_event_id
  }

  pub fn allocate_session_id(&mut self) -> i64 {
    self.next_session_id += 1;
    self.next_session_id
  }

  /// ---------------------------------------------------------------------------
  /// Logging Transitions
  /// ---------------------------------------------------------------------------

  pub fn log_meal(&mut self, date: NaiveDate, name: &str, calories: i32, now: DateTime<Utc>) {
    let record = self.ensure_record(date);
    record.meals.push(MealEntry {
      name: name.to_string(),
      calories,
      logged_at: now,
    });
    record.consumed += calories;
  }

  pub fn log_workout(
    &mut self,
    date: NaiveDate,
    name: &str,
    calories_burned: i32,
    now: DateTime<Utc>,
  ) {
    let record = self.ensure_record(date);
    record.workouts.push(WorkoutEntry {
      name: name.to_string(),
      calories_burned,
      logged_at: now,
    });
    record.burned += calories_burned;
  }

  /// Manual correction of a day's consumed total
  pub fn update_daily_calories(&mut self, date: NaiveDate, consumed: i32) {
    self.ensure_record(date).consumed = consumed.max(0);
  }

  /// Burned calories from the activity tracker are authoritative: they
  /// overwrite the stored value, including overwriting with 0 to correct
  /// stale data.
  pub fn update_burned_calories(&mut self, date: NaiveDate, burned: i32) {
    self.ensure_record(date).burned = burned.max(0);
  }

  pub fn log_water_glass(&mut self, date: NaiveDate) {
    let record = self.ensure_record(date);
    record.water_glasses = Some(record.water_glasses.unwrap_or(0) + 1);
  }

  /// ---------------------------------------------------------------------------
  /// Goal Transitions
  /// ---------------------------------------------------------------------------

  /// Replace the goal wholesale. A goal change resets every future daily
  /// lock (and today's), and drops any banking overlay, which belonged to
  /// the old goal.
  pub fn set_weekly_goal(&mut self, daily_baseline: i32, today: NaiveDate) {
    self.goal = Some(WeeklyGoal::new(daily_baseline, today));

    for record in self.records.values_mut() {
      record.clear_banking_overlay();
      if record.date >= today {
        record.locked_daily_target = None;
        record.target_locked_at = None;
        record.target = daily_baseline;
      }
    }
  }

  /// ---------------------------------------------------------------------------
  /// Daily Target Lock
  /// ---------------------------------------------------------------------------

  /// A lock is valid for a past date unconditionally; for today only if it
  /// was set on the current calendar day. (An app left open across midnight
  /// leaves yesterday's timestamp on today's lock.)
  fn lock_is_valid(record: &DailyRecord, today: NaiveDate) -> bool {
    match (record.locked_daily_target, record.target_locked_at) {
      (Some(_), Some(locked_at)) => {
        record.date < today || locked_at.date_naive() == today
      }
      _ => false,
    }
  }

  /// Freeze the target already stored on the record. Locking never triggers
  /// a fresh redistribution; it captures whatever the day was operating
  /// under when first read.
  pub fn lock_daily_target(&mut self, date: NaiveDate, now: DateTime<Utc>) -> i32 {
    let today = now.date_naive();
    let record = self.ensure_record(date);

    if Self::lock_is_valid(record, today) {
      if let Some(locked) = record.locked_daily_target {
        return locked;
      }
    }

    let target = record.effective_base_target();
    record.locked_daily_target = Some(target);
    record.target_locked_at = Some(now);
    target
  }

  pub fn get_locked_target(&self, date: NaiveDate, today: NaiveDate) -> Option<i32> {
    let record = self.records.get(&date)?;
    if Self::lock_is_valid(record, today) {
      record.locked_daily_target
    } else {
      None
    }
  }

  /// ---------------------------------------------------------------------------
  /// Redistribution Write-Back
  /// ---------------------------------------------------------------------------

  /// Recompute recommended targets and store them as each remaining day's
  /// base target. Locked values are untouched - the lock is exactly what
  /// keeps this background recalculation from moving a day the user has
  /// already acted on.
  pub fn apply_redistribution(
    &mut self,
    today: NaiveDate,
    planned: &[PlannedActivity],
    profile: Option<&MetabolismProfile>,
  ) {
    let Some(goal) = self.goal.clone() else {
      return;
    };

    let progress = WeeklyProgress::compute(&goal, self.records.values(), today);
    let banked = budget::banked_so_far(goal.active_banking_plan(), self.records.values(), today);
    let result = budget::redistribute(&goal, &progress, today, planned, profile, banked);

    for daily in result.daily_targets {
      let record = self.ensure_record(daily.date);
      record.target = daily.target;
      // Re-derive the banking overlay from the fresh base
      if let Some(adjustment) = record.banking_adjustment {
        record.adjusted_target =
          Some((daily.target + adjustment).max(MIN_DAILY_CALORIES));
      }
    }
  }

  /// ---------------------------------------------------------------------------
  /// Rollover Coordinator
  /// ---------------------------------------------------------------------------

  /// Bring the goal up to date with "today". Runs opportunistically before
  /// every command/query; cheap no-op when nothing changed.
  pub fn ensure_current_week(&mut self, today: NaiveDate) {
    let Some(goal) = self.goal.as_mut() else {
      return;
    };

    // Migration path: persisted goals from before current_week_allowance
    // existed. Derive it proportionally instead of assuming a full week.
    if goal.current_week_allowance == 0 {
      let days_remaining = 7 - today.weekday().num_days_from_monday() as i32;
      goal.current_week_allowance = goal.daily_baseline * days_remaining;
    }

    if goal.contains(today) {
      self.retire_expired_sessions(today);
      return;
    }

    self.rollover(today);
  }

  fn rollover(&mut self, today: NaiveDate) {
    let Some(goal) = self.goal.as_mut() else {
      return;
    };

    let outgoing_week = goal.week_start_date;
    let (consumed, burned) = self
      .records
      .values()
      .filter(|r| r.date >= outgoing_week && r.date < outgoing_week + chrono::Duration::days(7))
      .fold((0, 0), |(c, b), r| (c + r.consumed, b + r.burned));

    // Unused budget loosens next week, overage tightens it
    let carryover = goal.current_week_allowance - (consumed - burned);
    let new_allowance = (goal.weekly_allowance + carryover).max(MIN_DAILY_CALORIES * 7);

    goal.week_start_date = week_start_for(today);
    goal.current_week_allowance = new_allowance;

    // A banking plan aimed at a date that no longer exists is meaningless
    let plan_survives = goal
      .banking_plan
      .as_ref()
      .is_some_and(|p| p.is_active && goal.contains(p.target_date));
    if !plan_survives {
      goal.banking_plan = None;
    }

    let week_start = goal.week_start_date;
    let week_end = week_start + chrono::Duration::days(7);
    self.records.retain(|date, _| *date >= week_start && *date < week_end);

    if !plan_survives {
      for record in self.records.values_mut() {
        record.clear_banking_overlay();
      }
    }

    // Unacknowledged events for pruned dates can never be acted on
    self.events.retain(|e| e.date >= week_start);

    self.retire_expired_sessions(today);
  }

  fn retire_expired_sessions(&mut self, today: NaiveDate) {
    for session in &mut self.sessions {
      if session.is_active() && session.days_remaining(today) == 0 {
        session.status = SessionStatus::Completed;
      }
    }
  }

  /// ---------------------------------------------------------------------------
  /// Query Helpers
  /// ---------------------------------------------------------------------------

  pub fn weekly_progress(&self, today: NaiveDate) -> Option<WeeklyProgress> {
    let goal = self.goal.as_ref()?;
    Some(WeeklyProgress::compute(goal, self.records.values(), today))
  }

  /// Today's effective target: the valid lock if present, else lock now.
  /// This is the single path every remaining-calories / detection consumer
  /// goes through, which is what keeps the number stable all day.
  pub fn effective_target_today(&mut self, now: DateTime<Utc>) -> Option<i32> {
    self.goal.as_ref()?;
    let today = now.date_naive();
    match self.get_locked_target(today, today) {
      Some(target) => Some(target),
      None => Some(self.lock_daily_target(today, now)),
    }
  }

  pub fn remaining_calories_for_today(&mut self, now: DateTime<Utc>) -> Option<i32> {
    let target = self.effective_target_today(now)?;
    let record = self.record(now.date_naive());
    let consumed = record.map(|r| r.consumed).unwrap_or(0);
    let burned = record.map(|r| r.burned).unwrap_or(0);
    Some(target - consumed + burned)
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
