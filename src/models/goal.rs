use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// The Monday anchoring the week that contains `date`.
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
  date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// The active weekly calorie goal. Replaced wholesale when the user changes
/// their goal; never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyGoal {
  /// Monday of the week this goal instance covers
  pub week_start_date: NaiveDate,

  /// Steady-state daily target
  pub daily_baseline: i32,

  /// daily_baseline * 7 - the stable full-week reference, never mutated
  /// mid-week
  pub weekly_allowance: i32,

  /// The operative budget for *this* week instance. May be prorated for a
  /// partial first week or shifted by rollover carryover. Authoritative for
  /// all mid-week math.
  ///
  /// Legacy persisted goals predate this field; 0 here means "absent" and
  /// is backfilled on load (see engine::ensure_current_week).
  #[serde(default)]
  pub current_week_allowance: i32,

  /// At most one active banking plan per goal
  #[serde(default)]
  pub banking_plan: Option<BankingPlan>,
}

impl WeeklyGoal {
  /// Create a goal starting mid-week: the first week's allowance is prorated
  /// to the days that remain (today inclusive).
  pub fn new(daily_baseline: i32, today: NaiveDate) -> Self {
    let week_start = week_start_for(today);
    let days_remaining = 7 - today.weekday().num_days_from_monday() as i32;
    Self {
      week_start_date: week_start,
      daily_baseline,
      weekly_allowance: daily_baseline * 7,
      current_week_allowance: daily_baseline * days_remaining,
      banking_plan: None,
    }
  }

  /// All 7 dates of this goal's week, Monday first.
  pub fn week_dates(&self) -> Vec<NaiveDate> {
    (0..7)
      .map(|i| self.week_start_date + Duration::days(i))
      .collect()
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    date >= self.week_start_date && date < self.week_start_date + Duration::days(7)
  }

  pub fn active_banking_plan(&self) -> Option<&BankingPlan> {
    self.banking_plan.as_ref().filter(|p| p.is_active)
  }
}

/// Pre-paying for one high-calorie day by shaving `daily_reduction` off every
/// day between tomorrow and the target date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankingPlan {
  pub target_date: NaiveDate,
  pub daily_reduction: i32,
  /// daily_reduction * affected day count, credited to the target date
  pub total_banked: i32,
  pub remaining_days_count: i32,
  pub is_active: bool,
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  #[test]
  fn test_week_start_is_monday() {
    // 2025-03-12 is a Wednesday
    assert_eq!(week_start_for(date(2025, 3, 12)), date(2025, 3, 10));
    // Monday maps to itself
    assert_eq!(week_start_for(date(2025, 3, 10)), date(2025, 3, 10));
    // Sunday maps back to the previous Monday
    assert_eq!(week_start_for(date(2025, 3, 16)), date(2025, 3, 10));
  }

  #[test]
  fn test_new_goal_prorates_partial_first_week() {
    // Started on a Thursday: 4 days remain (Thu-Sun)
    let goal = WeeklyGoal::new(2000, date(2025, 3, 13));
    assert_eq!(goal.week_start_date, date(2025, 3, 10));
    assert_eq!(goal.weekly_allowance, 14000);
    assert_eq!(goal.current_week_allowance, 8000);
  }

  #[test]
  fn test_new_goal_full_week_on_monday() {
    let goal = WeeklyGoal::new(2000, date(2025, 3, 10));
    assert_eq!(goal.current_week_allowance, 14000);
  }

  #[test]
  fn test_contains_week_bounds() {
    let goal = WeeklyGoal::new(2000, date(2025, 3, 10));
    assert!(goal.contains(date(2025, 3, 10)));
    assert!(goal.contains(date(2025, 3, 16)));
    assert!(!goal.contains(date(2025, 3, 17)));
    assert!(!goal.contains(date(2025, 3, 9)));
  }

  #[test]
  fn test_legacy_goal_deserializes_without_allowance() {
    // Persisted blobs from before current_week_allowance existed
    let json = r#"{
      "week_start_date": "2025-03-10",
      "daily_baseline": 2000,
      "weekly_allowance": 14000
    }"#;
    let goal: WeeklyGoal = serde_json::from_str(json).unwrap();
    assert_eq!(goal.current_week_allowance, 0);
    assert!(goal.banking_plan.is_none());
  }
}
