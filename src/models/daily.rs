use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One logged meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealEntry {
  pub name: String,
  pub calories: i32,
  pub logged_at: DateTime<Utc>,
}

/// One logged workout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutEntry {
  pub name: String,
  pub calories_burned: i32,
  pub logged_at: DateTime<Utc>,
}

/// Per-day record. Created lazily on the first meal/workout/water/burned
/// write for a date; removed only when the rollover coordinator prunes dates
/// outside the current week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
  pub date: NaiveDate,
  pub consumed: i32,
  pub burned: i32,

  /// Base target assigned by redistribution (pre-lock, pre-banking)
  pub target: i32,

  #[serde(default)]
  pub meals: Vec<MealEntry>,
  #[serde(default)]
  pub workouts: Vec<WorkoutEntry>,
  #[serde(default)]
  pub water_glasses: Option<i32>,

  /// Frozen effective target. For past dates this is immutable forever;
  /// for today it is valid only if locked on the current calendar day.
  #[serde(default)]
  pub locked_daily_target: Option<i32>,
  #[serde(default)]
  pub target_locked_at: Option<DateTime<Utc>>,

  /// Banking overlay: negative on reduced days, positive on the target date
  #[serde(default)]
  pub banking_adjustment: Option<i32>,
  #[serde(default)]
  pub adjusted_target: Option<i32>,
}

impl DailyRecord {
  pub fn new(date: NaiveDate, target: i32) -> Self {
    Self {
      date,
      consumed: 0,
      burned: 0,
      target,
      meals: Vec::new(),
      workouts: Vec::new(),
      water_glasses: None,
      locked_daily_target: None,
      target_locked_at: None,
      banking_adjustment: None,
      adjusted_target: None,
    }
  }

  /// The target the day is actually operating under before locking:
  /// banking-adjusted when an overlay exists, base otherwise.
  pub fn effective_base_target(&self) -> i32 {
    self.adjusted_target.unwrap_or(self.target)
  }

  pub fn clear_banking_overlay(&mut self) {
    self.banking_adjustment = None;
    self.adjusted_target = None;
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
