pub mod daily;
pub mod goal;
pub mod policy;
pub mod recovery;

pub use daily::{DailyRecord, MealEntry, WorkoutEntry};
pub use goal::{week_start_for, BankingPlan, WeeklyGoal};
pub use policy::{BudgetPolicy, OvereatingThresholds, MIN_DAILY_CALORIES};
pub use recovery::{
  EffortLevel, OvereatingEvent, RecoveryImpact, RecoveryOption, RecoveryPlan, RecoverySession,
  RiskLevel, SessionStatus, TriggerSeverity,
};
