use serde::{Deserialize, Serialize};

/// Minimum safe daily calories. Every computed target - redistribution
/// output, banking-adjusted day, recovery-adjusted target - is floored here
/// as a final step.
pub const MIN_DAILY_CALORIES: i32 = 1200;

/// Overeating classification thresholds. These are product policy, not
/// physiology, so they live in configuration rather than code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OvereatingThresholds {
  pub mild: i32,
  pub moderate: i32,
  pub severe: i32,
}

impl Default for OvereatingThresholds {
  fn default() -> Self {
    Self {
      mild: 200,
      moderate: 450,
      severe: 700,
    }
  }
}

/// Tunable policy knobs for the budget engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetPolicy {
  pub overeating: OvereatingThresholds,

  /// Hard cap on a banking plan's per-day reduction
  pub banking_reduction_cap: i32,

  /// Reductions above this are allowed but flagged as likely unsustainable
  pub banking_reduction_warning: i32,

  /// Warn when a banked day's projected target lands within this margin of
  /// the safety floor
  pub banking_floor_margin: i32,
}

impl Default for BudgetPolicy {
  fn default() -> Self {
    Self {
      overeating: OvereatingThresholds::default(),
      banking_reduction_cap: 500,
      banking_reduction_warning: 300,
      banking_floor_margin: 100,
    }
  }
}
