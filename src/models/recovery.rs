use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// ---------------------------------------------------------------------------
/// Overeating Events
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSeverity {
  Mild,
  Moderate,
  Severe,
}

impl std::fmt::Display for TriggerSeverity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Mild => write!(f, "mild"),
      Self::Moderate => write!(f, "moderate"),
      Self::Severe => write!(f, "severe"),
    }
  }
}

/// At most one unacknowledged event per date. Re-detection updates the event
/// in place rather than duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OvereatingEvent {
  pub id: i64,
  pub date: NaiveDate,
  pub excess_calories: i32,
  pub trigger_type: TriggerSeverity,
  pub user_acknowledged: bool,
}

/// ---------------------------------------------------------------------------
/// Recovery Plans
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffortLevel {
  Minimal,
  Moderate,
  Challenging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
  Safe,
  Moderate,
  Aggressive,
}

/// What starting an option would actually do to the user's targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryImpact {
  pub new_daily_target: i32,
  pub effort_level: EffortLevel,
  pub risk_level: RiskLevel,
  pub duration_days: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryOption {
  pub id: String,
  pub name: String,
  pub description: String,
  pub pros: Vec<String>,
  pub cons: Vec<String>,
  pub impact: RecoveryImpact,
  pub recommended: bool,
}

/// Menu of rebalancing options generated for one overeating event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPlan {
  pub event_id: i64,
  pub event_date: NaiveDate,
  pub excess_calories: i32,
  pub options: Vec<RecoveryOption>,
  /// Best-effort AI enrichment; empty when the collaborator is unavailable
  #[serde(default)]
  pub activity_suggestions: Vec<String>,
}

impl RecoveryPlan {
  pub fn option(&self, option_id: &str) -> Option<&RecoveryOption> {
    self.options.iter().find(|o| o.id == option_id)
  }

  pub fn recommended_option(&self) -> Option<&RecoveryOption> {
    self.options.iter().find(|o| o.recommended)
  }
}

/// ---------------------------------------------------------------------------
/// Recovery Sessions
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
  Active,
  Completed,
  Abandoned,
}

/// Live tracking of whichever recovery option the user started.
/// At most one session is active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySession {
  pub id: i64,
  pub event_id: i64,
  pub option_id: String,
  pub adjusted_target: i32,
  pub started_on: NaiveDate,
  pub duration_days: i32,
  pub adherence_rate: f64,
  pub status: SessionStatus,
}

impl RecoverySession {
  pub fn days_remaining(&self, today: NaiveDate) -> i32 {
    let elapsed = (today - self.started_on).num_days() as i32;
    (self.duration_days - elapsed).max(0)
  }

  pub fn is_active(&self) -> bool {
    self.status == SessionStatus::Active
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
