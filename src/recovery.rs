//! Overeating detection and recovery planning
//!
//! Detection compares a day's consumed calories against its *locked* target,
//! so the threshold can't drift under the user mid-day. Burned calories don't
//! offset the excess; they already widen the weekly budget. Events are
//! idempotent per date: re-running detection updates the existing event in
//! place, and drops it if the day falls back under threshold.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineState;
use crate::models::{
  week_start_for, BudgetPolicy, EffortLevel, OvereatingEvent, RecoveryImpact, RecoveryOption,
  RecoveryPlan, RecoverySession, RiskLevel, SessionStatus, TriggerSeverity, MIN_DAILY_CALORIES,
};

/// Unacknowledged events older than this are unactionable and get dropped
const STALE_EVENT_DAYS: i64 = 2;

/// ---------------------------------------------------------------------------
/// Detection
/// ---------------------------------------------------------------------------

fn classify(policy: &BudgetPolicy, excess: i32) -> Option<TriggerSeverity> {
  let t = &policy.overeating;
  if excess >= t.severe {
    Some(TriggerSeverity::Severe)
  } else if excess >= t.moderate {
    Some(TriggerSeverity::Moderate)
  } else if excess >= t.mild {
    Some(TriggerSeverity::Mild)
  } else {
    None
  }
}

/// Consumed excess over the day's locked target. Locking happens here if the
/// day was never read before, so detection and the UI agree on the same
/// number. Burned calories are deliberately not subtracted: a workout earns
/// budget elsewhere, it doesn't un-eat the meal.
fn excess_for(state: &mut EngineState, date: NaiveDate, now: DateTime<Utc>) -> Option<i32> {
  state.goal.as_ref()?;
  let target = state.lock_daily_target(date, now);
  let record = state.record(date)?;
  Some(record.consumed - target)
}

/// Raw detection: classify the day's excess and upsert the event.
pub fn detect(
  state: &mut EngineState,
  policy: &BudgetPolicy,
  date: NaiveDate,
  now: DateTime<Utc>,
) -> Option<OvereatingEvent> {
  let excess = excess_for(state, date, now)?;
  upsert_event(state, policy, date, excess)
}

/// Pace-aware detection: a day that looks like overeating in isolation is
/// forgiven to the extent the rest of the week already banked slack. Only
/// days before `date` count; eating ahead of tomorrow is not slack.
pub fn detect_pace_aware(
  state: &mut EngineState,
  policy: &BudgetPolicy,
  date: NaiveDate,
  now: DateTime<Utc>,
) -> Option<OvereatingEvent> {
  let raw = excess_for(state, date, now)?;
  let slack = weekly_slack_before(state, date);
  upsert_event(state, policy, date, raw - slack)
}

/// Sum of under-target headroom on this week's days before `date`.
fn weekly_slack_before(state: &EngineState, date: NaiveDate) -> i32 {
  let Some(goal) = state.goal.as_ref() else {
    return 0;
  };
  state
    .records
    .values()
    .filter(|r| goal.contains(r.date) && r.date < date)
    .map(|r| (r.effective_base_target() - (r.consumed - r.burned)).max(0))
    .sum()
}

/// At most one event per date. Under-threshold days clear any pending event;
/// escalation re-surfaces an event the user already dismissed.
fn upsert_event(
  state: &mut EngineState,
  policy: &BudgetPolicy,
  date: NaiveDate,
  excess: i32,
) -> Option<OvereatingEvent> {
  let Some(severity) = classify(policy, excess) else {
    state.events.retain(|e| e.date != date || e.user_acknowledged);
    return None;
  };

  if let Some(event) = state.events.iter_mut().find(|e| e.date == date) {
    if severity > event.trigger_type {
      event.user_acknowledged = false;
    }
    event.excess_calories = excess;
    event.trigger_type = severity;
    return Some(event.clone());
  }

  let event = OvereatingEvent {
    id: state.allocate_event_id(),
    date,
    excess_calories: excess,
    trigger_type: severity,
    user_acknowledged: false,
  };
  state.events.push(event.clone());
  Some(event)
}

pub fn acknowledge_event(state: &mut EngineState, event_id: i64) -> bool {
  match state.events.iter_mut().find(|e| e.id == event_id) {
    Some(event) => {
      event.user_acknowledged = true;
      true
    }
    None => false,
  }
}

/// Drop unacknowledged events too old to act on.
pub fn cleanup_stale_events(state: &mut EngineState, today: NaiveDate) {
  let cutoff = today - Duration::days(STALE_EVENT_DAYS);
  state.events.retain(|e| e.user_acknowledged || e.date >= cutoff);
}

/// ---------------------------------------------------------------------------
/// Recovery Plan Generation
/// ---------------------------------------------------------------------------

/// Build the menu of rebalancing options for an event. Pure computation; AI
/// activity suggestions are merged in later by the command layer when the
/// collaborator is reachable.
pub fn create_recovery_plan(
  state: &EngineState,
  event_id: i64,
  today: NaiveDate,
) -> Result<RecoveryPlan, String> {
  let goal = state
    .goal
    .as_ref()
    .ok_or_else(|| "No active weekly goal".to_string())?;
  let event = state
    .events
    .iter()
    .find(|e| e.id == event_id)
    .ok_or_else(|| format!("Overeating event {} not found", event_id))?;

  let excess = event.excess_calories.max(0);
  let baseline = goal.daily_baseline;

  // Days left after today until next Monday; the gentle option spreads the
  // debt across all of them
  let next_monday = week_start_for(today) + Duration::days(7);
  let spread_days = ((next_monday - today).num_days() as i32 - 1).max(1);

  let options = vec![
    build_option(
      "gentle",
      "Gentle rebalance",
      format!("Spread the {} kcal across the rest of the week", excess),
      baseline,
      excess,
      spread_days,
      EffortLevel::Minimal,
      RiskLevel::Safe,
      true,
    ),
    build_option(
      "steady",
      "Three-day reset",
      format!("Repay the {} kcal over the next three days", excess),
      baseline,
      excess,
      3,
      EffortLevel::Moderate,
      RiskLevel::Moderate,
      false,
    ),
    build_option(
      "aggressive",
      "Next-day correction",
      format!("Absorb the full {} kcal tomorrow", excess),
      baseline,
      excess,
      1,
      EffortLevel::Challenging,
      RiskLevel::Aggressive,
      false,
    ),
  ];

  Ok(RecoveryPlan {
    event_id: event.id,
    event_date: event.date,
    excess_calories: excess,
    options,
    activity_suggestions: Vec::new(),
  })
}

#[allow(clippy::too_many_arguments)]
fn build_option(
  id: &str,
  name: &str,
  description: String,
  baseline: i32,
  excess: i32,
  duration_days: i32,
  effort_level: EffortLevel,
  risk_level: RiskLevel,
  recommended: bool,
) -> RecoveryOption {
  // Stable equivalent of the unstable signed `div_ceil`; the divisor is
  // always positive thanks to `.max(1)`.
  let divisor = duration_days.max(1);
  let per_day = excess / divisor + i32::from(excess % divisor > 0);
  let unfloored = baseline - per_day;
  let new_daily_target = unfloored.max(MIN_DAILY_CALORIES);

  let mut pros = vec![format!("Back on track in {} day(s)", duration_days)];
  let mut cons = Vec::new();
  if per_day <= 150 {
    pros.push("Barely noticeable daily change".to_string());
  } else {
    cons.push(format!("{} kcal less per day", per_day));
  }
  if unfloored < MIN_DAILY_CALORIES {
    cons.push(format!(
      "Capped at the {} kcal minimum; the remainder carries into next week's allowance",
      MIN_DAILY_CALORIES
    ));
  }

  RecoveryOption {
    id: id.to_string(),
    name: name.to_string(),
    description,
    pros,
    cons,
    impact: RecoveryImpact {
      new_daily_target,
      effort_level,
      risk_level,
      duration_days,
    },
    recommended,
  }
}

/// ---------------------------------------------------------------------------
/// Session Lifecycle
/// ---------------------------------------------------------------------------

/// Start the chosen option. Acknowledges the event, writes the reduced target
/// onto each covered day, and clears those days' locks so the new target
/// takes effect on the next read.
pub fn start_session(
  state: &mut EngineState,
  event_id: i64,
  option_id: &str,
  today: NaiveDate,
) -> Result<RecoverySession, String> {
  if state.active_session().is_some() {
    return Err("A recovery session is already active".to_string());
  }
  if state
    .goal
    .as_ref()
    .is_some_and(|g| g.active_banking_plan().is_some())
  {
    return Err("Cannot start recovery while a banking plan is active".to_string());
  }

  let plan = create_recovery_plan(state, event_id, today)?;
  let option = plan
    .option(option_id)
    .ok_or_else(|| format!("Unknown recovery option '{}'", option_id))?
    .clone();

  acknowledge_event(state, event_id);

  let session = RecoverySession {
    id: state.allocate_session_id(),
    event_id,
    option_id: option.id.clone(),
    adjusted_target: option.impact.new_daily_target,
    started_on: today,
    duration_days: option.impact.duration_days,
    adherence_rate: 1.0,
    status: SessionStatus::Active,
  };

  for offset in 0..session.duration_days {
    let date = today + Duration::days(offset as i64);
    let record = state.ensure_record(date);
    record.target = session.adjusted_target;
    record.locked_daily_target = None;
    record.target_locked_at = None;
  }

  state.sessions.push(session.clone());
  Ok(session)
}

/// Abandon the active session and restore the baseline target on the days it
/// still covered. Past session days keep their reduced targets.
pub fn abandon_session(state: &mut EngineState, today: NaiveDate) -> bool {
  let baseline = match state.goal.as_ref() {
    Some(goal) => goal.daily_baseline,
    None => return false,
  };

  let Some(session) = state.active_session_mut() else {
    return false;
  };
  session.status = SessionStatus::Abandoned;
  let end = session.started_on + Duration::days(session.duration_days as i64);

  let mut date = today.max(session.started_on);
  while date < end {
    let record = state.ensure_record(date);
    record.target = baseline;
    record.locked_daily_target = None;
    record.target_locked_at = None;
    date += Duration::days(1);
  }

  true
}

/// Recompute the active session's adherence: the fraction of completed
/// session days where net intake stayed at or under the adjusted target.
pub fn update_adherence(state: &mut EngineState, today: NaiveDate) {
  let Some(session) = state.active_session() else {
    return;
  };
  let end = session.started_on + Duration::days(session.duration_days as i64);
  let adjusted_target = session.adjusted_target;
  let started_on = session.started_on;

  let mut elapsed = 0;
  let mut adherent = 0;
  let mut date = started_on;
  while date < end.min(today) {
    elapsed += 1;
    let net = state
      .record(date)
      .map(|r| r.consumed - r.burned)
      .unwrap_or(0);
    if net <= adjusted_target {
      adherent += 1;
    }
    date += Duration::days(1);
  }

  let rate = if elapsed == 0 {
    1.0
  } else {
    adherent as f64 / elapsed as f64
  };
  if let Some(session) = state.active_session_mut() {
    session.adherence_rate = rate;
  }
}

/// ---------------------------------------------------------------------------
/// AI Enrichment Context
/// ---------------------------------------------------------------------------

/// Everything the activity-suggestion prompt needs about an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionContext {
  pub excess_calories: i32,
  pub severity: String,
  pub daily_baseline: i32,
  pub recent_workout_names: Vec<String>,
}

impl SuggestionContext {
  pub fn for_event(state: &EngineState, event: &OvereatingEvent) -> Self {
    let recent_workout_names = state
      .records
      .values()
      .flat_map(|r| r.workouts.iter())
      .map(|w| w.name.clone())
      .collect();
    Self {
      excess_calories: event.excess_calories,
      severity: event.trigger_type.to_string(),
      daily_baseline: state.goal.as_ref().map(|g| g.daily_baseline).unwrap_or(0),
      recent_workout_names,
    }
  }
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

  fn noon(d: NaiveDate) -> DateTime<Utc> {
    d.and_hms_opt(12, 0, 0).unwrap().and_utc()
  }

  fn state_with_goal() -> EngineState {
    let mut state = EngineState::default();
    state.set_weekly_goal(2000, date(2025, 3, 10));
    state
  }

  fn policy() -> BudgetPolicy {
    BudgetPolicy::default()
  }

  #[test]
  fn test_scenario_c_severe_classification() {
    // 2700 consumed against a 2000 target: 700 excess, right at the severe
    // threshold
    let mut state = state_with_goal();
    let today = date(2025, 3, 12);
    state.log_meal(today, "Buffet", 2700, noon(today));

    let event = detect(&mut state, &policy(), today, noon(today)).unwrap();
    assert_eq!(event.excess_calories, 700);
    assert_eq!(event.trigger_type, TriggerSeverity::Severe);
    assert!(!event.user_acknowledged);

    // Recovery must offer real options, all above the safety floor
    let plan = create_recovery_plan(&state, event.id, today).unwrap();
    assert_eq!(plan.options.len(), 3);
    assert!(plan.recommended_option().is_some());
    for option in &plan.options {
      assert!(option.impact.new_daily_target >= MIN_DAILY_CALORIES);
    }
  }

  #[test]
  fn test_detection_uses_locked_target() {
    let mut state = state_with_goal();
    let today = date(2025, 3, 12);
    state.ensure_record(today).target = 1800;
    state.lock_daily_target(today, noon(today));

    // Base target drifts afterwards; detection still measures against 1800
    state.records.get_mut(&today).unwrap().target = 2400;
    state.log_meal(today, "Dinner", 2100, noon(today));

    let event = detect(&mut state, &policy(), today, noon(today)).unwrap();
    assert_eq!(event.excess_calories, 300);
    assert_eq!(event.trigger_type, TriggerSeverity::Mild);
  }

  #[test]
  fn test_detection_is_idempotent_and_escalates_in_place() {
    let mut state = state_with_goal();
    let today = date(2025, 3, 12);
    state.log_meal(today, "Lunch", 2300, noon(today));

    let first = detect(&mut state, &policy(), today, noon(today)).unwrap();
    let second = detect(&mut state, &policy(), today, noon(today)).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(state.events.len(), 1);

    // Dismiss, then eat more: the event escalates and re-surfaces
    acknowledge_event(&mut state, first.id);
    state.log_meal(today, "Dessert", 500, noon(today));
    let escalated = detect(&mut state, &policy(), today, noon(today)).unwrap();
    assert_eq!(escalated.id, first.id);
    assert_eq!(escalated.trigger_type, TriggerSeverity::Severe);
    assert!(!escalated.user_acknowledged);
    assert_eq!(state.events.len(), 1);
  }

  #[test]
  fn test_under_threshold_clears_pending_event() {
    let mut state = state_with_goal();
    let today = date(2025, 3, 12);
    state.log_meal(today, "Lunch", 2300, noon(today));
    assert!(detect(&mut state, &policy(), today, noon(today)).is_some());

    // The user corrects the entry; the day falls back under threshold
    state.update_daily_calories(today, 2100);
    assert!(detect(&mut state, &policy(), today, noon(today)).is_none());
    assert!(state.events.is_empty());
  }

  #[test]
  fn test_workout_does_not_offset_excess() {
    // 2300 consumed against a 2000 target is a 300 excess no matter how much
    // was burned; the workout credit lands in the weekly budget instead
    let mut state = state_with_goal();
    let today = date(2025, 3, 12);
    state.log_meal(today, "Lunch", 2300, noon(today));
    state.log_workout(today, "Run", 200, noon(today));

    let event = detect(&mut state, &policy(), today, noon(today)).unwrap();
    assert_eq!(event.excess_calories, 300);
    assert_eq!(event.trigger_type, TriggerSeverity::Mild);

    // More burned still doesn't clear it
    state.log_workout(today, "Evening ride", 400, noon(today));
    let event = detect(&mut state, &policy(), today, noon(today)).unwrap();
    assert_eq!(event.excess_calories, 300);
    assert_eq!(state.events.len(), 1);
  }

  #[test]
  fn test_pace_aware_detection_forgives_banked_slack() {
    let mut state = state_with_goal();
    // Monday and Tuesday each 400 under target
    state.update_daily_calories(date(2025, 3, 10), 1600);
    state.update_daily_calories(date(2025, 3, 11), 1600);

    let today = date(2025, 3, 12);
    state.log_meal(today, "Feast", 2400, noon(today));

    // Raw excess 400 would be mild, but 800 of slack absorbs it
    assert!(detect_pace_aware(&mut state, &policy(), today, noon(today)).is_none());

    // Without the slack the same day triggers
    let mut isolated = state_with_goal();
    isolated.log_meal(today, "Feast", 2400, noon(today));
    assert!(detect(&mut isolated, &policy(), today, noon(today)).is_some());
  }

  #[test]
  fn test_gentle_option_spreads_to_next_monday() {
    let mut state = state_with_goal();
    let today = date(2025, 3, 12);
    state.log_meal(today, "Buffet", 2700, noon(today));
    let event = detect(&mut state, &policy(), today, noon(today)).unwrap();

    // Wednesday: 4 days remain (Thu-Sun), 700 / 4 rounded up = 175
    let plan = create_recovery_plan(&state, event.id, today).unwrap();
    let gentle = plan.option("gentle").unwrap();
    assert!(gentle.recommended);
    assert_eq!(gentle.impact.duration_days, 4);
    assert_eq!(gentle.impact.new_daily_target, 2000 - 175);

    let aggressive = plan.option("aggressive").unwrap();
    assert_eq!(aggressive.impact.duration_days, 1);
    assert_eq!(aggressive.impact.new_daily_target, 1300);
  }

  #[test]
  fn test_start_session_applies_targets_and_acknowledges() {
    let mut state = state_with_goal();
    let today = date(2025, 3, 12);
    state.log_meal(today, "Buffet", 2700, noon(today));
    let event = detect(&mut state, &policy(), today, noon(today)).unwrap();

    let session = start_session(&mut state, event.id, "steady", today).unwrap();
    assert_eq!(session.duration_days, 3);
    assert!(session.is_active());
    assert!(state.events[0].user_acknowledged);

    // 700 / 3 rounded up = 234 off the baseline, on each covered day
    for offset in 0..3 {
      let d = today + Duration::days(offset);
      let record = state.record(d).unwrap();
      assert_eq!(record.target, 2000 - 234);
      assert!(record.locked_daily_target.is_none());
    }
  }

  #[test]
  fn test_second_session_rejected_while_one_is_active() {
    let mut state = state_with_goal();
    let today = date(2025, 3, 12);
    state.log_meal(today, "Buffet", 2700, noon(today));
    let event = detect(&mut state, &policy(), today, noon(today)).unwrap();
    start_session(&mut state, event.id, "gentle", today).unwrap();

    let err = start_session(&mut state, event.id, "steady", today).unwrap_err();
    assert!(err.contains("already active"));
  }

  #[test]
  fn test_session_blocked_by_active_banking_plan() {
    let mut state = state_with_goal();
    let today = date(2025, 3, 10);
    crate::banking::create_plan(&mut state, &policy(), today, date(2025, 3, 13), 200);

    state.log_meal(today, "Buffet", 2900, noon(today));
    let event = detect(&mut state, &policy(), today, noon(today)).unwrap();

    let err = start_session(&mut state, event.id, "gentle", today).unwrap_err();
    assert!(err.contains("banking"));
  }

  #[test]
  fn test_abandon_restores_remaining_days_only() {
    let mut state = state_with_goal();
    let wednesday = date(2025, 3, 12);
    state.log_meal(wednesday, "Buffet", 2700, noon(wednesday));
    let event = detect(&mut state, &policy(), wednesday, noon(wednesday)).unwrap();
    start_session(&mut state, event.id, "steady", wednesday).unwrap();

    // Abandon on Friday: Wed/Thu keep the reduced target, Fri is restored
    assert!(abandon_session(&mut state, date(2025, 3, 14)));
    assert_eq!(state.sessions[0].status, SessionStatus::Abandoned);
    assert_eq!(state.record(wednesday).unwrap().target, 2000 - 234);
    assert_eq!(state.record(date(2025, 3, 13)).unwrap().target, 2000 - 234);
    assert_eq!(state.record(date(2025, 3, 14)).unwrap().target, 2000);
  }

  #[test]
  fn test_adherence_counts_completed_days() {
    let mut state = state_with_goal();
    let monday = date(2025, 3, 10);
    state.log_meal(monday, "Buffet", 2700, noon(monday));
    let event = detect(&mut state, &policy(), monday, noon(monday)).unwrap();
    let session = start_session(&mut state, event.id, "steady", monday).unwrap();
    let target = session.adjusted_target;

    // Monday over the adjusted target, Tuesday under it
    state.update_daily_calories(monday, target + 300);
    state.update_daily_calories(date(2025, 3, 11), target - 100);

    update_adherence(&mut state, date(2025, 3, 12));
    let rate = state.active_session().unwrap().adherence_rate;
    crate::assert_approx_eq!(rate, 0.5, 1e-9);
  }

  #[test]
  fn test_stale_unacknowledged_events_are_dropped() {
    let mut state = state_with_goal();
    state.events.push(OvereatingEvent {
      id: 1,
      date: date(2025, 3, 10),
      excess_calories: 300,
      trigger_type: TriggerSeverity::Moderate,
      user_acknowledged: false,
    });
    state.events.push(OvereatingEvent {
      id: 2,
      date: date(2025, 3, 11),
      excess_calories: 500,
      trigger_type: TriggerSeverity::Severe,
      user_acknowledged: true,
    });

    cleanup_stale_events(&mut state, date(2025, 3, 14));

    // The unacknowledged Monday event is too old; the acknowledged one stays
    assert_eq!(state.events.len(), 1);
    assert_eq!(state.events[0].id, 2);
  }
}
