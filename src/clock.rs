//! Injected time source
//!
//! Stale-lock detection asks "was this timestamp set today?", which is a
//! wall-clock question. The engine takes a `Clock` instead of reading
//! `Utc::now()` ambiently so the transitions stay deterministic in tests.

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  fn today(&self) -> NaiveDate {
    self.now().date_naive()
  }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Fixed clock for tests; `advance_days` simulates crossing midnight.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct FixedClock {
  pub now: DateTime<Utc>,
}

#[cfg(test)]
impl FixedClock {
  pub fn on_date(date: NaiveDate) -> Self {
    Self {
      now: date.and_hms_opt(12, 0, 0).expect("valid time").and_utc(),
    }
  }

  pub fn advance_days(&mut self, days: i64) {
    self.now += chrono::Duration::days(days);
  }
}

#[cfg(test)]
impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.now
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_fixed_clock_today_follows_advance() {
    let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    let mut clock = FixedClock::on_date(date);
    assert_eq!(clock.today(), date);

    clock.advance_days(2);
    assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
  }

  #[test]
  fn test_system_clock_is_current() {
    let clock = SystemClock;
    let diff = Utc::now() - clock.now();
    assert!(diff.num_seconds().abs() < 5);
  }
}
