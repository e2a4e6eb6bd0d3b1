//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - AppState and engine fixtures
//! - Helper assertions

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::clock::FixedClock;
use crate::db::AppState;
use crate::engine::EngineState;
use crate::models::BudgetPolicy;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  // Run migrations
  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// ---------------------------------------------------------------------------
/// AppState Fixtures
/// ---------------------------------------------------------------------------

/// Fixed date all command tests run on: a Wednesday mid-week
pub fn test_today() -> NaiveDate {
  NaiveDate::from_ymd_opt(2025, 3, 12).expect("valid date")
}

/// Full AppState with an empty engine and a fixed clock (Wednesday noon)
pub fn test_app_state(pool: SqlitePool) -> Arc<AppState> {
  Arc::new(AppState {
    db: pool,
    engine: RwLock::new(EngineState::default()),
    policy: BudgetPolicy::default(),
    clock: Arc::new(FixedClock::on_date(test_today())),
  })
}

/// AppState with a 2000 kcal/day goal already in place
pub async fn test_app_state_with_goal(pool: SqlitePool) -> Arc<AppState> {
  let state = test_app_state(pool);
  state.engine.write().await.set_weekly_goal(2000, test_today());
  state
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::Clock;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    // Verify key tables exist
    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('app_state', 'tracker_auth')",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 2, "Expected 2 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_fixture_state_uses_fixed_clock() {
    let pool = setup_test_db().await;
    let state = test_app_state_with_goal(pool.clone()).await;

    assert_eq!(state.clock.today(), test_today());
    let engine = state.engine.read().await;
    assert_eq!(engine.goal.as_ref().unwrap().daily_baseline, 2000);

    teardown_test_db(pool).await;
  }
}
