mod banking;
mod budget;
mod clock;
mod commands;
mod db;
mod engine;
mod jobs;
mod llm;
mod models;
mod recovery;
mod storage;
mod tracker;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use db::AppState;
use models::BudgetPolicy;
use tauri::Manager;
use tokio::sync::RwLock;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tauri::Builder::default()
    .plugin(tauri_plugin_opener::init())
    .setup(|app| {
      // Initialize database and load the persisted engine state
      let app_handle = app.handle().clone();
      tauri::async_runtime::block_on(async move {
        match db::initialize_db(&app_handle).await {
          Ok(pool) => {
            let engine = match storage::load_state(&pool).await {
              Ok(state) => state,
              Err(e) => {
                eprintln!("Failed to load engine state: {}", e);
                engine::EngineState::default()
              }
            };
            let state = Arc::new(AppState {
              db: pool,
              engine: RwLock::new(engine),
              policy: BudgetPolicy::default(),
              clock: Arc::new(clock::SystemClock),
            });
            app_handle.manage(state);
            println!("Database ready");
          }
          Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
          }
        }
      });
      Ok(())
    })
    .invoke_handler(tauri::generate_handler![
      // Week and day queries
      commands::get_current_week_progress,
      commands::get_calorie_redistribution,
      commands::get_remaining_calories_for_today,
      commands::get_daily_progress,
      commands::get_locked_daily_target,
      commands::get_calorie_bank_status,
      commands::get_pending_overeating_event,
      commands::get_active_recovery_session,
      // Logging and goal
      commands::log::log_meal,
      commands::log::log_workout,
      commands::log::update_daily_calories,
      commands::log::update_burned_calories,
      commands::log::log_water_glass,
      commands::log::set_weekly_goal,
      commands::log::get_weekly_goal,
      // Banking
      commands::banking::validate_banking_plan,
      commands::banking::create_banking_plan,
      commands::banking::update_banking_plan,
      commands::banking::cancel_banking_plan,
      // Recovery
      commands::recovery::detect_overeating,
      commands::recovery::acknowledge_overeating_event,
      commands::recovery::cleanup_stale_recovery_events,
      commands::recovery::get_recovery_plan,
      commands::recovery::start_recovery_session,
      commands::recovery::abandon_recovery_session,
      // Tracker commands
      commands::tracker::tracker_start_auth,
      commands::tracker::tracker_complete_auth,
      commands::tracker::tracker_get_auth_status,
      commands::tracker::tracker_refresh_auth,
      commands::tracker::tracker_disconnect,
      commands::tracker::tracker_sync_burned,
    ])
    .run(tauri::generate_context!())
    .expect("error while running tauri application");
}
