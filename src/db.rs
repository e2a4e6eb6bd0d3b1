use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tauri::Manager;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::engine::EngineState;
use crate::models::BudgetPolicy;

pub type DbPool = SqlitePool;

/// Application state shared across commands. The engine state lives behind a
/// single RwLock: commands take the write lock for the whole
/// read-mutate-persist cycle, queries take the read lock.
pub struct AppState {
  pub db: DbPool,
  pub engine: RwLock<EngineState>,
  pub policy: BudgetPolicy,
  pub clock: Arc<dyn Clock>,
}

/// Get the path to the database file
/// Stored in: ~/Library/Application Support/com.samleuthold.calorie-coach/calorie-coach.db
fn get_db_path<R: tauri::Runtime>(app: &tauri::AppHandle<R>) -> Result<PathBuf, Box<dyn std::error::Error>> {
  let data_dir = app
    .path()
    .app_data_dir()
    .map_err(|e| format!("Failed to get app data dir: {}", e))?;

  // Create directory if it doesn't exist
  fs::create_dir_all(&data_dir)?;

  Ok(data_dir.join("calorie-coach.db"))
}

/// Initialize the database connection pool and run migrations
pub async fn initialize_db<R: tauri::Runtime>(app: &tauri::AppHandle<R>) -> Result<DbPool, Box<dyn std::error::Error>> {
  let db_path = get_db_path(app)?;
  let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

  println!("Initializing database at: {}", db_path.display());

  // Create connection pool
  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  // Run migrations
  sqlx::migrate!("./migrations").run(&pool).await?;

  println!("Database initialized successfully");

  Ok(pool)
}
