//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for the roster, check-in histories, the mode
//! partition, the daily counters and the activity registry.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run embedded migrations
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Create tables if they don't exist
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            roster_generation INTEGER NOT NULL DEFAULT 0,
            is_demo_mode INTEGER NOT NULL DEFAULT 1,
            activity_name TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, roster_generation, is_demo_mode, activity_name, updated_at)
        VALUES (1, 1, 0, 1, '', datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    // check_ins holds a JSON array of {at, mode} in arrival order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS participants (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            english_name TEXT NOT NULL,
            voice_part TEXT NOT NULL,
            is_valid INTEGER NOT NULL DEFAULT 1,
            check_ins TEXT NOT NULL DEFAULT '[]',
            load_order INTEGER NOT NULL,
            generation INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_counters (
            mode TEXT PRIMARY KEY CHECK (mode IN ('demo', 'live')),
            count INTEGER NOT NULL DEFAULT 0,
            counting_date TEXT
        );

        INSERT OR IGNORE INTO daily_counters (mode, count) VALUES ('demo', 0);
        INSERT OR IGNORE INTO daily_counters (mode, count) VALUES ('live', 0);
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_participants_load_order ON participants(load_order);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
