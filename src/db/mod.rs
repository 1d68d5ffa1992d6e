//! Database module for SQLite persistence.
//!
//! SQLite is the coupon record store. Uniqueness of normalized codes is enforced
//! by the schema so concurrent submissions are settled by the database.

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

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coupons (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            added_on TEXT NOT NULL,
            last_updated TEXT NOT NULL,
            expired_on TEXT,
            rewards TEXT NOT NULL,
            votes_up INTEGER NOT NULL DEFAULT 0,
            votes_down INTEGER NOT NULL DEFAULT 0,
            submitted_by TEXT NOT NULL,
            verification_result TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_coupons_added_on ON coupons(added_on);
        CREATE INDEX IF NOT EXISTS idx_coupons_status ON coupons(status);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
