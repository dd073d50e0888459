use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::db::operations::users::GLOBAL_USERNAME;
use crate::db::sqlite_schema::{split_sql_statements, SCHEMA_VERSION, SQLITE_SCHEMA_SQL};

pub fn default_sqlite_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("noobular")
        .join("noobular.db")
}

pub async fn init_sqlite_pool(db_path: &Path) -> Result<SqlitePool, SqliteInitError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SqliteInitError::Io(e.to_string()))?;
        }
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)
        .map_err(|e| SqliteInitError::Config(e.to_string()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(SqliteInitError::Sqlx)?;

    run_sqlite_migrations(&pool).await?;
    ensure_global_user(&pool).await?;

    Ok(pool)
}

pub async fn run_sqlite_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    let version: Option<String> =
        sqlx::query_scalar(r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#)
            .fetch_optional(pool)
            .await
            .unwrap_or(None);

    if version.is_some() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for stmt in split_sql_statements(SQLITE_SCHEMA_SQL) {
        sqlx::query(&stmt).execute(&mut *tx).await?;
    }
    sqlx::query(r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', ?)"#)
        .bind(SCHEMA_VERSION)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(version = SCHEMA_VERSION, "sqlite schema applied");
    Ok(())
}

/// The shared user that requests without a username act as.
pub async fn ensure_global_user(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(r#"INSERT OR IGNORE INTO "users" ("username", "created_at") VALUES (?, ?)"#)
        .bind(GLOBAL_USERNAME)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SqliteInitError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}
