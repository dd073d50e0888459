pub mod operations;
pub mod sqlite_primary;
pub mod sqlite_schema;

use std::path::Path;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

pub use sqlite_primary::SqliteInitError;

/// Handle to the engine's SQLite database.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self, SqliteInitError> {
        let pool = sqlite_primary::init_sqlite_pool(path).await?;
        Ok(Self { pool })
    }

    /// Opens a unit of work holding the write lock for its whole lifetime,
    /// so reads of progress and the allocations derived from them are
    /// serialized per database.
    pub async fn begin(&self) -> Result<UnitOfWork, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(r#"UPDATE "_db_metadata" SET "value" = "value" WHERE "key" = 'schema_version'"#)
            .execute(&mut *tx)
            .await?;
        Ok(UnitOfWork { tx })
    }

    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

/// One request's transaction. Changes become visible only through
/// [`UnitOfWork::commit`]; dropping it rolls everything back.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}
