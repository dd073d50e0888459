use sqlx::{Row, SqliteConnection};

use noobular_algo::UserId;

pub const GLOBAL_USERNAME: &str = "global";

pub async fn find_or_create_user(
    conn: &mut SqliteConnection,
    username: &str,
    now_ms: i64,
) -> Result<UserId, sqlx::Error> {
    sqlx::query(r#"INSERT OR IGNORE INTO "users" ("username", "created_at") VALUES (?, ?)"#)
        .bind(username)
        .bind(now_ms)
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query(r#"SELECT "id" FROM "users" WHERE "username" = ?"#)
        .bind(username)
        .fetch_one(&mut *conn)
        .await?;
    row.try_get("id")
}
