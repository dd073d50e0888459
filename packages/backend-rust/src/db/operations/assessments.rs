use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use noobular_algo::{CourseId, KpId, UserId};

// ==================== Quizzes ====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRow {
    pub id: i64,
    pub created_at_ms: i64,
    pub started_at_ms: Option<i64>,
}

fn quiz_from_row(row: SqliteRow) -> Result<QuizRow, sqlx::Error> {
    Ok(QuizRow {
        id: row.try_get("id")?,
        created_at_ms: row.try_get("created_at")?,
        started_at_ms: row.try_get("started_at")?,
    })
}

pub async fn create_quiz(
    conn: &mut SqliteConnection,
    course_id: CourseId,
    user_id: UserId,
    now_ms: i64,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO "quizzes" ("course_id", "user_id", "created_at") VALUES (?, ?, ?)"#,
    )
    .bind(course_id)
    .bind(user_id)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn last_quiz_created_at(
    conn: &mut SqliteConnection,
    course_id: CourseId,
    user_id: UserId,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT MAX("created_at") FROM "quizzes" WHERE "course_id" = ? AND "user_id" = ?"#,
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn list_quizzes(
    conn: &mut SqliteConnection,
    course_id: CourseId,
    user_id: UserId,
) -> Result<Vec<QuizRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT "id", "created_at", "started_at" FROM "quizzes"
           WHERE "course_id" = ? AND "user_id" = ? ORDER BY "id""#,
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(quiz_from_row).collect()
}

pub async fn get_quiz(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    course_id: CourseId,
    user_id: UserId,
) -> Result<Option<QuizRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "id", "created_at", "started_at" FROM "quizzes"
           WHERE "id" = ? AND "course_id" = ? AND "user_id" = ?"#,
    )
    .bind(quiz_id)
    .bind(course_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(quiz_from_row).transpose()
}

pub async fn start_quiz(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "quizzes" SET "started_at" = ? WHERE "id" = ? AND "started_at" IS NULL"#)
        .bind(now_ms)
        .bind(quiz_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// ==================== Reviews ====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub id: i64,
    pub knowledge_point_id: KpId,
}

/// Creates the review for a KP unless one already exists. Returns whether a
/// row was inserted.
pub async fn create_review(
    conn: &mut SqliteConnection,
    knowledge_point_id: KpId,
    user_id: UserId,
    now_ms: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO "reviews" ("knowledge_point_id", "user_id", "created_at")
           VALUES (?, ?, ?)"#,
    )
    .bind(knowledge_point_id)
    .bind(user_id)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_reviews(
    conn: &mut SqliteConnection,
    course_id: CourseId,
    user_id: UserId,
) -> Result<Vec<ReviewRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT r."id", r."knowledge_point_id"
        FROM "reviews" r
        JOIN "knowledge_points" kp ON kp."id" = r."knowledge_point_id"
        JOIN "lessons" l ON l."id" = kp."lesson_id"
        WHERE l."course_id" = ? AND r."user_id" = ?
        ORDER BY r."id"
        "#,
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter()
        .map(|row| {
            Ok(ReviewRow {
                id: row.try_get("id")?,
                knowledge_point_id: row.try_get("knowledge_point_id")?,
            })
        })
        .collect()
}

pub async fn get_review(
    conn: &mut SqliteConnection,
    review_id: i64,
    course_id: CourseId,
    user_id: UserId,
) -> Result<Option<ReviewRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT r."id", r."knowledge_point_id"
        FROM "reviews" r
        JOIN "knowledge_points" kp ON kp."id" = r."knowledge_point_id"
        JOIN "lessons" l ON l."id" = kp."lesson_id"
        WHERE r."id" = ? AND l."course_id" = ? AND r."user_id" = ?
        "#,
    )
    .bind(review_id)
    .bind(course_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(|row| {
        Ok(ReviewRow {
            id: row.try_get("id")?,
            knowledge_point_id: row.try_get("knowledge_point_id")?,
        })
    })
    .transpose()
}

// ==================== Diagnostics ====================

/// Returns the user's diagnostic for the course, creating it on first call.
/// The flag is true when the row was just created.
pub async fn get_or_create_diagnostic(
    conn: &mut SqliteConnection,
    course_id: CourseId,
    user_id: UserId,
    now_ms: i64,
) -> Result<(i64, bool), sqlx::Error> {
    let created = sqlx::query(
        r#"INSERT OR IGNORE INTO "diagnostics" ("course_id", "user_id", "created_at") VALUES (?, ?, ?)"#,
    )
    .bind(course_id)
    .bind(user_id)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?
    .rows_affected()
        > 0;

    let id: i64 = sqlx::query_scalar(
        r#"SELECT "id" FROM "diagnostics" WHERE "course_id" = ? AND "user_id" = ?"#,
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok((id, created))
}

pub async fn diagnostic_exists(
    conn: &mut SqliteConnection,
    diagnostic_id: i64,
    course_id: CourseId,
    user_id: UserId,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar(
        r#"SELECT "id" FROM "diagnostics" WHERE "id" = ? AND "course_id" = ? AND "user_id" = ?"#,
    )
    .bind(diagnostic_id)
    .bind(course_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(found.is_some())
}
