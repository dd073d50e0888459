use sqlx::{Row, SqliteConnection};

use noobular_algo::{ChoiceId, CourseId, PoolKind, PoolRecord, QuestionId, UserId};

/// Every pool assignment the user holds in the course, joined with the
/// answer if one exists, in allocation order.
pub async fn load_pool_records(
    conn: &mut SqliteConnection,
    user_id: UserId,
    course_id: CourseId,
) -> Result<Vec<PoolRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT qp."question_id", qp."pool", qp."owner_id", a."choice_id", a."created_at" AS "answered_at"
        FROM "question_pools" qp
        JOIN "questions" q ON q."id" = qp."question_id"
        JOIN "knowledge_points" kp ON kp."id" = q."knowledge_point_id"
        JOIN "lessons" l ON l."id" = kp."lesson_id"
        LEFT JOIN "answers" a ON a."question_id" = qp."question_id" AND a."user_id" = qp."user_id"
        WHERE qp."user_id" = ? AND l."course_id" = ?
        ORDER BY qp."id"
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let pool: String = row.try_get("pool")?;
        let Some(kind) = PoolKind::from_str(&pool) else {
            tracing::warn!(pool = %pool, "ignoring pool row with unknown kind");
            continue;
        };
        records.push(PoolRecord {
            question_id: row.try_get("question_id")?,
            kind,
            owner_id: row.try_get("owner_id")?,
            choice_id: row.try_get("choice_id")?,
            answered_at_ms: row.try_get("answered_at")?,
        });
    }
    Ok(records)
}

pub async fn assign(
    conn: &mut SqliteConnection,
    user_id: UserId,
    question_id: QuestionId,
    kind: PoolKind,
    owner_id: Option<i64>,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "question_pools" ("user_id", "question_id", "pool", "owner_id", "created_at")
           VALUES (?, ?, ?, ?, ?)"#,
    )
    .bind(user_id)
    .bind(question_id)
    .bind(kind.as_str())
    .bind(owner_id)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn release(
    conn: &mut SqliteConnection,
    user_id: UserId,
    question_ids: &[QuestionId],
) -> Result<u64, sqlx::Error> {
    let mut released = 0;
    for question_id in question_ids {
        released += sqlx::query(
            r#"DELETE FROM "question_pools" WHERE "user_id" = ? AND "question_id" = ?"#,
        )
        .bind(user_id)
        .bind(question_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }
    Ok(released)
}

/// A question owned by a quiz, review or diagnostic instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedQuestion {
    pub question_id: QuestionId,
    pub choice_id: Option<ChoiceId>,
    pub answered_at_ms: Option<i64>,
}

/// Questions of one assessment instance in allocation order, which is the
/// order clients address them by index.
pub async fn owned_questions(
    conn: &mut SqliteConnection,
    user_id: UserId,
    kind: PoolKind,
    owner_id: i64,
) -> Result<Vec<OwnedQuestion>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT qp."question_id", a."choice_id", a."created_at" AS "answered_at"
        FROM "question_pools" qp
        LEFT JOIN "answers" a ON a."question_id" = qp."question_id" AND a."user_id" = qp."user_id"
        WHERE qp."user_id" = ? AND qp."pool" = ? AND qp."owner_id" = ?
        ORDER BY qp."id"
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(owner_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(OwnedQuestion {
                question_id: row.try_get("question_id")?,
                choice_id: row.try_get("choice_id")?,
                answered_at_ms: row.try_get("answered_at")?,
            })
        })
        .collect()
}
