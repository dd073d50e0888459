use sqlx::SqliteConnection;

use noobular_algo::{ChoiceId, QuestionId, UserId};

pub async fn record_answer(
    conn: &mut SqliteConnection,
    user_id: UserId,
    question_id: QuestionId,
    choice_id: ChoiceId,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "answers" ("user_id", "question_id", "choice_id", "created_at")
           VALUES (?, ?, ?, ?)"#,
    )
    .bind(user_id)
    .bind(question_id)
    .bind(choice_id)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_answers(
    conn: &mut SqliteConnection,
    user_id: UserId,
    question_ids: &[QuestionId],
) -> Result<u64, sqlx::Error> {
    let mut deleted = 0;
    for question_id in question_ids {
        deleted += sqlx::query(r#"DELETE FROM "answers" WHERE "user_id" = ? AND "question_id" = ?"#)
            .bind(user_id)
            .bind(question_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(deleted)
}
