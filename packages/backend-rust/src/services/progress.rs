use sqlx::SqliteConnection;

use noobular_algo::pool::pick_unassigned;
use noobular_algo::{Course, CourseProgress, KpProgress, PoolKind, QuestionId, UserId};

use crate::db::operations::pools;

pub async fn load_progress(
    conn: &mut SqliteConnection,
    user_id: UserId,
    course: &Course,
) -> Result<CourseProgress, sqlx::Error> {
    let records = pools::load_pool_records(conn, user_id, course.id).await?;
    Ok(CourseProgress::from_records(course, &records))
}

/// Commits one random unassigned question of the KP to `kind`. `None` means
/// the bank is exhausted, which callers treat as the end of the material.
pub async fn allocate(
    conn: &mut SqliteConnection,
    user_id: UserId,
    kp: &KpProgress,
    kind: PoolKind,
    owner_id: Option<i64>,
    now_ms: i64,
) -> Result<Option<QuestionId>, sqlx::Error> {
    let Some(question_id) = pick_unassigned(&kp.unassigned) else {
        tracing::debug!(user_id, kp_id = kp.kp_id, pool = kind.as_str(), "question bank exhausted");
        return Ok(None);
    };
    pools::assign(conn, user_id, question_id, kind, owner_id, now_ms).await?;
    Ok(Some(question_id))
}
