use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use noobular_algo::{ChoiceId, CourseId, LessonId};

use super::open_learner;
use crate::response::{ok, AppError, SuccessResponse};
use crate::services::lesson::{self, LessonAnswerOutcome, LessonPosition, LessonStep};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonAnswerRequest {
    knowledge_point_index: usize,
    item_index: usize,
    choice_id: ChoiceId,
}

pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, lesson_id)): Path<(CourseId, LessonId)>,
) -> Result<Json<SuccessResponse<LessonStep>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let step = lesson::start_lesson(&mut uow, &ctx, lesson_id).await?;
    uow.commit().await?;
    Ok(ok(step))
}

pub async fn next(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, lesson_id)): Path<(CourseId, LessonId)>,
    Query(position): Query<LessonPosition>,
) -> Result<Json<SuccessResponse<LessonStep>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let step = lesson::advance_lesson(&mut uow, &ctx, lesson_id, position).await?;
    uow.commit().await?;
    Ok(ok(step))
}

pub async fn answer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, lesson_id)): Path<(CourseId, LessonId)>,
    Json(body): Json<LessonAnswerRequest>,
) -> Result<Json<SuccessResponse<LessonAnswerOutcome>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let position = LessonPosition::new(body.knowledge_point_index, body.item_index);
    let outcome =
        lesson::submit_lesson_answer(&mut uow, &ctx, lesson_id, position, body.choice_id).await?;
    uow.commit().await?;
    Ok(ok(outcome))
}
