use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use noobular_algo::{ChoiceId, CourseId, QuestionId};

use super::open_learner;
use crate::response::{ok, AppError, SuccessResponse};
use crate::services::diagnostic::{
    self, DiagnosticAnswerOutcome, DiagnosticStep, DiagnosticView,
};
use crate::services::quiz::{self, QuizSubmission, QuizView};
use crate::services::review::{self, ReviewAnswerOutcome, ReviewStep, ReviewView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    question_id: QuestionId,
    choice_id: ChoiceId,
}

#[derive(Debug, Deserialize)]
pub struct QuizSubmitRequest {
    answers: Vec<QuizAnswer>,
}

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedAnswerRequest {
    index: usize,
    choice_id: ChoiceId,
}

// ==================== Quizzes ====================

pub async fn open_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, quiz_id)): Path<(CourseId, i64)>,
) -> Result<Json<SuccessResponse<QuizView>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let view = quiz::open_quiz(&mut uow, &ctx, quiz_id).await?;
    uow.commit().await?;
    Ok(ok(view))
}

pub async fn submit_quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, quiz_id)): Path<(CourseId, i64)>,
    Json(body): Json<QuizSubmitRequest>,
) -> Result<Json<SuccessResponse<QuizSubmission>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let answers: Vec<(QuestionId, ChoiceId)> = body
        .answers
        .iter()
        .map(|a| (a.question_id, a.choice_id))
        .collect();
    let submission = quiz::submit_quiz(&mut uow, &ctx, quiz_id, &answers).await?;
    uow.commit().await?;
    Ok(ok(submission))
}

// ==================== Reviews ====================

pub async fn open_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, review_id)): Path<(CourseId, i64)>,
) -> Result<Json<SuccessResponse<ReviewView>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let view = review::open_review(&mut uow, &ctx, review_id).await?;
    uow.commit().await?;
    Ok(ok(view))
}

pub async fn next_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, review_id)): Path<(CourseId, i64)>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<SuccessResponse<ReviewStep>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let step = review::advance_review(&mut uow, &ctx, review_id, query.index).await?;
    uow.commit().await?;
    Ok(ok(step))
}

pub async fn answer_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, review_id)): Path<(CourseId, i64)>,
    Json(body): Json<IndexedAnswerRequest>,
) -> Result<Json<SuccessResponse<ReviewAnswerOutcome>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let outcome =
        review::submit_review_answer(&mut uow, &ctx, review_id, body.index, body.choice_id).await?;
    uow.commit().await?;
    Ok(ok(outcome))
}

// ==================== Diagnostics ====================

pub async fn open_diagnostic(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, diagnostic_id)): Path<(CourseId, i64)>,
) -> Result<Json<SuccessResponse<DiagnosticView>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let view = diagnostic::open_diagnostic(&mut uow, &ctx, diagnostic_id).await?;
    uow.commit().await?;
    Ok(ok(view))
}

pub async fn next_diagnostic(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, diagnostic_id)): Path<(CourseId, i64)>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<SuccessResponse<DiagnosticStep>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let step = diagnostic::advance_diagnostic(&mut uow, &ctx, diagnostic_id, query.index).await?;
    uow.commit().await?;
    Ok(ok(step))
}

pub async fn answer_diagnostic(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((course_id, diagnostic_id)): Path<(CourseId, i64)>,
    Json(body): Json<IndexedAnswerRequest>,
) -> Result<Json<SuccessResponse<DiagnosticAnswerOutcome>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let outcome = diagnostic::submit_diagnostic_answer(
        &mut uow,
        &ctx,
        diagnostic_id,
        body.index,
        body.choice_id,
    )
    .await?;
    uow.commit().await?;
    Ok(ok(outcome))
}
