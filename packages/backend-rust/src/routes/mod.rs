mod assessments;
mod courses;
mod health;
mod lessons;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;

use noobular_algo::CourseId;

use crate::db::operations::users::{find_or_create_user, GLOBAL_USERNAME};
use crate::db::UnitOfWork;
use crate::response::{json_error, AppError};
use crate::services::LearnerContext;
use crate::state::AppState;

pub const USERNAME_HEADER: &str = "x-username";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health).fallback(fallback_handler))
        .route("/api/courses", get(courses::list).fallback(fallback_handler))
        .route("/api/courses/:course_id", get(courses::view).fallback(fallback_handler))
        .route(
            "/api/courses/:course_id/lessons/:lesson_id/start",
            post(lessons::start).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/lessons/:lesson_id/next",
            get(lessons::next).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/lessons/:lesson_id/answer",
            post(lessons::answer).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/quizzes/:quiz_id",
            get(assessments::open_quiz).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/quizzes/:quiz_id/submit",
            post(assessments::submit_quiz).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/reviews/:review_id",
            get(assessments::open_review).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/reviews/:review_id/next",
            get(assessments::next_review).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/reviews/:review_id/answer",
            post(assessments::answer_review).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/diagnostics/:diagnostic_id",
            get(assessments::open_diagnostic).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/diagnostics/:diagnostic_id/next",
            get(assessments::next_diagnostic).fallback(fallback_handler),
        )
        .route(
            "/api/courses/:course_id/diagnostics/:diagnostic_id/answer",
            post(assessments::answer_diagnostic).fallback(fallback_handler),
        )
        .fallback(fallback_handler)
        .with_state(state)
}

fn username(headers: &HeaderMap) -> &str {
    headers
        .get(USERNAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(GLOBAL_USERNAME)
}

/// Opens the request's unit of work and resolves who is acting on which
/// course. Nothing is committed unless the handler calls `commit`.
async fn open_learner(
    state: &AppState,
    headers: &HeaderMap,
    course_id: CourseId,
) -> Result<(UnitOfWork, LearnerContext), AppError> {
    let now = Utc::now();
    let mut uow = state.db().begin().await?;
    let user_id = find_or_create_user(uow.conn(), username(headers), now.timestamp_millis()).await?;
    let course = state
        .catalog()
        .get(uow.conn(), course_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("course {course_id} not found")))?;

    let ctx = LearnerContext {
        user_id,
        course,
        config: state.engine(),
        now,
    };
    Ok((uow, ctx))
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_username_defaults_to_global() {
        let mut headers = HeaderMap::new();
        assert_eq!(username(&headers), GLOBAL_USERNAME);

        headers.insert(USERNAME_HEADER, HeaderValue::from_static("  "));
        assert_eq!(username(&headers), GLOBAL_USERNAME);

        headers.insert(USERNAME_HEADER, HeaderValue::from_static(" ada "));
        assert_eq!(username(&headers), "ada");
    }
}
