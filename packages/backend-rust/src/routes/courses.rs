use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use noobular_algo::CourseId;

use super::open_learner;
use crate::db::operations::courses::{self, CourseSummary};
use crate::response::{ok, AppError, SuccessResponse};
use crate::services::course_view::{get_course_view, CourseView};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<Vec<CourseSummary>>>, AppError> {
    let mut uow = state.db().begin().await?;
    let courses = courses::list_courses(uow.conn()).await?;
    uow.commit().await?;
    Ok(ok(courses))
}

pub async fn view(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<CourseId>,
) -> Result<Json<SuccessResponse<CourseView>>, AppError> {
    let (mut uow, ctx) = open_learner(&state, &headers, course_id).await?;
    let view = get_course_view(&mut uow, &ctx).await?;
    uow.commit().await?;
    Ok(ok(view))
}
