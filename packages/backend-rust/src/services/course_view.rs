//! Course page
//!
//! Computing the course page is what drives scheduling: it creates the
//! diagnostic on first visit and runs the quiz and review triggers before
//! sorting everything into next, remaining and completed items.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use serde::Serialize;

use noobular_algo::mastery::{blocked_by, lesson_completed_at, satisfied_kps};
use noobular_algo::{
    diagnostic_status, is_review_complete, partition_lessons, quiz_state, CourseId,
    DiagnosticStatus, KpId, LessonId, LessonPartition, PoolEntry, PoolKind, QuizState,
};

use super::progress::load_progress;
use super::quiz::run_quiz_trigger;
use super::review::run_review_trigger;
use super::{EngineResult, LearnerContext};
use crate::db::operations::{assessments, pools};
use crate::db::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CourseItem {
    Lesson {
        id: LessonId,
        title: String,
    },
    Quiz {
        id: i64,
    },
    Review {
        id: i64,
        #[serde(rename = "knowledgePointId")]
        knowledge_point_id: KpId,
        #[serde(rename = "knowledgePointName")]
        knowledge_point_name: String,
    },
    Diagnostic {
        id: i64,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedItem {
    #[serde(flatten)]
    pub item: CourseItem,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemainingLesson {
    pub id: LessonId,
    pub title: String,
    /// Names of unsatisfied prerequisites outside the lesson
    pub blocked_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: i64,
    pub state: QuizState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSummary {
    pub id: i64,
    pub status: DiagnosticStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
    pub course_id: CourseId,
    pub title: String,
    pub next_items: Vec<CourseItem>,
    pub remaining_lessons: Vec<RemainingLesson>,
    /// Newest first
    pub completed_items: Vec<CompletedItem>,
    pub lessons: LessonPartition,
    pub available_quizzes: Vec<QuizSummary>,
    pub completed_quizzes: Vec<QuizSummary>,
    pub available_reviews: Vec<CourseItem>,
    pub completed_reviews: Vec<CourseItem>,
    pub diagnostic: DiagnosticSummary,
}

fn latest_answer<'a>(entries: impl IntoIterator<Item = &'a PoolEntry>) -> Option<i64> {
    entries.into_iter().filter_map(|e| e.answered_at_ms).max()
}

fn to_datetime(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

pub async fn get_course_view(uow: &mut UnitOfWork, ctx: &LearnerContext) -> EngineResult<CourseView> {
    let course = ctx.course();
    let config = &ctx.config;

    let (diagnostic_id, created) =
        assessments::get_or_create_diagnostic(uow.conn(), course.id, ctx.user_id, ctx.now_ms())
            .await?;
    if created {
        tracing::info!(user_id = ctx.user_id, course_id = course.id, diagnostic_id, "diagnostic created");
    }

    let mut progress = load_progress(uow.conn(), ctx.user_id, course).await?;
    if run_quiz_trigger(uow, ctx, &progress).await?.is_some() {
        progress = load_progress(uow.conn(), ctx.user_id, course).await?;
    }
    run_review_trigger(uow, ctx, &progress).await?;

    let lessons = partition_lessons(course, &progress, config);
    let satisfied = satisfied_kps(course, &progress, config);
    let mut completed_items = Vec::new();

    for lesson_id in &lessons.completed {
        if let Some(lesson) = course.lesson(*lesson_id) {
            completed_items.push(CompletedItem {
                item: CourseItem::Lesson { id: lesson.id, title: lesson.title.clone() },
                completed_at: to_datetime(lesson_completed_at(lesson, &progress)),
            });
        }
    }

    let mut available_quizzes = Vec::new();
    let mut completed_quizzes = Vec::new();
    for quiz in assessments::list_quizzes(uow.conn(), course.id, ctx.user_id).await? {
        let owned = pools::owned_questions(uow.conn(), ctx.user_id, PoolKind::Quiz, quiz.id).await?;
        let answered = owned.iter().filter(|q| q.answered_at_ms.is_some()).count();
        let state = quiz_state(quiz.started_at_ms, answered, owned.len(), ctx.now_ms(), config);
        let summary = QuizSummary { id: quiz.id, state };
        if state.is_available() {
            available_quizzes.push(summary);
            continue;
        }
        let completed_at = owned
            .iter()
            .filter_map(|q| q.answered_at_ms)
            .max()
            .or_else(|| quiz.started_at_ms.map(|s| s + config.quiz_time_limit_ms()))
            .or(Some(quiz.created_at_ms));
        completed_items.push(CompletedItem {
            item: CourseItem::Quiz { id: quiz.id },
            completed_at: to_datetime(completed_at),
        });
        completed_quizzes.push(summary);
    }

    let mut available_reviews = Vec::new();
    let mut completed_reviews = Vec::new();
    for review in assessments::list_reviews(uow.conn(), course.id, ctx.user_id).await? {
        let kp_id = review.knowledge_point_id;
        let item = CourseItem::Review {
            id: review.id,
            knowledge_point_id: kp_id,
            knowledge_point_name: course
                .knowledge_point(kp_id)
                .map(|kp| kp.name.clone())
                .unwrap_or_default(),
        };
        let kp_progress = progress.kp(kp_id);
        let entries = kp_progress.map(|p| p.review.as_slice()).unwrap_or_default();
        if kp_progress.is_some_and(|p| is_review_complete(p, config)) {
            completed_items.push(CompletedItem {
                item: item.clone(),
                completed_at: to_datetime(latest_answer(entries)),
            });
            completed_reviews.push(item);
        } else {
            available_reviews.push(item);
        }
    }

    let status = diagnostic_status(ctx.graph(), &progress);
    if status.finished {
        let answered_at = latest_answer(progress.iter().flat_map(|p| p.diagnostic.iter()));
        completed_items.push(CompletedItem {
            item: CourseItem::Diagnostic { id: diagnostic_id },
            completed_at: to_datetime(answered_at),
        });
    }
    completed_items.sort_by_key(|item| Reverse(item.completed_at));

    let lesson_item = |lesson_id: &LessonId| {
        course
            .lesson(*lesson_id)
            .map(|l| CourseItem::Lesson { id: l.id, title: l.title.clone() })
    };
    let remaining_lesson = |lesson_id: &LessonId| {
        course.lesson(*lesson_id).map(|lesson| RemainingLesson {
            id: lesson.id,
            title: lesson.title.clone(),
            blocked_by: blocked_by(lesson, ctx.graph(), &satisfied)
                .into_iter()
                .filter_map(|kp| course.knowledge_point(kp).map(|k| k.name.clone()))
                .collect(),
        })
    };

    let next_items: Vec<CourseItem> = if !status.finished {
        vec![CourseItem::Diagnostic { id: diagnostic_id }]
    } else if !available_quizzes.is_empty() {
        available_quizzes.iter().map(|q| CourseItem::Quiz { id: q.id }).collect()
    } else if !available_reviews.is_empty() {
        available_reviews.clone()
    } else {
        lessons.next.iter().filter_map(lesson_item).collect()
    };
    let lessons_are_next = next_items.iter().all(|i| matches!(i, CourseItem::Lesson { .. }));

    let remaining_lessons: Vec<RemainingLesson> = if lessons_are_next {
        lessons.remaining.iter().filter_map(remaining_lesson).collect()
    } else {
        lessons
            .next
            .iter()
            .chain(lessons.remaining.iter())
            .filter_map(remaining_lesson)
            .collect()
    };

    Ok(CourseView {
        course_id: course.id,
        title: course.title.clone(),
        next_items,
        remaining_lessons,
        completed_items,
        lessons,
        available_quizzes,
        completed_quizzes,
        available_reviews,
        completed_reviews,
        diagnostic: DiagnosticSummary { id: diagnostic_id, status },
    })
}
