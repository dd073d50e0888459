//! Quizzes
//!
//! A quiz is created by the course-view trigger, timed from its first
//! opening, and submitted exactly once as a whole.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use noobular_algo::{
    accepts_submission, plan_quiz, quiz_state, ChoiceId, CourseProgress, KpId, PoolKind,
    QuestionId, QuizState,
};

use super::{check_choice, AnswerFeedback, EngineError, EngineResult, LearnerContext, QuestionView};
use crate::db::operations::pools::{self, OwnedQuestion};
use crate::db::operations::{answers, assessments};
use crate::db::UnitOfWork;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub id: i64,
    pub state: QuizState,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub questions: Vec<QuestionView>,
    /// Present once the quiz has been submitted
    pub score: Option<QuizScore>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswerResult {
    pub question_id: QuestionId,
    pub feedback: AnswerFeedback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    pub results: Vec<QuizAnswerResult>,
    pub score: QuizScore,
    /// KPs that got a review because of a wrong answer here
    pub reviews_created: Vec<KpId>,
}

fn score(ctx: &LearnerContext, owned: &[OwnedQuestion]) -> QuizScore {
    let correct = owned
        .iter()
        .filter(|q| {
            q.choice_id.is_some_and(|choice| {
                ctx.course()
                    .question(q.question_id)
                    .is_some_and(|question| question.is_correct(choice))
            })
        })
        .count();
    QuizScore { correct, total: owned.len() }
}

/// Creates a quiz when enough KPs were completed since the last one. Returns
/// the new quiz id.
pub async fn run_quiz_trigger(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    progress: &CourseProgress,
) -> EngineResult<Option<i64>> {
    let course = ctx.course();
    let last = assessments::last_quiz_created_at(uow.conn(), course.id, ctx.user_id).await?;
    let Some(plan) = plan_quiz(course, progress, &ctx.config, last) else {
        return Ok(None);
    };

    let quiz_id = assessments::create_quiz(uow.conn(), course.id, ctx.user_id, ctx.now_ms()).await?;
    for question_id in &plan.questions {
        pools::assign(
            uow.conn(),
            ctx.user_id,
            *question_id,
            PoolKind::Quiz,
            Some(quiz_id),
            ctx.now_ms(),
        )
        .await?;
    }
    tracing::info!(
        user_id = ctx.user_id,
        course_id = course.id,
        quiz_id,
        sampled = ?plan.sampled_kps,
        questions = plan.questions.len(),
        "quiz created"
    );
    Ok(Some(quiz_id))
}

/// Shows a quiz, starting its clock on first opening.
pub async fn open_quiz(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    quiz_id: i64,
) -> EngineResult<QuizView> {
    let quiz = assessments::get_quiz(uow.conn(), quiz_id, ctx.course().id, ctx.user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("quiz {quiz_id} not found")))?;
    let owned = pools::owned_questions(uow.conn(), ctx.user_id, PoolKind::Quiz, quiz_id).await?;

    let started_at_ms = match quiz.started_at_ms {
        Some(started) => Some(started),
        None if !owned.is_empty() => {
            assessments::start_quiz(uow.conn(), quiz_id, ctx.now_ms()).await?;
            Some(ctx.now_ms())
        }
        None => None,
    };

    let answered = owned.iter().filter(|q| q.choice_id.is_some()).count();
    let state = quiz_state(started_at_ms, answered, owned.len(), ctx.now_ms(), &ctx.config);

    let questions = owned
        .iter()
        .map(|q| Ok(QuestionView::new(ctx.question(q.question_id)?, q.choice_id)))
        .collect::<EngineResult<Vec<_>>>()?;

    Ok(QuizView {
        id: quiz_id,
        state,
        started_at: started_at_ms.and_then(DateTime::from_timestamp_millis),
        deadline_at: started_at_ms
            .and_then(|s| DateTime::from_timestamp_millis(s + ctx.config.quiz_time_limit_ms())),
        questions,
        score: (state == QuizState::Submitted).then(|| score(ctx, &owned)),
    })
}

/// Grades a whole quiz. Every question must be answered exactly once, and
/// only within the time limit plus the grace period.
pub async fn submit_quiz(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    quiz_id: i64,
    submitted: &[(QuestionId, ChoiceId)],
) -> EngineResult<QuizSubmission> {
    let quiz = assessments::get_quiz(uow.conn(), quiz_id, ctx.course().id, ctx.user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("quiz {quiz_id} not found")))?;
    let Some(started_at_ms) = quiz.started_at_ms else {
        return Err(EngineError::BadRequest(format!("quiz {quiz_id} has not been started")));
    };
    if !accepts_submission(started_at_ms, ctx.now_ms(), &ctx.config) {
        return Err(EngineError::QuizClosed(format!("quiz {quiz_id} time window has closed")));
    }

    let owned = pools::owned_questions(uow.conn(), ctx.user_id, PoolKind::Quiz, quiz_id).await?;
    if owned.iter().any(|q| q.choice_id.is_some()) {
        return Err(EngineError::AlreadyAnswered(format!("quiz {quiz_id} was already submitted")));
    }

    let expected: HashSet<QuestionId> = owned.iter().map(|q| q.question_id).collect();
    let mut seen: HashSet<QuestionId> = HashSet::new();
    for (question_id, choice_id) in submitted {
        if !expected.contains(question_id) {
            return Err(EngineError::BadRequest(format!(
                "question {question_id} is not part of quiz {quiz_id}"
            )));
        }
        if !seen.insert(*question_id) {
            return Err(EngineError::BadRequest(format!(
                "question {question_id} answered more than once"
            )));
        }
        check_choice(ctx.question(*question_id)?, *choice_id)?;
    }
    if seen.len() != expected.len() {
        return Err(EngineError::BadRequest(format!(
            "quiz {quiz_id} needs answers for all {} questions",
            expected.len()
        )));
    }

    let mut results = Vec::with_capacity(submitted.len());
    let mut reviews_created = Vec::new();
    let mut correct = 0;
    for (question_id, choice_id) in submitted {
        let question = ctx.question(*question_id)?;
        answers::record_answer(uow.conn(), ctx.user_id, *question_id, *choice_id, ctx.now_ms())
            .await?;
        let feedback = AnswerFeedback::for_choice(question, *choice_id);
        if feedback.correct {
            correct += 1;
        } else {
            let kp_id = question.knowledge_point_id;
            if assessments::create_review(uow.conn(), kp_id, ctx.user_id, ctx.now_ms()).await? {
                tracing::info!(user_id = ctx.user_id, kp_id, quiz_id, "review created from quiz");
                reviews_created.push(kp_id);
            }
        }
        results.push(QuizAnswerResult { question_id: *question_id, feedback });
    }

    let score = QuizScore { correct, total: owned.len() };
    tracing::info!(
        user_id = ctx.user_id,
        quiz_id,
        correct = score.correct,
        total = score.total,
        "quiz submitted"
    );
    Ok(QuizSubmission { results, score, reviews_created })
}
