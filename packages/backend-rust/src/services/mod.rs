//! Engine services
//!
//! Each operation runs inside a caller-owned [`UnitOfWork`]; nothing here
//! commits. The HTTP layer commits when an operation returns `Ok` and drops
//! (rolls back) the unit of work otherwise.

pub mod catalog;
pub mod course_loader;
pub mod course_view;
pub mod diagnostic;
pub mod lesson;
pub mod progress;
pub mod quiz;
pub mod review;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use noobular_algo::{ChoiceId, Course, EngineConfig, PrerequisiteGraph, Question, QuestionId, UserId};

use catalog::LoadedCourse;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    AlreadyAnswered(String),
    #[error("{0}")]
    QuizClosed(String),
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Who is acting, on which course, under which thresholds, at what time.
#[derive(Clone)]
pub struct LearnerContext {
    pub user_id: UserId,
    pub course: Arc<LoadedCourse>,
    pub config: Arc<EngineConfig>,
    pub now: DateTime<Utc>,
}

impl LearnerContext {
    pub fn course(&self) -> &Course {
        &self.course.course
    }

    pub fn graph(&self) -> &PrerequisiteGraph {
        &self.course.graph
    }

    pub fn now_ms(&self) -> i64 {
        self.now.timestamp_millis()
    }

    pub(crate) fn question(&self, question_id: QuestionId) -> EngineResult<&Question> {
        self.course()
            .question(question_id)
            .ok_or_else(|| EngineError::NotFound(format!("question {question_id} not found")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub correct: bool,
    pub correct_choice_text: String,
    pub explanation: String,
}

impl AnswerFeedback {
    pub fn for_choice(question: &Question, choice_id: ChoiceId) -> Self {
        Self {
            correct: question.is_correct(choice_id),
            correct_choice_text: question
                .correct_choice()
                .map(|c| c.text.clone())
                .unwrap_or_default(),
            explanation: question.explanation.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceView {
    pub id: ChoiceId,
    pub text: String,
}

/// A question as shown to the learner. The correct choice is only revealed
/// through `feedback` once the question has been answered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub choices: Vec<ChoiceView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_choice_id: Option<ChoiceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<AnswerFeedback>,
}

impl QuestionView {
    pub fn new(question: &Question, answered_choice_id: Option<ChoiceId>) -> Self {
        Self {
            id: question.id,
            prompt: question.prompt.clone(),
            choices: question
                .choices
                .iter()
                .map(|c| ChoiceView { id: c.id, text: c.text.clone() })
                .collect(),
            answered_choice_id,
            feedback: answered_choice_id.map(|choice| AnswerFeedback::for_choice(question, choice)),
        }
    }
}

/// Rejects choices that do not belong to the question.
pub(crate) fn check_choice(question: &Question, choice_id: ChoiceId) -> EngineResult<()> {
    if question.choice(choice_id).is_none() {
        return Err(EngineError::BadRequest(format!(
            "choice {choice_id} does not belong to question {}",
            question.id
        )));
    }
    Ok(())
}
