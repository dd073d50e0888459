//! Lesson Engine
//!
//! A learner's place in a lesson is `(knowledge_point_index, item_index)`.
//! Items of a KP are its content blocks followed by its lesson-pool
//! questions in allocation order. Lesson-pool questions are allocated one
//! at a time, so at most one is ever pending per KP.

use serde::{Deserialize, Serialize};

use noobular_algo::{
    has_failed, is_kp_complete, ChoiceId, CourseProgress, KnowledgePoint, KpId, Lesson, LessonId,
    PoolKind,
};

use super::progress::{allocate, load_progress};
use super::{check_choice, AnswerFeedback, EngineError, EngineResult, LearnerContext, QuestionView};
use crate::db::operations::{answers, pools};
use crate::db::UnitOfWork;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPosition {
    pub knowledge_point_index: usize,
    pub item_index: usize,
}

impl LessonPosition {
    pub fn new(knowledge_point_index: usize, item_index: usize) -> Self {
        Self { knowledge_point_index, item_index }
    }

    fn next_item(self) -> Self {
        Self::new(self.knowledge_point_index, self.item_index + 1)
    }

    fn next_knowledge_point(self) -> Self {
        Self::new(self.knowledge_point_index + 1, 0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePointSummary {
    pub id: KpId,
    pub name: String,
    pub description: String,
}

impl From<&KnowledgePoint> for KnowledgePointSummary {
    fn from(kp: &KnowledgePoint) -> Self {
        Self {
            id: kp.id,
            name: kp.name.clone(),
            description: kp.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LessonItem {
    Content {
        text: String,
    },
    Question {
        #[serde(rename = "questionIndex")]
        question_index: usize,
        question: QuestionView,
    },
    /// Past the last KP of the lesson
    Finished,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonStep {
    pub lesson_id: LessonId,
    pub lesson_title: String,
    pub position: LessonPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_point: Option<KnowledgePointSummary>,
    pub item: LessonItem,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonAnswerOutcome {
    pub feedback: AnswerFeedback,
    /// The failure threshold was crossed and the lesson starts over
    pub lesson_failed: bool,
    pub next_position: LessonPosition,
    pub lesson_finished: bool,
}

fn find_lesson<'a>(ctx: &'a LearnerContext, lesson_id: LessonId) -> EngineResult<&'a Lesson> {
    ctx.course()
        .lesson(lesson_id)
        .ok_or_else(|| EngineError::NotFound(format!("lesson {lesson_id} not found")))
}

/// Opens the lesson at its first item, giving every KP that has no
/// lesson-pool question yet its first one.
pub async fn start_lesson(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    lesson_id: LessonId,
) -> EngineResult<LessonStep> {
    let lesson = find_lesson(ctx, lesson_id)?;
    let progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;

    for kp in &lesson.knowledge_points {
        let Some(p) = progress.kp(kp.id) else {
            continue;
        };
        if p.lesson.is_empty() {
            allocate(uow.conn(), ctx.user_id, p, PoolKind::Lesson, None, ctx.now_ms()).await?;
        }
    }

    let progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    resolve(uow, ctx, lesson, progress, LessonPosition::default()).await
}

/// Navigates to `position`. A mastered KP hands over to the next one; an
/// unmastered KP whose questions are all answered gets one more allocated.
pub async fn advance_lesson(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    lesson_id: LessonId,
    position: LessonPosition,
) -> EngineResult<LessonStep> {
    let lesson = find_lesson(ctx, lesson_id)?;
    let progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    resolve(uow, ctx, lesson, progress, position).await
}

async fn resolve(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    lesson: &Lesson,
    mut progress: CourseProgress,
    mut position: LessonPosition,
) -> EngineResult<LessonStep> {
    loop {
        let Some(kp) = lesson.knowledge_points.get(position.knowledge_point_index) else {
            return Ok(LessonStep {
                lesson_id: lesson.id,
                lesson_title: lesson.title.clone(),
                position,
                knowledge_point: None,
                item: LessonItem::Finished,
            });
        };
        let step = |item| LessonStep {
            lesson_id: lesson.id,
            lesson_title: lesson.title.clone(),
            position,
            knowledge_point: Some(KnowledgePointSummary::from(kp)),
            item,
        };

        if let Some(text) = kp.contents.get(position.item_index) {
            return Ok(step(LessonItem::Content { text: text.clone() }));
        }

        let question_index = position.item_index - kp.contents.len();
        let Some(p) = progress.kp(kp.id) else {
            return Err(EngineError::NotFound(format!("knowledge point {} not found", kp.id)));
        };

        if let Some(entry) = p.lesson.get(question_index) {
            let question = ctx.question(entry.question_id)?;
            return Ok(step(LessonItem::Question {
                question_index,
                question: QuestionView::new(question, entry.choice_id),
            }));
        }

        if question_index > p.lesson.len() {
            return Err(EngineError::BadRequest(format!(
                "question {question_index} of knowledge point {} is out of range",
                kp.id
            )));
        }

        if is_kp_complete(p, &ctx.config) {
            position = position.next_knowledge_point();
            continue;
        }

        if let Some(pending) = p.pending_lesson_question() {
            return Err(EngineError::BadRequest(format!(
                "question {pending} of knowledge point {} is still unanswered",
                kp.id
            )));
        }

        let allocated =
            allocate(uow.conn(), ctx.user_id, p, PoolKind::Lesson, None, ctx.now_ms()).await?;
        if allocated.is_none() {
            // nothing left to practise; move on rather than loop
            position = position.next_knowledge_point();
            continue;
        }
        progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    }
}

/// Records an answer to the question at `position`, then either restarts
/// the lesson, allocates the KP's next question, or moves to the next KP.
pub async fn submit_lesson_answer(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    lesson_id: LessonId,
    position: LessonPosition,
    choice_id: ChoiceId,
) -> EngineResult<LessonAnswerOutcome> {
    let lesson = find_lesson(ctx, lesson_id)?;
    let kp = lesson
        .knowledge_points
        .get(position.knowledge_point_index)
        .ok_or_else(|| {
            EngineError::BadRequest(format!(
                "lesson {lesson_id} has no knowledge point {}",
                position.knowledge_point_index
            ))
        })?;
    let question_index = position
        .item_index
        .checked_sub(kp.contents.len())
        .ok_or_else(|| EngineError::BadRequest("position is not a question".to_string()))?;

    let progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    let entry = progress
        .kp(kp.id)
        .and_then(|p| p.lesson.get(question_index))
        .ok_or_else(|| {
            EngineError::BadRequest(format!(
                "question {question_index} of knowledge point {} is not allocated",
                kp.id
            ))
        })?;
    if entry.is_answered() {
        return Err(EngineError::AlreadyAnswered(format!(
            "question {} was already answered",
            entry.question_id
        )));
    }
    let question = ctx.question(entry.question_id)?;
    check_choice(question, choice_id)?;

    answers::record_answer(uow.conn(), ctx.user_id, question.id, choice_id, ctx.now_ms()).await?;
    let feedback = AnswerFeedback::for_choice(question, choice_id);

    let progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    let Some(p) = progress.kp(kp.id) else {
        return Err(EngineError::NotFound(format!("knowledge point {} not found", kp.id)));
    };

    if has_failed(p, ctx.config.failure_policy()) {
        let purged: Vec<_> = lesson
            .knowledge_points
            .iter()
            .filter_map(|k| progress.kp(k.id))
            .flat_map(|k| k.lesson.iter().map(|e| e.question_id))
            .collect();
        answers::delete_answers(uow.conn(), ctx.user_id, &purged).await?;
        pools::release(uow.conn(), ctx.user_id, &purged).await?;
        tracing::warn!(
            user_id = ctx.user_id,
            lesson_id,
            kp_id = kp.id,
            incorrect = p.lesson_incorrect(),
            purged = purged.len(),
            "lesson failed, progress reset"
        );
        return Ok(LessonAnswerOutcome {
            feedback,
            lesson_failed: true,
            next_position: LessonPosition::default(),
            lesson_finished: false,
        });
    }

    let complete = is_kp_complete(p, &ctx.config);
    if !complete && !p.unassigned.is_empty() {
        allocate(uow.conn(), ctx.user_id, p, PoolKind::Lesson, None, ctx.now_ms()).await?;
    }

    let next_position = if complete {
        position.next_knowledge_point()
    } else {
        position.next_item()
    };
    let lesson_finished = next_position.knowledge_point_index >= lesson.knowledge_points.len();

    Ok(LessonAnswerOutcome {
        feedback,
        lesson_failed: false,
        next_position,
        lesson_finished,
    })
}
