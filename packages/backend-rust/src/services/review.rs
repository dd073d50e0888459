//! Reviews
//!
//! One review per (KP, user). Its questions come from the KP's review pool
//! one at a time: the first when the review is opened, another after each
//! answer until the streak threshold is met or the bank runs out.

use std::collections::HashSet;

use serde::Serialize;

use noobular_algo::schedule::wants_review_question;
use noobular_algo::{
    is_review_complete, review_candidates, ChoiceId, CourseProgress, KpId, PoolKind,
};

use super::lesson::KnowledgePointSummary;
use super::progress::{allocate, load_progress};
use super::{check_choice, AnswerFeedback, EngineError, EngineResult, LearnerContext, QuestionView};
use crate::db::operations::assessments::{self, ReviewRow};
use crate::db::operations::{answers, pools};
use crate::db::UnitOfWork;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: i64,
    pub knowledge_point: KnowledgePointSummary,
    pub questions: Vec<QuestionView>,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStep {
    pub index: usize,
    /// `None` once `index` is past the last allocated question
    pub question: Option<QuestionView>,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAnswerOutcome {
    pub feedback: AnswerFeedback,
    pub next_index: Option<usize>,
    pub complete: bool,
}

/// Creates reviews for every leaf KP that is due. Returns the KPs that got
/// one.
pub async fn run_review_trigger(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    progress: &CourseProgress,
) -> EngineResult<Vec<KpId>> {
    let reviewed: HashSet<KpId> = assessments::list_reviews(uow.conn(), ctx.course().id, ctx.user_id)
        .await?
        .into_iter()
        .map(|r| r.knowledge_point_id)
        .collect();

    let candidates = review_candidates(ctx.course(), ctx.graph(), progress, &ctx.config, &reviewed);
    let mut created = Vec::with_capacity(candidates.len());
    for kp_id in candidates {
        if assessments::create_review(uow.conn(), kp_id, ctx.user_id, ctx.now_ms()).await? {
            tracing::info!(user_id = ctx.user_id, kp_id, "review created");
            created.push(kp_id);
        }
    }
    Ok(created)
}

async fn find_review(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    review_id: i64,
) -> EngineResult<ReviewRow> {
    assessments::get_review(uow.conn(), review_id, ctx.course().id, ctx.user_id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("review {review_id} not found")))
}

fn review_complete(progress: &CourseProgress, ctx: &LearnerContext, kp_id: KpId) -> bool {
    progress
        .kp(kp_id)
        .is_some_and(|p| is_review_complete(p, &ctx.config))
}

async fn question_views(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    review_id: i64,
) -> EngineResult<Vec<QuestionView>> {
    pools::owned_questions(uow.conn(), ctx.user_id, PoolKind::Review, review_id)
        .await?
        .iter()
        .map(|q| Ok(QuestionView::new(ctx.question(q.question_id)?, q.choice_id)))
        .collect()
}

pub async fn open_review(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    review_id: i64,
) -> EngineResult<ReviewView> {
    let review = find_review(uow, ctx, review_id).await?;
    let kp = ctx.course().knowledge_point(review.knowledge_point_id).ok_or_else(|| {
        EngineError::NotFound(format!("knowledge point {} not found", review.knowledge_point_id))
    })?;

    let mut progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    if let Some(p) = progress.kp(kp.id).filter(|p| p.review.is_empty()) {
        allocate(uow.conn(), ctx.user_id, p, PoolKind::Review, Some(review.id), ctx.now_ms())
            .await?;
        progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    }

    Ok(ReviewView {
        id: review.id,
        knowledge_point: KnowledgePointSummary::from(kp),
        questions: question_views(uow, ctx, review.id).await?,
        complete: review_complete(&progress, ctx, kp.id),
    })
}

pub async fn advance_review(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    review_id: i64,
    index: usize,
) -> EngineResult<ReviewStep> {
    let review = find_review(uow, ctx, review_id).await?;
    let progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    let question = question_views(uow, ctx, review.id).await?.into_iter().nth(index);
    Ok(ReviewStep {
        index,
        question,
        complete: review_complete(&progress, ctx, review.knowledge_point_id),
    })
}

pub async fn submit_review_answer(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    review_id: i64,
    index: usize,
    choice_id: ChoiceId,
) -> EngineResult<ReviewAnswerOutcome> {
    let review = find_review(uow, ctx, review_id).await?;
    let owned = pools::owned_questions(uow.conn(), ctx.user_id, PoolKind::Review, review.id).await?;
    let target = owned.get(index).ok_or_else(|| {
        EngineError::BadRequest(format!("review {review_id} has no question {index}"))
    })?;
    if target.choice_id.is_some() {
        return Err(EngineError::AlreadyAnswered(format!(
            "question {} was already answered",
            target.question_id
        )));
    }
    let question = ctx.question(target.question_id)?;
    check_choice(question, choice_id)?;

    answers::record_answer(uow.conn(), ctx.user_id, question.id, choice_id, ctx.now_ms()).await?;
    let feedback = AnswerFeedback::for_choice(question, choice_id);

    let mut progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    let mut allocated = owned.len();
    if let Some(p) = progress.kp(review.knowledge_point_id) {
        if wants_review_question(&p.review, &ctx.config) && !p.unassigned.is_empty() {
            allocate(uow.conn(), ctx.user_id, p, PoolKind::Review, Some(review.id), ctx.now_ms())
                .await?;
            allocated += 1;
            progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
        }
    }

    let complete = review_complete(&progress, ctx, review.knowledge_point_id);
    if complete {
        tracing::info!(user_id = ctx.user_id, review_id, "review complete");
    }
    Ok(ReviewAnswerOutcome {
        feedback,
        next_index: (index + 1 < allocated).then_some(index + 1),
        complete,
    })
}
