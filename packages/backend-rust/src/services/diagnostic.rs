//! Diagnostics
//!
//! One placement diagnostic per (course, user), created with the first
//! course view. Probes are allocated one at a time from the traversal
//! frontier, so the next probe depends on how the previous one went.

use serde::Serialize;

use noobular_algo::{diagnostic_status, next_probe, ChoiceId, DiagnosticStatus, PoolKind};

use super::progress::{allocate, load_progress};
use super::{check_choice, AnswerFeedback, EngineError, EngineResult, LearnerContext, QuestionView};
use crate::db::operations::{answers, assessments, pools};
use crate::db::UnitOfWork;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticView {
    pub id: i64,
    pub questions: Vec<QuestionView>,
    pub status: DiagnosticStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticStep {
    pub index: usize,
    /// `None` once `index` is past the last allocated probe
    pub question: Option<QuestionView>,
    pub status: DiagnosticStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticAnswerOutcome {
    pub feedback: AnswerFeedback,
    pub next_index: Option<usize>,
    pub status: DiagnosticStatus,
}

async fn ensure_exists(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    diagnostic_id: i64,
) -> EngineResult<()> {
    if !assessments::diagnostic_exists(uow.conn(), diagnostic_id, ctx.course().id, ctx.user_id)
        .await?
    {
        return Err(EngineError::NotFound(format!("diagnostic {diagnostic_id} not found")));
    }
    Ok(())
}

/// Allocates a probe for the next eligible KP. Returns whether one was
/// allocated.
async fn allocate_next_probe(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    diagnostic_id: i64,
) -> EngineResult<bool> {
    let progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    let Some(p) = next_probe(ctx.graph(), &progress).and_then(|kp| progress.kp(kp)) else {
        return Ok(false);
    };
    let allocated = allocate(
        uow.conn(),
        ctx.user_id,
        p,
        PoolKind::Diagnostic,
        Some(diagnostic_id),
        ctx.now_ms(),
    )
    .await?;
    Ok(allocated.is_some())
}

async fn question_views(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    diagnostic_id: i64,
) -> EngineResult<Vec<QuestionView>> {
    pools::owned_questions(uow.conn(), ctx.user_id, PoolKind::Diagnostic, diagnostic_id)
        .await?
        .iter()
        .map(|q| Ok(QuestionView::new(ctx.question(q.question_id)?, q.choice_id)))
        .collect()
}

async fn status(uow: &mut UnitOfWork, ctx: &LearnerContext) -> EngineResult<DiagnosticStatus> {
    let progress = load_progress(uow.conn(), ctx.user_id, ctx.course()).await?;
    Ok(diagnostic_status(ctx.graph(), &progress))
}

pub async fn open_diagnostic(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    diagnostic_id: i64,
) -> EngineResult<DiagnosticView> {
    ensure_exists(uow, ctx, diagnostic_id).await?;
    let owned =
        pools::owned_questions(uow.conn(), ctx.user_id, PoolKind::Diagnostic, diagnostic_id).await?;
    if owned.is_empty() {
        allocate_next_probe(uow, ctx, diagnostic_id).await?;
    }

    Ok(DiagnosticView {
        id: diagnostic_id,
        questions: question_views(uow, ctx, diagnostic_id).await?,
        status: status(uow, ctx).await?,
    })
}

pub async fn advance_diagnostic(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    diagnostic_id: i64,
    index: usize,
) -> EngineResult<DiagnosticStep> {
    ensure_exists(uow, ctx, diagnostic_id).await?;
    let question = question_views(uow, ctx, diagnostic_id).await?.into_iter().nth(index);
    Ok(DiagnosticStep {
        index,
        question,
        status: status(uow, ctx).await?,
    })
}

pub async fn submit_diagnostic_answer(
    uow: &mut UnitOfWork,
    ctx: &LearnerContext,
    diagnostic_id: i64,
    index: usize,
    choice_id: ChoiceId,
) -> EngineResult<DiagnosticAnswerOutcome> {
    ensure_exists(uow, ctx, diagnostic_id).await?;
    let owned =
        pools::owned_questions(uow.conn(), ctx.user_id, PoolKind::Diagnostic, diagnostic_id).await?;
    let target = owned.get(index).ok_or_else(|| {
        EngineError::BadRequest(format!("diagnostic {diagnostic_id} has no question {index}"))
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

    let mut allocated = owned.len();
    if allocate_next_probe(uow, ctx, diagnostic_id).await? {
        allocated += 1;
    }

    let status = status(uow, ctx).await?;
    if status.finished {
        tracing::info!(
            user_id = ctx.user_id,
            diagnostic_id,
            probed = status.allocated,
            passed = status.passed,
            "diagnostic finished"
        );
    }
    Ok(DiagnosticAnswerOutcome {
        feedback,
        next_index: (index + 1 < allocated).then_some(index + 1),
        status,
    })
}
