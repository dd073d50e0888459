//! Mastery Tracker
//!
//! Turns one user's pool assignments and answers into per-KP and per-lesson
//! completion state. Everything here is a pure function of a
//! [`CourseProgress`] snapshot; the backend builds the snapshot inside the
//! request transaction and re-evaluates after every write.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::PrerequisiteGraph;
use crate::pool::PoolLedger;
use crate::types::{
    ChoiceId, Course, EngineConfig, FailurePolicy, KpId, Lesson, LessonId, PoolKind, QuestionId,
};

// ==================== Progress Snapshot ====================

/// One persisted pool assignment joined with the user's answer, if any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub question_id: QuestionId,
    pub kind: PoolKind,
    /// Owning quiz, review or diagnostic instance; `None` for the lesson pool
    pub owner_id: Option<i64>,
    pub choice_id: Option<ChoiceId>,
    pub answered_at_ms: Option<i64>,
}

/// A pool entry with its answer already graded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub question_id: QuestionId,
    pub owner_id: Option<i64>,
    pub choice_id: Option<ChoiceId>,
    /// `None` while unanswered
    pub correct: Option<bool>,
    pub answered_at_ms: Option<i64>,
}

impl PoolEntry {
    pub fn is_answered(&self) -> bool {
        self.correct.is_some()
    }
}

/// Pool view of a single KP for one user. Entries are in allocation order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpProgress {
    pub kp_id: KpId,
    pub lesson: Vec<PoolEntry>,
    pub quiz: Vec<PoolEntry>,
    pub review: Vec<PoolEntry>,
    pub diagnostic: Vec<PoolEntry>,
    /// Bank questions not yet committed to any pool
    pub unassigned: Vec<QuestionId>,
}

impl KpProgress {
    pub fn entries(&self, kind: PoolKind) -> &[PoolEntry] {
        match kind {
            PoolKind::Lesson => &self.lesson,
            PoolKind::Quiz => &self.quiz,
            PoolKind::Review => &self.review,
            PoolKind::Diagnostic => &self.diagnostic,
        }
    }

    fn entries_mut(&mut self, kind: PoolKind) -> &mut Vec<PoolEntry> {
        match kind {
            PoolKind::Lesson => &mut self.lesson,
            PoolKind::Quiz => &mut self.quiz,
            PoolKind::Review => &mut self.review,
            PoolKind::Diagnostic => &mut self.diagnostic,
        }
    }

    pub fn lesson_answered(&self) -> usize {
        self.lesson.iter().filter(|e| e.is_answered()).count()
    }

    pub fn lesson_incorrect(&self) -> usize {
        self.lesson.iter().filter(|e| e.correct == Some(false)).count()
    }

    /// Index of the first unanswered lesson-pool question.
    pub fn pending_lesson_question(&self) -> Option<usize> {
        self.lesson.iter().position(|e| !e.is_answered())
    }

    /// Latest lesson-pool answer time. Quiz, review and diagnostic answers
    /// never move it.
    pub fn last_lesson_answer_ms(&self) -> Option<i64> {
        self.lesson.iter().filter_map(|e| e.answered_at_ms).max()
    }
}

/// Snapshot of one user's progress over a whole course.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CourseProgress {
    kps: HashMap<KpId, KpProgress>,
}

impl CourseProgress {
    /// Grades `records` against the course and groups them per KP. Records
    /// must arrive in allocation order; those naming questions outside the
    /// course are ignored.
    pub fn from_records(course: &Course, records: &[PoolRecord]) -> Self {
        let mut kps: HashMap<KpId, KpProgress> = HashMap::new();
        let mut assigned: HashSet<QuestionId> = HashSet::with_capacity(records.len());
        let mut questions = HashMap::new();

        for kp in course.knowledge_points() {
            kps.insert(kp.id, KpProgress { kp_id: kp.id, ..KpProgress::default() });
            for q in &kp.questions {
                questions.insert(q.id, q);
            }
        }

        for record in records {
            let Some(question) = questions.get(&record.question_id) else {
                continue;
            };
            if !assigned.insert(record.question_id) {
                continue;
            }
            let correct = record.choice_id.map(|choice| question.is_correct(choice));
            if let Some(progress) = kps.get_mut(&question.knowledge_point_id) {
                progress.entries_mut(record.kind).push(PoolEntry {
                    question_id: record.question_id,
                    owner_id: record.owner_id,
                    choice_id: record.choice_id,
                    correct,
                    answered_at_ms: record.answered_at_ms.filter(|_| correct.is_some()),
                });
            }
        }

        for kp in course.knowledge_points() {
            if let Some(progress) = kps.get_mut(&kp.id) {
                progress.unassigned = kp
                    .questions
                    .iter()
                    .map(|q| q.id)
                    .filter(|id| !assigned.contains(id))
                    .collect();
            }
        }

        Self { kps }
    }

    pub fn kp(&self, kp_id: KpId) -> Option<&KpProgress> {
        self.kps.get(&kp_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KpProgress> {
        self.kps.values()
    }

    /// Pool ledger matching this snapshot, for allocating new questions.
    pub fn ledger(&self, course: &Course) -> PoolLedger {
        let mut ledger = PoolLedger::new();
        for kp in course.knowledge_points() {
            ledger.add_bank(kp);
            if let Some(progress) = self.kps.get(&kp.id) {
                for kind in PoolKind::ALL {
                    for entry in progress.entries(kind) {
                        ledger.record(entry.question_id, kind);
                    }
                }
            }
        }
        ledger
    }
}

// ==================== KP Predicates ====================

/// Consecutive correct answers counted back from the newest entry.
/// Unanswered entries are skipped; the first incorrect answer stops the count.
pub fn trailing_correct(entries: &[PoolEntry]) -> u32 {
    let mut streak = 0;
    for entry in entries.iter().rev() {
        match entry.correct {
            None => continue,
            Some(true) => streak += 1,
            Some(false) => break,
        }
    }
    streak
}

/// Lesson-pool completion: the trailing streak reached the threshold, or
/// every lesson question is answered and the bank has nothing left to give.
pub fn is_kp_complete(progress: &KpProgress, config: &EngineConfig) -> bool {
    let exhausted = progress.unassigned.is_empty()
        && progress.lesson.iter().all(PoolEntry::is_answered);
    exhausted || trailing_correct(&progress.lesson) >= config.correct_count_threshold
}

/// Diagnostic completion: at least one diagnostic question and all of them
/// answered correctly.
pub fn is_diagnostically_complete(progress: &KpProgress) -> bool {
    !progress.diagnostic.is_empty()
        && progress.diagnostic.iter().all(|e| e.correct == Some(true))
}

/// Completion by either predicate, used for unlocking lessons.
pub fn is_kp_satisfied(progress: &KpProgress, config: &EngineConfig) -> bool {
    is_kp_complete(progress, config) || is_diagnostically_complete(progress)
}

/// Whether the lesson-pool answers for the KP crossed the failure policy.
pub fn has_failed(progress: &KpProgress, policy: FailurePolicy) -> bool {
    let incorrect = progress.lesson_incorrect();
    match policy {
        FailurePolicy::IncorrectCount(limit) => incorrect >= limit as usize,
        FailurePolicy::IncorrectRatio { ratio, min_answered } => {
            let answered = progress.lesson_answered();
            answered >= min_answered as usize
                && answered > 0
                && incorrect as f64 / answered as f64 >= ratio
        }
    }
}

// ==================== Course Completion ====================

/// KP ids completed through the lesson pool, with their completion times
/// (latest lesson-pool answer). KPs completed without any answered lesson
/// question carry no time and are left out.
pub fn lesson_completion_times(
    course: &Course,
    progress: &CourseProgress,
    config: &EngineConfig,
) -> HashMap<KpId, i64> {
    course
        .knowledge_points()
        .filter_map(|kp| {
            let p = progress.kp(kp.id)?;
            if !is_kp_complete(p, config) {
                return None;
            }
            p.last_lesson_answer_ms().map(|t| (kp.id, t))
        })
        .collect()
}

pub fn satisfied_kps(
    course: &Course,
    progress: &CourseProgress,
    config: &EngineConfig,
) -> HashSet<KpId> {
    course
        .knowledge_points()
        .filter(|kp| progress.kp(kp.id).is_some_and(|p| is_kp_satisfied(p, config)))
        .map(|kp| kp.id)
        .collect()
}

pub fn is_lesson_complete(lesson: &Lesson, satisfied: &HashSet<KpId>) -> bool {
    lesson.knowledge_points.iter().all(|kp| satisfied.contains(&kp.id))
}

/// Lessons split into completed, ready (`next`) and blocked (`remaining`),
/// each in course order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPartition {
    pub next: Vec<LessonId>,
    pub completed: Vec<LessonId>,
    pub remaining: Vec<LessonId>,
}

/// A lesson is ready when each KP's prerequisites are satisfied or are
/// earlier KPs of the same lesson.
pub fn partition_lessons(
    course: &Course,
    progress: &CourseProgress,
    config: &EngineConfig,
) -> LessonPartition {
    let satisfied = satisfied_kps(course, progress, config);
    let mut partition = LessonPartition::default();

    for lesson in &course.lessons {
        if is_lesson_complete(lesson, &satisfied) {
            partition.completed.push(lesson.id);
            continue;
        }

        let mut in_lesson: HashSet<KpId> = HashSet::new();
        let mut ready = true;
        for kp in &lesson.knowledge_points {
            in_lesson.insert(kp.id);
            let blocked = kp
                .prerequisites
                .iter()
                .any(|p| !satisfied.contains(p) && !in_lesson.contains(p));
            if blocked {
                ready = false;
                break;
            }
        }

        if ready {
            partition.next.push(lesson.id);
        } else {
            partition.remaining.push(lesson.id);
        }
    }
    partition
}

/// Latest answer time over a lesson's lesson-pool and diagnostic questions.
pub fn lesson_completed_at(lesson: &Lesson, progress: &CourseProgress) -> Option<i64> {
    lesson
        .knowledge_points
        .iter()
        .filter_map(|kp| progress.kp(kp.id))
        .flat_map(|p| p.lesson.iter().chain(p.diagnostic.iter()))
        .filter_map(|e| e.answered_at_ms)
        .max()
}

/// Unsatisfied prerequisites from outside the lesson that keep it blocked.
pub fn blocked_by(
    lesson: &Lesson,
    graph: &PrerequisiteGraph,
    satisfied: &HashSet<KpId>,
) -> Vec<KpId> {
    let in_lesson: HashSet<KpId> = lesson.knowledge_points.iter().map(|kp| kp.id).collect();
    let mut missing: Vec<KpId> = Vec::new();
    for kp in &lesson.knowledge_points {
        for &p in graph.prerequisites(kp.id) {
            if !satisfied.contains(&p) && !in_lesson.contains(&p) && !missing.contains(&p) {
                missing.push(p);
            }
        }
    }
    missing
}
