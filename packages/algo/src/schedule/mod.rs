//! Assessment Scheduler
//!
//! Trigger arithmetic for quizzes and reviews plus the lifecycle predicates
//! of each assessment instance. Creation itself (rows, timestamps) is the
//! backend's job; this module decides *whether* and *with what*.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::graph::PrerequisiteGraph;
use crate::mastery::{lesson_completion_times, trailing_correct, CourseProgress, KpProgress, PoolEntry};
use crate::types::{Course, EngineConfig, KpId, PoolKind, QuestionId, EPOCH_MS};

// ==================== Quiz Trigger ====================

/// Whether the KP already has questions in a quiz, review or diagnostic pool.
fn is_assessed(progress: &KpProgress) -> bool {
    !(progress.quiz.is_empty() && progress.review.is_empty() && progress.diagnostic.is_empty())
}

/// Lesson-completed KPs with a lesson-pool answer newer than `since_ms`,
/// in course order. KPs already represented in an assessment pool are left
/// out.
pub fn recently_completed_kps(
    course: &Course,
    progress: &CourseProgress,
    config: &EngineConfig,
    since_ms: i64,
) -> Vec<KpId> {
    let times = lesson_completion_times(course, progress, config);
    course
        .knowledge_points()
        .filter(|kp| times.get(&kp.id).is_some_and(|&t| t > since_ms))
        .filter(|kp| progress.kp(kp.id).is_some_and(|p| !is_assessed(p)))
        .map(|kp| kp.id)
        .collect()
}

/// Draws `count` distinct KPs from `recent`.
///
/// # Panics
///
/// Panics if fewer than `count` KPs are available. The trigger only fires
/// once the threshold is met and config validation keeps the threshold at
/// or above the sample size, so a short sample means the trigger arithmetic
/// is broken and continuing would corrupt the pools.
pub fn sample_quiz_kps<R: Rng + ?Sized>(recent: &[KpId], count: usize, rng: &mut R) -> Vec<KpId> {
    assert!(
        recent.len() >= count,
        "quiz sample of {count} requested from {} recently completed knowledge points",
        recent.len()
    );
    recent.choose_multiple(rng, count).copied().collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPlan {
    pub sampled_kps: Vec<KpId>,
    /// One quiz-pool question per sampled KP
    pub questions: Vec<QuestionId>,
}

/// Decides whether a new quiz is due and picks its questions.
///
/// `last_quiz_created_ms` is the creation time of the newest quiz for this
/// user and course; without one every completion counts. Only KPs with
/// unassigned questions are sampled, and no plan is returned when none
/// have any left.
pub fn plan_quiz(
    course: &Course,
    progress: &CourseProgress,
    config: &EngineConfig,
    last_quiz_created_ms: Option<i64>,
) -> Option<QuizPlan> {
    let mut rng = ChaCha8Rng::from_entropy();
    plan_quiz_with(course, progress, config, last_quiz_created_ms, &mut rng)
}

pub fn plan_quiz_with<R: Rng + ?Sized>(
    course: &Course,
    progress: &CourseProgress,
    config: &EngineConfig,
    last_quiz_created_ms: Option<i64>,
    rng: &mut R,
) -> Option<QuizPlan> {
    let since = last_quiz_created_ms.unwrap_or(EPOCH_MS);
    let recent = recently_completed_kps(course, progress, config, since);
    if recent.len() < config.quiz_kp_threshold as usize {
        return None;
    }

    let askable: Vec<KpId> = recent
        .into_iter()
        .filter(|kp| progress.kp(*kp).is_some_and(|p| !p.unassigned.is_empty()))
        .collect();
    if askable.is_empty() {
        return None;
    }

    let count = askable.len().min(config.quiz_question_count as usize);
    let sampled_kps = sample_quiz_kps(&askable, count, rng);
    let mut ledger = progress.ledger(course);
    let questions = sampled_kps
        .iter()
        .filter_map(|kp| ledger.allocate_with(*kp, PoolKind::Quiz, rng))
        .collect();

    Some(QuizPlan { sampled_kps, questions })
}

// ==================== Quiz Lifecycle ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuizState {
    /// Never opened; the clock has not started
    NotStarted,
    InProgress { deadline_ms: i64 },
    Submitted,
    TimedOut,
    /// No questions were assigned to the quiz
    Empty,
}

impl QuizState {
    pub fn is_available(&self) -> bool {
        matches!(self, QuizState::NotStarted | QuizState::InProgress { .. })
    }
}

pub fn quiz_state(
    started_at_ms: Option<i64>,
    answered: usize,
    question_count: usize,
    now_ms: i64,
    config: &EngineConfig,
) -> QuizState {
    if question_count == 0 {
        return QuizState::Empty;
    }
    if answered > 0 {
        return QuizState::Submitted;
    }
    match started_at_ms {
        None => QuizState::NotStarted,
        Some(started) => {
            let deadline_ms = started + config.quiz_time_limit_ms();
            if now_ms > deadline_ms {
                QuizState::TimedOut
            } else {
                QuizState::InProgress { deadline_ms }
            }
        }
    }
}

/// Submissions are accepted until the grace period after the deadline.
pub fn accepts_submission(started_at_ms: i64, now_ms: i64, config: &EngineConfig) -> bool {
    now_ms <= started_at_ms + config.quiz_time_limit_ms() + config.quiz_grace_ms()
}

// ==================== Review Trigger ====================

/// Leaf KPs due for a review: completed through the lesson pool, not yet
/// reviewed, and followed by at least `review_kp_threshold` other KP
/// completions.
pub fn review_candidates(
    course: &Course,
    graph: &PrerequisiteGraph,
    progress: &CourseProgress,
    config: &EngineConfig,
    reviewed: &HashSet<KpId>,
) -> Vec<KpId> {
    let times = lesson_completion_times(course, progress, config);
    graph
        .kp_ids()
        .iter()
        .copied()
        .filter(|kp| graph.is_leaf(*kp) && !reviewed.contains(kp))
        .filter(|kp| {
            let Some(&completed_at) = times.get(kp) else {
                return false;
            };
            // strictly later, so the KP itself never counts
            let later = times.values().filter(|&&t| t > completed_at).count();
            later >= config.review_kp_threshold as usize
        })
        .collect()
}

// ==================== Review Lifecycle ====================

/// A review is done once the streak threshold is met, once it has
/// questions and all of them are answered, or once it has none and the
/// KP's bank has nothing left to allocate.
pub fn is_review_complete(progress: &KpProgress, config: &EngineConfig) -> bool {
    let entries = &progress.review;
    if entries.is_empty() {
        return progress.unassigned.is_empty();
    }
    entries.iter().all(PoolEntry::is_answered)
        || trailing_correct(entries) >= config.review_correct_count_threshold
}

/// Whether another review question should be allocated after an answer.
pub fn wants_review_question(entries: &[PoolEntry], config: &EngineConfig) -> bool {
    trailing_correct(entries) < config.review_correct_count_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::PoolRecord;
    use crate::types::{Choice, KnowledgePoint, Lesson, Question};

    fn question(id: QuestionId, kp: KpId) -> Question {
        Question {
            id,
            knowledge_point_id: kp,
            prompt: String::new(),
            explanation: String::new(),
            choices: vec![
                Choice { id: id * 10, text: "yes".to_string(), correct: true },
                Choice { id: id * 10 + 1, text: "no".to_string(), correct: false },
            ],
        }
    }

    /// `n` independent KPs with four questions each; KP `i` owns questions
    /// `i*10 .. i*10+4`.
    fn flat_course(n: i64) -> Course {
        Course {
            id: 1,
            title: "flat".to_string(),
            lessons: vec![Lesson {
                id: 1,
                title: "all".to_string(),
                knowledge_points: (1..=n)
                    .map(|id| KnowledgePoint {
                        id,
                        name: format!("kp{id}"),
                        description: String::new(),
                        prerequisites: vec![],
                        contents: vec![],
                        questions: (0..4).map(|q| question(id * 10 + q, id)).collect(),
                    })
                    .collect(),
            }],
        }
    }

    /// Completes KP `kp` with two correct lesson answers, the last at `at`.
    fn complete(kp: KpId, at: i64) -> Vec<PoolRecord> {
        [kp * 10, kp * 10 + 1]
            .into_iter()
            .enumerate()
            .map(|(i, q)| PoolRecord {
                question_id: q,
                kind: PoolKind::Lesson,
                owner_id: None,
                choice_id: Some(q * 10),
                answered_at_ms: Some(at - 1 + i as i64),
            })
            .collect()
    }

    fn config() -> EngineConfig {
        EngineConfig {
            quiz_kp_threshold: 2,
            quiz_question_count: 2,
            review_kp_threshold: 2,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_quiz_not_due_below_threshold() {
        let course = flat_course(3);
        let progress = CourseProgress::from_records(&course, &complete(1, 100));
        assert_eq!(plan_quiz(&course, &progress, &config(), None), None);
    }

    #[test]
    fn test_quiz_plan_after_two_completions() {
        let course = flat_course(3);
        let mut records = complete(1, 100);
        records.extend(complete(2, 200));
        let progress = CourseProgress::from_records(&course, &records);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let plan = plan_quiz_with(&course, &progress, &config(), None, &mut rng).unwrap();
        let mut kps = plan.sampled_kps.clone();
        kps.sort();
        assert_eq!(kps, vec![1, 2]);
        assert_eq!(plan.questions.len(), 2);
        for q in &plan.questions {
            let kp = course.question(*q).unwrap().knowledge_point_id;
            assert!(progress.kp(kp).unwrap().unassigned.contains(q));
        }

        // Completions older than the last quiz do not count again.
        assert_eq!(plan_quiz(&course, &progress, &config(), Some(200)), None);
        assert!(plan_quiz(&course, &progress, &config(), Some(150)).is_none());
    }

    #[test]
    #[should_panic(expected = "quiz sample")]
    fn test_short_sample_panics() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        sample_quiz_kps(&[1], 2, &mut rng);
    }

    #[test]
    fn test_quiz_states() {
        let config = EngineConfig::default();
        let limit = config.quiz_time_limit_ms();
        assert_eq!(quiz_state(None, 0, 4, 0, &config), QuizState::NotStarted);
        assert_eq!(
            quiz_state(Some(0), 0, 4, limit, &config),
            QuizState::InProgress { deadline_ms: limit }
        );
        assert_eq!(quiz_state(Some(0), 0, 4, limit + 1, &config), QuizState::TimedOut);
        assert_eq!(quiz_state(Some(0), 1, 4, 1, &config), QuizState::Submitted);
        assert_eq!(quiz_state(None, 0, 0, 0, &config), QuizState::Empty);
        assert!(!QuizState::Empty.is_available());
    }

    #[test]
    fn test_submission_grace_window() {
        let config = EngineConfig::default();
        let end = config.quiz_time_limit_ms();
        assert!(accepts_submission(0, end + 10_000, &config));
        assert!(!accepts_submission(0, end + 10_001, &config));
    }

    #[test]
    fn test_review_candidates() {
        let mut course = flat_course(4);
        // KP 4 depends on KP 3, so KP 3 is not a leaf.
        course.lessons[0].knowledge_points[3].prerequisites = vec![3];
        let graph = PrerequisiteGraph::from_course(&course);
        let mut records = complete(1, 100);
        records.extend(complete(2, 200));
        records.extend(complete(3, 300));
        let progress = CourseProgress::from_records(&course, &records);

        // Only KP 1 has two later completions.
        assert_eq!(
            review_candidates(&course, &graph, &progress, &config(), &HashSet::new()),
            vec![1]
        );
        let reviewed: HashSet<KpId> = [1].into_iter().collect();
        assert!(review_candidates(&course, &graph, &progress, &config(), &reviewed).is_empty());
    }

    fn review_entries(answers: &[Option<bool>]) -> Vec<PoolEntry> {
        answers
            .iter()
            .enumerate()
            .map(|(i, c)| PoolEntry {
                question_id: i as i64,
                owner_id: Some(1),
                choice_id: c.map(|_| i as i64),
                correct: *c,
                answered_at_ms: c.map(|_| i as i64),
            })
            .collect()
    }

    fn reviewing(answers: &[Option<bool>], unassigned: Vec<QuestionId>) -> KpProgress {
        KpProgress { kp_id: 1, review: review_entries(answers), unassigned, ..KpProgress::default() }
    }

    #[test]
    fn test_review_lifecycle() {
        let config = EngineConfig::default();
        assert!(!is_review_complete(&reviewing(&[], vec![7]), &config));
        assert!(!is_review_complete(&reviewing(&[Some(true), None], vec![7]), &config));
        assert!(is_review_complete(&reviewing(&[Some(false)], vec![7]), &config));

        let streak = reviewing(&[Some(true), Some(true), Some(true), None], vec![7]);
        assert!(is_review_complete(&streak, &config));
        assert!(!wants_review_question(&streak.review, &config));
        assert!(wants_review_question(&review_entries(&[Some(false)]), &config));
    }

    #[test]
    fn test_review_with_exhausted_bank_is_complete() {
        let config = EngineConfig::default();
        assert!(is_review_complete(&reviewing(&[], vec![]), &config));
    }

    #[test]
    fn test_assessed_kps_do_not_count_toward_quiz() {
        let course = flat_course(3);
        let mut records = complete(1, 100);
        records.extend(complete(2, 200));
        // KP 1 was probed in the diagnostic before its lesson completion
        records.push(PoolRecord {
            question_id: 12,
            kind: PoolKind::Diagnostic,
            owner_id: Some(1),
            choice_id: Some(120),
            answered_at_ms: Some(50),
        });
        let progress = CourseProgress::from_records(&course, &records);

        assert_eq!(recently_completed_kps(&course, &progress, &config(), EPOCH_MS), vec![2]);
        assert_eq!(plan_quiz(&course, &progress, &config(), None), None);
    }

    #[test]
    fn test_quiz_samples_only_kps_with_questions_left() {
        let course = flat_course(3);
        let mut records = complete(1, 100);
        records.extend(complete(2, 200));
        records.extend(complete(3, 300));
        // KP 1 and 2 have handed out their whole bank to the lesson pool
        for q in [12, 13, 22, 23] {
            records.push(PoolRecord {
                question_id: q,
                kind: PoolKind::Lesson,
                owner_id: None,
                choice_id: Some(q * 10),
                answered_at_ms: Some(10),
            });
        }
        let progress = CourseProgress::from_records(&course, &records);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let plan = plan_quiz_with(&course, &progress, &config(), None, &mut rng).unwrap();
        assert_eq!(plan.sampled_kps, vec![3]);
        assert_eq!(plan.questions.len(), 1);
    }

    #[test]
    fn test_no_quiz_when_every_bank_is_exhausted() {
        let course = flat_course(2);
        let mut records = complete(1, 100);
        records.extend(complete(2, 200));
        for q in [12, 13, 22, 23] {
            records.push(PoolRecord {
                question_id: q,
                kind: PoolKind::Lesson,
                owner_id: None,
                choice_id: Some(q * 10),
                answered_at_ms: Some(10),
            });
        }
        let progress = CourseProgress::from_records(&course, &records);
        assert_eq!(plan_quiz(&course, &progress, &config(), None), None);
    }
}
