//! Diagnostic Traversal
//!
//! Placement probing over the prerequisite DAG. Roots are probed first; a
//! KP becomes eligible once every prerequisite was passed in the diagnostic.
//! A failed probe is never expanded, so everything behind it stays
//! unprobed for the lifetime of the diagnostic.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::PrerequisiteGraph;
use crate::mastery::{is_diagnostically_complete, CourseProgress};
use crate::types::KpId;

/// KPs whose diagnostic probe was answered correctly.
pub fn passed_kps(graph: &PrerequisiteGraph, progress: &CourseProgress) -> HashSet<KpId> {
    graph
        .kp_ids()
        .iter()
        .copied()
        .filter(|kp| progress.kp(*kp).is_some_and(is_diagnostically_complete))
        .collect()
}

/// Unprobed KPs whose prerequisites have all been passed, in course order.
/// KPs with nothing left in their bank are skipped.
pub fn eligible_probes(graph: &PrerequisiteGraph, progress: &CourseProgress) -> Vec<KpId> {
    let passed = passed_kps(graph, progress);
    graph
        .kp_ids()
        .iter()
        .copied()
        .filter(|&kp| {
            let Some(p) = progress.kp(kp) else {
                return false;
            };
            p.diagnostic.is_empty()
                && !p.unassigned.is_empty()
                && graph.prerequisites(kp).iter().all(|pre| passed.contains(pre))
        })
        .collect()
}

/// The KP to probe next, if the traversal is not finished.
pub fn next_probe(graph: &PrerequisiteGraph, progress: &CourseProgress) -> Option<KpId> {
    eligible_probes(graph, progress).into_iter().next()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticStatus {
    pub allocated: usize,
    pub answered: usize,
    pub passed: usize,
    /// Every probe answered and nothing eligible left to probe
    pub finished: bool,
}

pub fn diagnostic_status(graph: &PrerequisiteGraph, progress: &CourseProgress) -> DiagnosticStatus {
    let mut allocated = 0;
    let mut answered = 0;
    for kp in graph.kp_ids() {
        if let Some(p) = progress.kp(*kp) {
            allocated += p.diagnostic.len();
            answered += p.diagnostic.iter().filter(|e| e.is_answered()).count();
        }
    }
    let passed = passed_kps(graph, progress).len();
    let finished = allocated == answered && next_probe(graph, progress).is_none();
    DiagnosticStatus { allocated, answered, passed, finished }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mastery::PoolRecord;
    use crate::types::{Choice, Course, KnowledgePoint, Lesson, PoolKind, Question, QuestionId};

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

    /// A -> B -> C chain, two questions each.
    fn chain() -> Course {
        let kp = |id: KpId, prerequisites: Vec<KpId>| KnowledgePoint {
            id,
            name: format!("kp{id}"),
            description: String::new(),
            prerequisites,
            contents: vec![],
            questions: vec![question(id * 100, id), question(id * 100 + 1, id)],
        };
        Course {
            id: 1,
            title: "chain".to_string(),
            lessons: vec![Lesson {
                id: 1,
                title: "all".to_string(),
                knowledge_points: vec![kp(1, vec![]), kp(2, vec![1]), kp(3, vec![2])],
            }],
        }
    }

    fn probe(question_id: QuestionId, answer: Option<bool>) -> PoolRecord {
        PoolRecord {
            question_id,
            kind: PoolKind::Diagnostic,
            owner_id: Some(1),
            choice_id: answer.map(|ok| if ok { question_id * 10 } else { question_id * 10 + 1 }),
            answered_at_ms: answer.map(|_| 1),
        }
    }

    #[test]
    fn test_starts_at_roots() {
        let course = chain();
        let graph = PrerequisiteGraph::from_course(&course);
        let progress = CourseProgress::from_records(&course, &[]);
        assert_eq!(eligible_probes(&graph, &progress), vec![1]);
        assert!(!diagnostic_status(&graph, &progress).finished);
    }

    #[test]
    fn test_correct_answer_expands() {
        let course = chain();
        let graph = PrerequisiteGraph::from_course(&course);

        let pending = CourseProgress::from_records(&course, &[probe(100, None)]);
        assert_eq!(next_probe(&graph, &pending), None);
        assert!(!diagnostic_status(&graph, &pending).finished);

        let passed = CourseProgress::from_records(&course, &[probe(100, Some(true))]);
        assert_eq!(next_probe(&graph, &passed), Some(2));
    }

    #[test]
    fn test_incorrect_answer_stops_branch() {
        let course = chain();
        let graph = PrerequisiteGraph::from_course(&course);
        let progress = CourseProgress::from_records(&course, &[probe(100, Some(false))]);
        assert_eq!(next_probe(&graph, &progress), None);
        let status = diagnostic_status(&graph, &progress);
        assert!(status.finished);
        assert_eq!(status.allocated, 1);
        assert_eq!(status.passed, 0);
    }

    #[test]
    fn test_exhausted_bank_is_skipped() {
        let course = chain();
        let graph = PrerequisiteGraph::from_course(&course);
        let mut records = vec![probe(100, Some(true))];
        for q in [200, 201] {
            records.push(PoolRecord {
                question_id: q,
                kind: PoolKind::Lesson,
                owner_id: None,
                choice_id: None,
                answered_at_ms: None,
            });
        }
        let progress = CourseProgress::from_records(&course, &records);
        assert!(eligible_probes(&graph, &progress).is_empty());
        assert!(diagnostic_status(&graph, &progress).finished);
    }
}
