//! Common Types and Constants
//!
//! Shared data structures used across all algorithm modules: the immutable
//! course tree, the authored course definition it is loaded from, pool kinds
//! and the engine configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==================== Constants ====================

/// Maximum number of knowledge points accepted in one course
pub const MAX_COURSE_KNOWLEDGE_POINTS: usize = 1000;

/// Minimum number of questions authored per knowledge point
pub const MIN_QUESTIONS_PER_KNOWLEDGE_POINT: usize = 2;

/// Minimum number of choices per question
pub const MIN_CHOICES_PER_QUESTION: usize = 2;

/// Start of time used when no quiz has been created yet (epoch millis)
pub const EPOCH_MS: i64 = 0;

// ==================== Identifiers ====================

pub type CourseId = i64;
pub type LessonId = i64;
pub type KpId = i64;
pub type QuestionId = i64;
pub type ChoiceId = i64;
pub type UserId = i64;

// ==================== Course Tree ====================

/// A loaded course. Immutable once authored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    pub knowledge_points: Vec<KnowledgePoint>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub id: KpId,
    pub name: String,
    pub description: String,
    /// Prerequisite KP ids (edges of the prerequisite DAG)
    pub prerequisites: Vec<KpId>,
    /// Display-only content blocks, in authored order
    pub contents: Vec<String>,
    /// Full question bank, in authored order
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub knowledge_point_id: KpId,
    pub prompt: String,
    pub explanation: String,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub text: String,
    pub correct: bool,
}

impl Question {
    /// The single correct choice. Validated at load time.
    pub fn correct_choice(&self) -> Option<&Choice> {
        self.choices.iter().find(|c| c.correct)
    }

    pub fn choice(&self, choice_id: ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }

    pub fn is_correct(&self, choice_id: ChoiceId) -> bool {
        self.choice(choice_id).map(|c| c.correct).unwrap_or(false)
    }
}

impl Course {
    pub fn knowledge_points(&self) -> impl Iterator<Item = &KnowledgePoint> {
        self.lessons.iter().flat_map(|l| l.knowledge_points.iter())
    }

    pub fn lesson(&self, lesson_id: LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == lesson_id)
    }

    pub fn knowledge_point(&self, kp_id: KpId) -> Option<&KnowledgePoint> {
        self.knowledge_points().find(|kp| kp.id == kp_id)
    }

    pub fn question(&self, question_id: QuestionId) -> Option<&Question> {
        self.knowledge_points()
            .flat_map(|kp| kp.questions.iter())
            .find(|q| q.id == question_id)
    }
}

// ==================== Course Definition ====================

/// Authored course as it arrives from the content pipeline, before ids exist.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CourseDefinition {
    pub title: String,
    pub lessons: Vec<LessonDefinition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LessonDefinition {
    pub title: String,
    pub knowledge_points: Vec<KnowledgePointDefinition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgePointDefinition {
    pub name: String,
    pub description: String,
    /// Prerequisite KP names
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub contents: Vec<String>,
    pub questions: Vec<QuestionDefinition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionDefinition {
    pub prompt: String,
    pub explanation: String,
    pub choices: Vec<ChoiceDefinition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChoiceDefinition {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

impl CourseDefinition {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn knowledge_points(&self) -> impl Iterator<Item = &KnowledgePointDefinition> {
        self.lessons.iter().flat_map(|l| l.knowledge_points.iter())
    }
}

// ==================== Pools ====================

/// The four disjoint usage contexts a question can be committed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Lesson,
    Quiz,
    Review,
    Diagnostic,
}

impl PoolKind {
    pub const ALL: [PoolKind; 4] = [
        PoolKind::Lesson,
        PoolKind::Quiz,
        PoolKind::Review,
        PoolKind::Diagnostic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Lesson => "lesson",
            PoolKind::Quiz => "quiz",
            PoolKind::Review => "review",
            PoolKind::Diagnostic => "diagnostic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "lesson" => Some(PoolKind::Lesson),
            "quiz" => Some(PoolKind::Quiz),
            "review" => Some(PoolKind::Review),
            "diagnostic" => Some(PoolKind::Diagnostic),
            _ => None,
        }
    }
}

// ==================== Engine Config ====================

/// Policy deciding when a learner has failed a KP and must restart the lesson.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Fail once this many lesson-pool answers for the KP are incorrect
    IncorrectCount(u32),
    /// Fail once incorrect/answered reaches the ratio, counted only after
    /// `min_answered` answers
    IncorrectRatio { ratio: f64, min_answered: u32 },
}

/// Thresholds driving mastery and scheduling. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Consecutive correct lesson answers that complete a KP
    pub correct_count_threshold: u32,
    /// Incorrect lesson answers for one KP that fail the lesson
    pub incorrect_count_fail_threshold: u32,
    /// When set, wrong:answered ratio that fails the lesson instead of the count
    pub incorrect_ratio_fail_threshold: Option<f64>,
    /// KPs completed since the last quiz before a new quiz is created
    pub quiz_kp_threshold: u32,
    /// Questions (one per sampled KP) in a quiz
    pub quiz_question_count: u32,
    /// Quiz time window
    pub quiz_time_limit_minutes: u32,
    /// Late submissions accepted after the window closes
    pub quiz_grace_seconds: u32,
    /// Other KPs completed after a leaf KP before it is reviewed
    pub review_kp_threshold: u32,
    /// Consecutive correct review answers that finish a review
    pub review_correct_count_threshold: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            correct_count_threshold: 2,
            incorrect_count_fail_threshold: 3,
            incorrect_ratio_fail_threshold: None,
            quiz_kp_threshold: 8,
            quiz_question_count: 4,
            quiz_time_limit_minutes: 10,
            quiz_grace_seconds: 10,
            review_kp_threshold: 4,
            review_correct_count_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("quiz_kp_threshold ({threshold}) must be >= quiz_question_count ({count})")]
    QuizSample { threshold: u32, count: u32 },
    #[error("incorrect_ratio_fail_threshold must be in (0, 1], got {0}")]
    Ratio(f64),
}

impl EngineConfig {
    /// Development preset: quizzes surface after two completed KPs.
    pub fn debug() -> Self {
        Self {
            quiz_kp_threshold: 2,
            quiz_question_count: 2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("correct_count_threshold", self.correct_count_threshold),
            ("incorrect_count_fail_threshold", self.incorrect_count_fail_threshold),
            ("quiz_kp_threshold", self.quiz_kp_threshold),
            ("quiz_question_count", self.quiz_question_count),
            ("quiz_time_limit_minutes", self.quiz_time_limit_minutes),
            ("review_kp_threshold", self.review_kp_threshold),
            ("review_correct_count_threshold", self.review_correct_count_threshold),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.quiz_kp_threshold < self.quiz_question_count {
            return Err(ConfigError::QuizSample {
                threshold: self.quiz_kp_threshold,
                count: self.quiz_question_count,
            });
        }
        if let Some(ratio) = self.incorrect_ratio_fail_threshold {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::Ratio(ratio));
            }
        }
        Ok(())
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        match self.incorrect_ratio_fail_threshold {
            Some(ratio) => FailurePolicy::IncorrectRatio {
                ratio,
                min_answered: self.incorrect_count_fail_threshold,
            },
            None => FailurePolicy::IncorrectCount(self.incorrect_count_fail_threshold),
        }
    }

    pub fn quiz_time_limit_ms(&self) -> i64 {
        i64::from(self.quiz_time_limit_minutes) * 60_000
    }

    pub fn quiz_grace_ms(&self) -> i64 {
        i64::from(self.quiz_grace_seconds) * 1_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question {
            id: 1,
            knowledge_point_id: 1,
            prompt: "2 + 2".to_string(),
            explanation: "arithmetic".to_string(),
            choices: vec![
                Choice { id: 10, text: "3".to_string(), correct: false },
                Choice { id: 11, text: "4".to_string(), correct: true },
            ],
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
        assert_eq!(EngineConfig::debug().validate(), Ok(()));
    }

    #[test]
    fn test_config_rejects_quiz_sample_larger_than_threshold() {
        let config = EngineConfig {
            quiz_kp_threshold: 2,
            quiz_question_count: 3,
            ..EngineConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::QuizSample { threshold: 2, count: 3 })
        );
    }

    #[test]
    fn test_config_rejects_zero_threshold() {
        let config = EngineConfig {
            correct_count_threshold: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero { .. })));
    }

    #[test]
    fn test_failure_policy_selection() {
        let config = EngineConfig::default();
        assert_eq!(config.failure_policy(), FailurePolicy::IncorrectCount(3));

        let ratio = EngineConfig {
            incorrect_ratio_fail_threshold: Some(0.6),
            ..EngineConfig::default()
        };
        assert_eq!(
            ratio.failure_policy(),
            FailurePolicy::IncorrectRatio { ratio: 0.6, min_answered: 3 }
        );
        assert!(EngineConfig {
            incorrect_ratio_fail_threshold: Some(1.5),
            ..EngineConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_question_correct_choice() {
        let q = question();
        assert_eq!(q.correct_choice().map(|c| c.id), Some(11));
        assert!(q.is_correct(11));
        assert!(!q.is_correct(10));
        assert!(!q.is_correct(99));
    }

    #[test]
    fn test_pool_kind_round_trip_names() {
        for kind in PoolKind::ALL {
            assert_eq!(PoolKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(PoolKind::from_str("LESSON"), None);
    }

    #[test]
    fn test_course_definition_defaults() {
        let json = br#"{
            "title": "Algebra",
            "lessons": [{
                "title": "Basics",
                "knowledge_points": [{
                    "name": "add",
                    "description": "addition",
                    "questions": [{
                        "prompt": "1+1",
                        "explanation": "two",
                        "choices": [{"text": "2", "correct": true}, {"text": "3"}]
                    }]
                }]
            }]
        }"#;
        let def = CourseDefinition::from_json_slice(json).unwrap();
        let kp = def.knowledge_points().next().unwrap();
        assert!(kp.prerequisites.is_empty());
        assert!(kp.contents.is_empty());
        assert!(!kp.questions[0].choices[1].correct);
    }
}
