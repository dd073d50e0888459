//! # noobular-algo - mastery engine core algorithms
//!
//! Pure, synchronous building blocks of a mastery-based course engine. No
//! I/O happens here; callers hand in snapshots and persist the results.
//!
//! ## Modules
//!
//! - [`types`] - course tree, authored definitions, pool kinds, engine config
//! - [`graph`] - prerequisite DAG validation and adjacency lists
//! - [`validate`] - authoring checks run when a course is loaded
//! - [`pool`] - disjoint per-user question pools and random allocation
//! - [`mastery`] - KP and lesson completion from answer history
//! - [`diagnostic`] - placement probing over the prerequisite DAG
//! - [`schedule`] - quiz and review triggers and lifecycles
//!
//! ## Example
//!
//! ```rust
//! use noobular_algo::{CourseProgress, EngineConfig, partition_lessons};
//! use noobular_algo::types::{Course, Lesson};
//!
//! let course = Course { id: 1, title: "Empty".to_string(), lessons: Vec::<Lesson>::new() };
//! let progress = CourseProgress::from_records(&course, &[]);
//! let partition = partition_lessons(&course, &progress, &EngineConfig::default());
//! assert!(partition.next.is_empty());
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod diagnostic;
pub mod graph;
pub mod mastery;
pub mod pool;
pub mod schedule;
pub mod types;
pub mod validate;

// ============================================================================
// Re-exports
// ============================================================================

pub use types::*;

pub use graph::{validate_prerequisite_graph, GraphError, PrerequisiteGraph};

pub use validate::{validate_course, CourseError};

pub use pool::{pick_unassigned, PoolLedger};

pub use mastery::{
    has_failed, is_diagnostically_complete, is_kp_complete, is_kp_satisfied, partition_lessons,
    trailing_correct, CourseProgress, KpProgress, LessonPartition, PoolEntry, PoolRecord,
};

pub use diagnostic::{diagnostic_status, next_probe, DiagnosticStatus};

pub use schedule::{
    accepts_submission, is_review_complete, plan_quiz, quiz_state, review_candidates, QuizPlan,
    QuizState,
};
