#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use noobular_algo::{ChoiceId, CourseId, EngineConfig, KpId, QuestionId};
use noobular_backend::db::operations::users::find_or_create_user;
use noobular_backend::db::{Database, UnitOfWork};
use noobular_backend::services::catalog::CourseCatalog;
use noobular_backend::services::course_loader::{load_course_bytes, LoadOutcome};
use noobular_backend::services::LearnerContext;

pub const QUESTIONS_PER_KP: usize = 6;

/// Two lessons over four KPs: A -> B -> C, plus a standalone root D.
/// Leaves are C and D.
pub fn course_json(title: &str) -> Vec<u8> {
    let kp = |name: &str, prerequisites: &[&str]| {
        let questions: Vec<_> = (0..QUESTIONS_PER_KP)
            .map(|i| {
                json!({
                    "prompt": format!("{name} question {i}"),
                    "explanation": format!("{name} explanation {i}"),
                    "choices": [
                        { "text": format!("{name} right {i}"), "correct": true },
                        { "text": format!("{name} wrong {i}") }
                    ]
                })
            })
            .collect();
        json!({
            "name": name,
            "description": format!("about {name}"),
            "prerequisites": prerequisites,
            "contents": [format!("{name} content")],
            "questions": questions
        })
    };

    let course = json!({
        "title": title,
        "lessons": [
            { "title": "Basics", "knowledge_points": [kp("A", &[]), kp("B", &["A"])] },
            { "title": "Advanced", "knowledge_points": [kp("C", &["B"]), kp("D", &[])] }
        ]
    });
    serde_json::to_vec(&course).unwrap()
}

/// Quizzes after two completed KPs, reviews after two later completions.
pub fn test_engine() -> EngineConfig {
    EngineConfig {
        quiz_kp_threshold: 2,
        quiz_question_count: 2,
        review_kp_threshold: 2,
        ..EngineConfig::default()
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub struct TestEnv {
    _dir: TempDir,
    pub db: Database,
    pub catalog: CourseCatalog,
    pub engine: Arc<EngineConfig>,
    pub course_id: CourseId,
}

pub async fn setup() -> TestEnv {
    setup_with(test_engine()).await
}

pub async fn setup_with(engine: EngineConfig) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("test.db")).await.unwrap();
    let course_id = match load_course_bytes(&db, &course_json("Test Course"), 0).await.unwrap() {
        LoadOutcome::Loaded(id) => id,
        LoadOutcome::AlreadyLoaded => panic!("fresh database already had the course"),
    };
    TestEnv {
        _dir: dir,
        db,
        catalog: CourseCatalog::new(),
        engine: Arc::new(engine),
        course_id,
    }
}

impl TestEnv {
    pub async fn learner(
        &self,
        uow: &mut UnitOfWork,
        username: &str,
        now: DateTime<Utc>,
    ) -> LearnerContext {
        let user_id = find_or_create_user(uow.conn(), username, now.timestamp_millis())
            .await
            .unwrap();
        let course = self.catalog.get(uow.conn(), self.course_id).await.unwrap().unwrap();
        LearnerContext {
            user_id,
            course,
            config: Arc::clone(&self.engine),
            now,
        }
    }
}

pub fn at(ctx: &LearnerContext, now: DateTime<Utc>) -> LearnerContext {
    LearnerContext { now, ..ctx.clone() }
}

pub fn later(ctx: &LearnerContext, seconds: i64) -> LearnerContext {
    at(ctx, ctx.now + Duration::seconds(seconds))
}

pub fn kp_id(ctx: &LearnerContext, name: &str) -> KpId {
    ctx.course()
        .knowledge_points()
        .find(|kp| kp.name == name)
        .map(|kp| kp.id)
        .unwrap()
}

pub fn lesson_id(ctx: &LearnerContext, title: &str) -> i64 {
    ctx.course().lessons.iter().find(|l| l.title == title).map(|l| l.id).unwrap()
}

pub fn kp_of(ctx: &LearnerContext, question_id: QuestionId) -> KpId {
    ctx.course().question(question_id).unwrap().knowledge_point_id
}

pub fn right(ctx: &LearnerContext, question_id: QuestionId) -> ChoiceId {
    ctx.course().question(question_id).unwrap().correct_choice().unwrap().id
}

pub fn wrong(ctx: &LearnerContext, question_id: QuestionId) -> ChoiceId {
    ctx.course()
        .question(question_id)
        .unwrap()
        .choices
        .iter()
        .find(|c| !c.correct)
        .unwrap()
        .id
}
