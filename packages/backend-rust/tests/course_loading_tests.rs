use noobular_backend::db::operations::courses::{list_courses, load_course};
use noobular_backend::db::Database;
use noobular_backend::services::course_loader::{
    load_course_bytes, load_courses_dir, CourseLoadError, LoadOutcome,
};
use noobular_algo::CourseError;
use tempfile::TempDir;

mod common;

async fn empty_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("load.db")).await.unwrap();
    (dir, db)
}

#[tokio::test]
async fn test_same_file_loads_once() {
    let (_dir, db) = empty_db().await;
    let bytes = common::course_json("Once");

    let first = load_course_bytes(&db, &bytes, 1).await.unwrap();
    assert!(matches!(first, LoadOutcome::Loaded(_)));
    let second = load_course_bytes(&db, &bytes, 2).await.unwrap();
    assert_eq!(second, LoadOutcome::AlreadyLoaded);

    let mut uow = db.begin().await.unwrap();
    let courses = list_courses(uow.conn()).await.unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].title, "Once");
    assert_eq!(courses[0].lesson_count, 2);
}

#[tokio::test]
async fn test_stored_course_keeps_authored_order_and_edges() {
    let (_dir, db) = empty_db().await;
    let LoadOutcome::Loaded(id) = load_course_bytes(&db, &common::course_json("Order"), 1)
        .await
        .unwrap()
    else {
        panic!("course not loaded");
    };

    let mut uow = db.begin().await.unwrap();
    let course = load_course(uow.conn(), id).await.unwrap().unwrap();
    let names: Vec<_> = course.knowledge_points().map(|kp| kp.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C", "D"]);

    let kp = |name: &str| course.knowledge_points().find(|kp| kp.name == name).unwrap();
    assert_eq!(kp("B").prerequisites, vec![kp("A").id]);
    assert_eq!(kp("C").prerequisites, vec![kp("B").id]);
    assert!(kp("D").prerequisites.is_empty());

    let a = kp("A");
    assert_eq!(a.contents, vec!["A content".to_string()]);
    assert_eq!(a.questions.len(), common::QUESTIONS_PER_KP);
    assert_eq!(a.questions[0].prompt, "A question 0");
    assert_eq!(a.questions[0].choices.len(), 2);
    assert!(a.questions[0].choices[0].correct);

    assert!(load_course(uow.conn(), id + 100).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cyclic_course_is_rejected() {
    let (_dir, db) = empty_db().await;
    let text = String::from_utf8(common::course_json("Cycle")).unwrap();
    // A now also depends on C, closing A -> B -> C -> A
    let cyclic = text.replacen(r#""prerequisites":[]"#, r#""prerequisites":["C"]"#, 1);
    assert_ne!(cyclic, text);

    let err = load_course_bytes(&db, cyclic.as_bytes(), 1).await.unwrap_err();
    assert!(matches!(err, CourseLoadError::Invalid(CourseError::Graph(_))));
}

#[tokio::test]
async fn test_directory_scan_skips_bad_and_duplicate_files() {
    let (_dir, db) = empty_db().await;
    let courses = TempDir::new().unwrap();
    let bytes = common::course_json("Scan");
    std::fs::write(courses.path().join("a_course.json"), &bytes).unwrap();
    std::fs::write(courses.path().join("b_copy.json"), &bytes).unwrap();
    std::fs::write(courses.path().join("c_broken.json"), b"{ not json").unwrap();
    std::fs::write(courses.path().join("notes.txt"), b"ignored").unwrap();

    let report = load_courses_dir(&db, courses.path(), 1).await;
    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.invalid, 1);

    let rescan = load_courses_dir(&db, courses.path(), 2).await;
    assert_eq!(rescan.loaded, 0);
    assert_eq!(rescan.skipped, 2);
}

#[tokio::test]
async fn test_missing_directory_loads_nothing() {
    let (dir, db) = empty_db().await;
    let report = load_courses_dir(&db, &dir.path().join("absent"), 1).await;
    assert_eq!(report.loaded + report.skipped + report.invalid, 0);
}
