use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqliteConnection;
use tokio::sync::RwLock;

use noobular_algo::{Course, CourseId, PrerequisiteGraph};

use crate::db::operations::courses;

/// A course tree with its prerequisite adjacency lists, built once.
#[derive(Debug)]
pub struct LoadedCourse {
    pub course: Course,
    pub graph: PrerequisiteGraph,
}

impl LoadedCourse {
    pub fn new(course: Course) -> Self {
        let graph = PrerequisiteGraph::from_course(&course);
        Self { course, graph }
    }
}

/// Courses are immutable once stored, so cached entries never go stale.
#[derive(Debug, Default)]
pub struct CourseCatalog {
    courses: RwLock<HashMap<CourseId, Arc<LoadedCourse>>>,
}

impl CourseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &self,
        conn: &mut SqliteConnection,
        course_id: CourseId,
    ) -> Result<Option<Arc<LoadedCourse>>, sqlx::Error> {
        if let Some(found) = self.courses.read().await.get(&course_id) {
            return Ok(Some(Arc::clone(found)));
        }

        let Some(course) = courses::load_course(conn, course_id).await? else {
            return Ok(None);
        };
        let loaded = Arc::new(LoadedCourse::new(course));
        self.courses
            .write()
            .await
            .entry(course_id)
            .or_insert_with(|| Arc::clone(&loaded));
        tracing::debug!(course_id, "course cached");
        Ok(Some(loaded))
    }
}
