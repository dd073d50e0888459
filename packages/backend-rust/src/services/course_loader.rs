//! Course loading
//!
//! Course files are JSON documents deserialized into [`CourseDefinition`].
//! A file is identified by the SHA-256 of its bytes; a hash that is already
//! stored means the course was loaded before and the file is skipped.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use noobular_algo::{validate_course, CourseDefinition, CourseError, CourseId};

use crate::db::operations::courses;
use crate::db::Database;

#[derive(Debug, Error)]
pub enum CourseLoadError {
    #[error("failed to read course file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed course file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid course: {0}")]
    Invalid(#[from] CourseError),
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(CourseId),
    AlreadyLoaded,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
    pub invalid: usize,
}

pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Parses, validates and stores one course in its own transaction.
pub async fn load_course_bytes(
    db: &Database,
    bytes: &[u8],
    now_ms: i64,
) -> Result<LoadOutcome, CourseLoadError> {
    let hash = content_hash(bytes);
    let mut uow = db.begin().await?;
    if courses::course_hash_exists(uow.conn(), &hash).await? {
        return Ok(LoadOutcome::AlreadyLoaded);
    }

    let definition = CourseDefinition::from_json_slice(bytes)?;
    validate_course(&definition)?;

    let course_id = courses::insert_course(uow.conn(), &definition, &hash, now_ms).await?;
    uow.commit().await?;
    Ok(LoadOutcome::Loaded(course_id))
}

fn course_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Loads every `*.json` file in `dir`. A bad file is logged and skipped so
/// one broken course never keeps the others from loading.
pub async fn load_courses_dir(db: &Database, dir: &Path, now_ms: i64) -> LoadReport {
    let mut report = LoadReport::default();

    let files = match course_files(dir) {
        Ok(files) => files,
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "courses directory not readable");
            return report;
        }
    };

    for path in files {
        let result = match tokio::fs::read(&path).await {
            Ok(bytes) => load_course_bytes(db, &bytes, now_ms).await,
            Err(err) => Err(CourseLoadError::Io(err)),
        };
        match result {
            Ok(LoadOutcome::Loaded(course_id)) => {
                report.loaded += 1;
                tracing::info!(path = %path.display(), course_id, "course loaded");
            }
            Ok(LoadOutcome::AlreadyLoaded) => {
                report.skipped += 1;
                tracing::debug!(path = %path.display(), "course unchanged, skipping");
            }
            Err(err) => {
                report.invalid += 1;
                tracing::warn!(path = %path.display(), error = %err, "course rejected");
            }
        }
    }

    report
}
