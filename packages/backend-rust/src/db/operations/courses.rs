use std::collections::HashMap;

use serde::Serialize;
use sqlx::{Row, SqliteConnection};

use noobular_algo::types::{Choice, Course, CourseDefinition, KnowledgePoint, Lesson, Question};
use noobular_algo::{CourseId, KpId, QuestionId};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: CourseId,
    pub title: String,
    pub lesson_count: i64,
}

pub async fn course_hash_exists(
    conn: &mut SqliteConnection,
    content_hash: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i64> =
        sqlx::query_scalar(r#"SELECT "id" FROM "courses" WHERE "content_hash" = ?"#)
            .bind(content_hash)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(found.is_some())
}

/// Writes a validated course definition. Prerequisite names are resolved to
/// KP ids after all KPs of the course exist, so forward references work.
pub async fn insert_course(
    conn: &mut SqliteConnection,
    definition: &CourseDefinition,
    content_hash: &str,
    now_ms: i64,
) -> Result<CourseId, sqlx::Error> {
    let course_id = sqlx::query(
        r#"INSERT INTO "courses" ("title", "content_hash", "created_at") VALUES (?, ?, ?)"#,
    )
    .bind(&definition.title)
    .bind(content_hash)
    .bind(now_ms)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let mut kp_ids: HashMap<&str, KpId> = HashMap::new();

    for (lesson_pos, lesson) in definition.lessons.iter().enumerate() {
        let lesson_id = sqlx::query(
            r#"INSERT INTO "lessons" ("course_id", "position", "title") VALUES (?, ?, ?)"#,
        )
        .bind(course_id)
        .bind(lesson_pos as i64)
        .bind(&lesson.title)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        for (kp_pos, kp) in lesson.knowledge_points.iter().enumerate() {
            let kp_id = sqlx::query(
                r#"INSERT INTO "knowledge_points" ("lesson_id", "position", "name", "description")
                   VALUES (?, ?, ?, ?)"#,
            )
            .bind(lesson_id)
            .bind(kp_pos as i64)
            .bind(&kp.name)
            .bind(&kp.description)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
            kp_ids.insert(kp.name.as_str(), kp_id);

            for (pos, text) in kp.contents.iter().enumerate() {
                sqlx::query(
                    r#"INSERT INTO "contents" ("knowledge_point_id", "position", "text") VALUES (?, ?, ?)"#,
                )
                .bind(kp_id)
                .bind(pos as i64)
                .bind(text)
                .execute(&mut *conn)
                .await?;
            }

            for (q_pos, question) in kp.questions.iter().enumerate() {
                let question_id = sqlx::query(
                    r#"INSERT INTO "questions" ("knowledge_point_id", "position", "prompt", "explanation")
                       VALUES (?, ?, ?, ?)"#,
                )
                .bind(kp_id)
                .bind(q_pos as i64)
                .bind(&question.prompt)
                .bind(&question.explanation)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();

                for (c_pos, choice) in question.choices.iter().enumerate() {
                    sqlx::query(
                        r#"INSERT INTO "choices" ("question_id", "position", "text", "is_correct")
                           VALUES (?, ?, ?, ?)"#,
                    )
                    .bind(question_id)
                    .bind(c_pos as i64)
                    .bind(&choice.text)
                    .bind(choice.correct)
                    .execute(&mut *conn)
                    .await?;
                }
            }
        }
    }

    for kp in definition.knowledge_points() {
        let Some(&kp_id) = kp_ids.get(kp.name.as_str()) else {
            continue;
        };
        for prereq in &kp.prerequisites {
            if let Some(&prereq_id) = kp_ids.get(prereq.as_str()) {
                sqlx::query(
                    r#"INSERT OR IGNORE INTO "prerequisites" ("knowledge_point_id", "prerequisite_id")
                       VALUES (?, ?)"#,
                )
                .bind(kp_id)
                .bind(prereq_id)
                .execute(&mut *conn)
                .await?;
            }
        }
    }

    Ok(course_id)
}

pub async fn list_courses(conn: &mut SqliteConnection) -> Result<Vec<CourseSummary>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT c."id", c."title", COUNT(l."id") AS "lesson_count"
        FROM "courses" c
        LEFT JOIN "lessons" l ON l."course_id" = c."id"
        GROUP BY c."id"
        ORDER BY c."id"
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(CourseSummary {
                id: row.try_get("id")?,
                title: row.try_get("title")?,
                lesson_count: row.try_get("lesson_count")?,
            })
        })
        .collect()
}

/// Reads the full course tree in authored order.
pub async fn load_course(
    conn: &mut SqliteConnection,
    course_id: CourseId,
) -> Result<Option<Course>, sqlx::Error> {
    let Some(title) = sqlx::query_scalar::<_, String>(r#"SELECT "title" FROM "courses" WHERE "id" = ?"#)
        .bind(course_id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let mut choices: HashMap<QuestionId, Vec<Choice>> = HashMap::new();
    let rows = sqlx::query(
        r#"
        SELECT ch."id", ch."question_id", ch."text", ch."is_correct"
        FROM "choices" ch
        JOIN "questions" q ON q."id" = ch."question_id"
        JOIN "knowledge_points" kp ON kp."id" = q."knowledge_point_id"
        JOIN "lessons" l ON l."id" = kp."lesson_id"
        WHERE l."course_id" = ?
        ORDER BY ch."question_id", ch."position"
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        choices
            .entry(row.try_get("question_id")?)
            .or_default()
            .push(Choice {
                id: row.try_get("id")?,
                text: row.try_get("text")?,
                correct: row.try_get("is_correct")?,
            });
    }

    let mut questions: HashMap<KpId, Vec<Question>> = HashMap::new();
    let rows = sqlx::query(
        r#"
        SELECT q."id", q."knowledge_point_id", q."prompt", q."explanation"
        FROM "questions" q
        JOIN "knowledge_points" kp ON kp."id" = q."knowledge_point_id"
        JOIN "lessons" l ON l."id" = kp."lesson_id"
        WHERE l."course_id" = ?
        ORDER BY q."knowledge_point_id", q."position"
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        let id: QuestionId = row.try_get("id")?;
        let kp_id: KpId = row.try_get("knowledge_point_id")?;
        questions.entry(kp_id).or_default().push(Question {
            id,
            knowledge_point_id: kp_id,
            prompt: row.try_get("prompt")?,
            explanation: row.try_get("explanation")?,
            choices: choices.remove(&id).unwrap_or_default(),
        });
    }

    let mut contents: HashMap<KpId, Vec<String>> = HashMap::new();
    let rows = sqlx::query(
        r#"
        SELECT c."knowledge_point_id", c."text"
        FROM "contents" c
        JOIN "knowledge_points" kp ON kp."id" = c."knowledge_point_id"
        JOIN "lessons" l ON l."id" = kp."lesson_id"
        WHERE l."course_id" = ?
        ORDER BY c."knowledge_point_id", c."position"
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        contents
            .entry(row.try_get("knowledge_point_id")?)
            .or_default()
            .push(row.try_get("text")?);
    }

    let mut prerequisites: HashMap<KpId, Vec<KpId>> = HashMap::new();
    let rows = sqlx::query(
        r#"
        SELECT p."knowledge_point_id", p."prerequisite_id"
        FROM "prerequisites" p
        JOIN "knowledge_points" kp ON kp."id" = p."knowledge_point_id"
        JOIN "lessons" l ON l."id" = kp."lesson_id"
        WHERE l."course_id" = ?
        ORDER BY p."knowledge_point_id", p."prerequisite_id"
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        prerequisites
            .entry(row.try_get("knowledge_point_id")?)
            .or_default()
            .push(row.try_get("prerequisite_id")?);
    }

    let mut knowledge_points: HashMap<i64, Vec<KnowledgePoint>> = HashMap::new();
    let rows = sqlx::query(
        r#"
        SELECT kp."id", kp."lesson_id", kp."name", kp."description"
        FROM "knowledge_points" kp
        JOIN "lessons" l ON l."id" = kp."lesson_id"
        WHERE l."course_id" = ?
        ORDER BY kp."lesson_id", kp."position"
        "#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        let id: KpId = row.try_get("id")?;
        knowledge_points
            .entry(row.try_get("lesson_id")?)
            .or_default()
            .push(KnowledgePoint {
                id,
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                prerequisites: prerequisites.remove(&id).unwrap_or_default(),
                contents: contents.remove(&id).unwrap_or_default(),
                questions: questions.remove(&id).unwrap_or_default(),
            });
    }

    let rows = sqlx::query(
        r#"SELECT "id", "title" FROM "lessons" WHERE "course_id" = ? ORDER BY "position""#,
    )
    .bind(course_id)
    .fetch_all(&mut *conn)
    .await?;
    let mut lessons = Vec::with_capacity(rows.len());
    for row in rows {
        let id: i64 = row.try_get("id")?;
        lessons.push(Lesson {
            id,
            title: row.try_get("title")?,
            knowledge_points: knowledge_points.remove(&id).unwrap_or_default(),
        });
    }

    Ok(Some(Course {
        id: course_id,
        title,
        lessons,
    }))
}
