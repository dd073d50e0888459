//! Course Validation
//!
//! Authoring-time checks run once when a course is loaded. Any failure is
//! fatal to loading that course and names the offending lesson, knowledge
//! point or question.

use thiserror::Error;

use crate::graph::{validate_prerequisite_graph, GraphError};
use crate::types::{
    CourseDefinition, MAX_COURSE_KNOWLEDGE_POINTS, MIN_CHOICES_PER_QUESTION,
    MIN_QUESTIONS_PER_KNOWLEDGE_POINT,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CourseError {
    #[error("course title must be a non-empty string")]
    MissingTitle,
    #[error("course has no lessons")]
    NoLessons,
    #[error("lesson {lesson} title must be a non-empty string")]
    MissingLessonTitle { lesson: usize },
    #[error("lesson {lesson} ('{title}') has no knowledge points")]
    EmptyLesson { lesson: usize, title: String },
    #[error("knowledge point '{knowledge_point}' must have at least {min} questions, found {found}")]
    TooFewQuestions {
        knowledge_point: String,
        min: usize,
        found: usize,
    },
    #[error("knowledge point '{knowledge_point}', question {question} must have at least {min} choices")]
    TooFewChoices {
        knowledge_point: String,
        question: usize,
        min: usize,
    },
    #[error("knowledge point '{knowledge_point}', question {question} has {found} correct answers, expected exactly 1")]
    CorrectChoiceCount {
        knowledge_point: String,
        question: usize,
        found: usize,
    },
    #[error("too many knowledge points: max {max}, observed {found}")]
    TooManyKnowledgePoints { max: usize, found: usize },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Validates an authored course: structure and question shape first, then
/// the prerequisite graph.
pub fn validate_course(course: &CourseDefinition) -> Result<(), CourseError> {
    if course.title.trim().is_empty() {
        return Err(CourseError::MissingTitle);
    }
    if course.lessons.is_empty() {
        return Err(CourseError::NoLessons);
    }

    for (lesson_idx, lesson) in course.lessons.iter().enumerate() {
        if lesson.title.trim().is_empty() {
            return Err(CourseError::MissingLessonTitle { lesson: lesson_idx });
        }
        if lesson.knowledge_points.is_empty() {
            return Err(CourseError::EmptyLesson {
                lesson: lesson_idx,
                title: lesson.title.clone(),
            });
        }

        for kp in &lesson.knowledge_points {
            if kp.questions.len() < MIN_QUESTIONS_PER_KNOWLEDGE_POINT {
                return Err(CourseError::TooFewQuestions {
                    knowledge_point: kp.name.clone(),
                    min: MIN_QUESTIONS_PER_KNOWLEDGE_POINT,
                    found: kp.questions.len(),
                });
            }

            for (q_idx, question) in kp.questions.iter().enumerate() {
                if question.choices.len() < MIN_CHOICES_PER_QUESTION {
                    return Err(CourseError::TooFewChoices {
                        knowledge_point: kp.name.clone(),
                        question: q_idx,
                        min: MIN_CHOICES_PER_QUESTION,
                    });
                }
                let correct = question.choices.iter().filter(|c| c.correct).count();
                if correct != 1 {
                    return Err(CourseError::CorrectChoiceCount {
                        knowledge_point: kp.name.clone(),
                        question: q_idx,
                        found: correct,
                    });
                }
            }
        }
    }

    let kp_count = course.knowledge_points().count();
    if kp_count > MAX_COURSE_KNOWLEDGE_POINTS {
        return Err(CourseError::TooManyKnowledgePoints {
            max: MAX_COURSE_KNOWLEDGE_POINTS,
            found: kp_count,
        });
    }

    validate_prerequisite_graph(
        course
            .knowledge_points()
            .map(|kp| (kp.name.as_str(), kp.prerequisites.as_slice())),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ChoiceDefinition, KnowledgePointDefinition, LessonDefinition, QuestionDefinition,
    };

    fn question(correct: usize, total: usize) -> QuestionDefinition {
        QuestionDefinition {
            prompt: "prompt".to_string(),
            explanation: "because".to_string(),
            choices: (0..total)
                .map(|i| ChoiceDefinition { text: format!("choice {i}"), correct: i < correct })
                .collect(),
        }
    }

    fn kp(name: &str, prerequisites: &[&str]) -> KnowledgePointDefinition {
        KnowledgePointDefinition {
            name: name.to_string(),
            description: format!("{name} description"),
            prerequisites: prerequisites.iter().map(|s| s.to_string()).collect(),
            contents: vec!["content".to_string()],
            questions: vec![question(1, 3), question(1, 2)],
        }
    }

    fn course(kps: Vec<KnowledgePointDefinition>) -> CourseDefinition {
        CourseDefinition {
            title: "Course".to_string(),
            lessons: vec![LessonDefinition { title: "Lesson".to_string(), knowledge_points: kps }],
        }
    }

    #[test]
    fn test_valid_course() {
        let c = course(vec![kp("a", &[]), kp("b", &["a"])]);
        assert_eq!(validate_course(&c), Ok(()));
    }

    #[test]
    fn test_blank_title() {
        let mut c = course(vec![kp("a", &[])]);
        c.title = "   ".to_string();
        assert_eq!(validate_course(&c), Err(CourseError::MissingTitle));
    }

    #[test]
    fn test_too_few_questions() {
        let mut a = kp("a", &[]);
        a.questions.truncate(1);
        assert!(matches!(
            validate_course(&course(vec![a])),
            Err(CourseError::TooFewQuestions { found: 1, .. })
        ));
    }

    #[test]
    fn test_wrong_correct_count() {
        let mut a = kp("a", &[]);
        a.questions[1] = question(2, 3);
        assert_eq!(
            validate_course(&course(vec![a])),
            Err(CourseError::CorrectChoiceCount {
                knowledge_point: "a".to_string(),
                question: 1,
                found: 2,
            })
        );
    }

    #[test]
    fn test_too_few_choices() {
        let mut a = kp("a", &[]);
        a.questions[0] = question(1, 1);
        assert!(matches!(
            validate_course(&course(vec![a])),
            Err(CourseError::TooFewChoices { question: 0, .. })
        ));
    }

    #[test]
    fn test_empty_lesson() {
        let c = course(vec![]);
        assert!(matches!(validate_course(&c), Err(CourseError::EmptyLesson { lesson: 0, .. })));
    }

    #[test]
    fn test_graph_errors_are_reported() {
        let c = course(vec![kp("a", &[]), kp("b", &["c"]), kp("c", &["b"])]);
        assert!(matches!(
            validate_course(&c),
            Err(CourseError::Graph(GraphError::Unreachable { .. }))
        ));
    }
}
