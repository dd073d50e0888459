//! Benchmark suite for noobular-algo
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use noobular_algo::types::{
    ChoiceDefinition, CourseDefinition, KnowledgePointDefinition, LessonDefinition,
    QuestionDefinition,
};
use noobular_algo::validate_course;

/// 50 lessons of 20 KPs; every KP depends on the two KPs before it.
fn large_course() -> CourseDefinition {
    let question = |i: usize| QuestionDefinition {
        prompt: format!("question {i}"),
        explanation: String::new(),
        choices: vec![
            ChoiceDefinition { text: "a".to_string(), correct: true },
            ChoiceDefinition { text: "b".to_string(), correct: false },
        ],
    };
    let lessons = (0..50)
        .map(|l| LessonDefinition {
            title: format!("lesson {l}"),
            knowledge_points: (0..20)
                .map(|k| {
                    let n = l * 20 + k;
                    KnowledgePointDefinition {
                        name: format!("kp{n}"),
                        description: String::new(),
                        prerequisites: (n.saturating_sub(2)..n).map(|p| format!("kp{p}")).collect(),
                        contents: vec![],
                        questions: (0..10).map(question).collect(),
                    }
                })
                .collect(),
        })
        .collect();
    CourseDefinition { title: "bench".to_string(), lessons }
}

fn bench_validate_course(c: &mut Criterion) {
    let course = large_course();
    c.bench_function("validate_course/1000_kps", |b| {
        b.iter(|| validate_course(black_box(&course)))
    });
}

criterion_group!(benches, bench_validate_course);
criterion_main!(benches);
