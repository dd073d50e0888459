//! Property-Based Tests for the embedded schema splitter
//!
//! Invariants:
//! - Plain statements joined with `;` split back into the same statements
//! - Semicolons inside quoted literals never split a statement
//! - `--` comment lines never reach the output

use proptest::prelude::*;

use noobular_backend::db::sqlite_schema::split_sql_statements;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_statement() -> impl Strategy<Value = String> {
    "[A-Z][A-Za-z0-9_ ()=,]{0,40}".prop_map(|s| s.trim().to_string())
}

fn arb_literal() -> impl Strategy<Value = String> {
    "[a-z;]{0,10}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn joined_statements_split_back(statements in prop::collection::vec(arb_statement(), 1..12)) {
        let expected: Vec<String> = statements.into_iter().filter(|s| !s.is_empty()).collect();
        let sql = expected.join(";\n");
        prop_assert_eq!(split_sql_statements(&sql), expected);
    }

    #[test]
    fn quoted_semicolons_stay_inside(literal in arb_literal(), quote in prop_oneof![Just('\''), Just('"')]) {
        let sql = format!("INSERT INTO t VALUES ({quote}{literal}{quote});\nSELECT 1;");
        let statements = split_sql_statements(&sql);
        prop_assert_eq!(statements.len(), 2);
        let expected_literal = format!("{quote}{literal}{quote}");
        prop_assert!(statements[0].contains(&expected_literal));
    }

    #[test]
    fn comment_lines_are_dropped(statements in prop::collection::vec(arb_statement(), 1..6)) {
        let sql: String = statements
            .iter()
            .map(|s| format!("-- about {s}; really\n{s};\n"))
            .collect();
        for stmt in split_sql_statements(&sql) {
            prop_assert!(!stmt.contains("--"));
        }
    }
}
