pub const SQLITE_SCHEMA_SQL: &str = include_str!("../../sql/sqlite_schema.sql");

pub const SCHEMA_VERSION: &str = "1.0.0";

pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for line in sql.lines() {
        if !in_single_quote && !in_double_quote && line.trim_start().starts_with("--") {
            continue;
        }
        for ch in line.chars() {
            match ch {
                '\'' if !in_double_quote => in_single_quote = !in_single_quote,
                '"' if !in_single_quote => in_double_quote = !in_double_quote,
                ';' if !in_single_quote && !in_double_quote => {
                    let stmt = current.trim();
                    if !stmt.is_empty() {
                        statements.push(stmt.to_string());
                    }
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        current.push('\n');
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_skips_comments_and_keeps_quoted_semicolons() {
        let sql = "-- header; not a statement\nCREATE TABLE a (x TEXT DEFAULT ';');\n\nINSERT INTO a VALUES ('b');";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE TABLE a"));
        assert!(statements[0].contains("';'"));
        assert_eq!(statements[1], "INSERT INTO a VALUES ('b')");
    }

    #[test]
    fn test_embedded_schema_splits() {
        let statements = split_sql_statements(SQLITE_SCHEMA_SQL);
        assert!(statements.iter().any(|s| s.contains(r#""question_pools""#)));
        assert!(statements.iter().all(|s| !s.trim_start().starts_with("--")));
    }
}
