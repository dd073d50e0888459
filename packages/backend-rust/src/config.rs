use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use noobular_algo::EngineConfig;

use crate::db::sqlite_primary::default_sqlite_db_path;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub database_path: PathBuf,
    pub courses_dir: PathBuf,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let database_path = std::env::var("DATABASE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_sqlite_db_path);

        let courses_dir = std::env::var("COURSES_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./courses"));

        Self {
            host,
            port,
            log_level,
            database_path,
            courses_dir,
            engine: engine_config_from(|key| std::env::var(key).ok()),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable engine setting");
            None
        }
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Starts from the default (or, with `APP_DEBUG`, the debug) preset and
/// applies per-threshold overrides.
pub fn engine_config_from(lookup: impl Fn(&str) -> Option<String>) -> EngineConfig {
    let mut engine = if flag(&lookup, "APP_DEBUG") {
        EngineConfig::debug()
    } else {
        EngineConfig::default()
    };

    let overrides: [(&str, &mut u32); 8] = [
        ("CORRECT_COUNT_THRESHOLD", &mut engine.correct_count_threshold),
        ("INCORRECT_COUNT_FAIL_THRESHOLD", &mut engine.incorrect_count_fail_threshold),
        ("QUIZ_KP_THRESHOLD", &mut engine.quiz_kp_threshold),
        ("QUIZ_QUESTION_COUNT", &mut engine.quiz_question_count),
        ("QUIZ_TIME_LIMIT_MINUTES", &mut engine.quiz_time_limit_minutes),
        ("QUIZ_GRACE_SECONDS", &mut engine.quiz_grace_seconds),
        ("REVIEW_KP_THRESHOLD", &mut engine.review_kp_threshold),
        ("REVIEW_CORRECT_COUNT_THRESHOLD", &mut engine.review_correct_count_threshold),
    ];
    for (key, slot) in overrides {
        if let Some(value) = parse_var(&lookup, key) {
            *slot = value;
        }
    }

    if let Some(ratio) = parse_var::<f64>(&lookup, "INCORRECT_RATIO_FAIL_THRESHOLD") {
        engine.incorrect_ratio_fail_threshold = Some(ratio);
    }

    engine
}
