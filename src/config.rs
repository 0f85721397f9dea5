// src/config.rs

use std::{env, path::PathBuf};
use dotenvy::dotenv;

/// Tokens stay valid for 30 days by default; a learner identity is anonymous
/// and cheap to reissue.
const DEFAULT_JWT_EXPIRATION: u64 = 60 * 60 * 24 * 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// Directory of `*.json` course definitions.
    pub courses_dir: PathBuf,
    pub bind_addr: String,
    /// Enables per-IP rate limiting when set.
    pub rate_limit_per_second: Option<u64>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://learnpath.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_JWT_EXPIRATION);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let courses_dir = env::var("COURSES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("courses"));

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let rate_limit_per_second = env::var("RATE_LIMIT_PER_SECOND")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0);

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            courses_dir,
            bind_addr,
            rate_limit_per_second,
        }
    }
}
