// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Time budget for one exam attempt, in seconds.
pub const EXAM_TIME_LIMIT_SECS: i64 = 1800;

/// Minimum score percentage to pass an exam.
pub const PASSING_SCORE_PERCENTAGE: f64 = 50.0;

/// Minimum score percentage on the final exam to earn a certificate.
pub const CERTIFICATE_SCORE_PERCENTAGE: f64 = 70.0;

/// Course week that triggers the midterm exam.
pub const MIDTERM_WEEK: i32 = 12;

/// Course week that triggers the final exam.
pub const FINAL_WEEK: i32 = 24;

/// Course used when a session is started without an explicit course id.
pub const DEFAULT_COURSE_ID: &str = "web-development";

/// Number of discussion replies that marks a course week as completed.
pub const WEEK_COMPLETION_REPLY_THRESHOLD: i64 = 2;

/// How long a submitted session is kept around for the result view,
/// counted from its deadline.
pub const SESSION_RETENTION_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let admin_username = env::var("ADMIN_USERNAME").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username,
            admin_password,
        }
    }
}
