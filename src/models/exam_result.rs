// src/models/exam_result.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exam_results' table in the database.
/// One row per (user, course, exam type); a retake overwrites the row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub user_id: i64,
    pub course_id: String,

    /// 'midterm' or 'final'.
    pub exam_type: String,

    pub score_percent: f64,

    /// 'passed' or 'failed'.
    pub status: String,

    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Persisted status label for a result.
pub fn status_label(passed: bool) -> &'static str {
    if passed { "passed" } else { "failed" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(status_label(true), "passed");
        assert_eq!(status_label(false), "failed");
    }
}
