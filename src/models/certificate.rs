// src/models/certificate.rs

use chrono::{DateTime, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'certificates' table in the database.
/// Issued once on a qualifying final-exam pass and never mutated afterwards;
/// verification reads it back by id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub student_id: i64,
    pub student_name: String,
    pub course_id: String,
    pub course_name: String,

    /// Human-readable completion date, e.g. "6 August 2026".
    pub date_completed: String,

    pub issued_at: chrono::DateTime<chrono::Utc>,

    /// Always true at issuance; there is no revocation path in this flow.
    pub is_valid: bool,
}

impl Certificate {
    pub fn issue(
        student_id: i64,
        student_name: &str,
        course_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Certificate {
            id: generate_certificate_id(student_id),
            student_id,
            student_name: student_name.to_string(),
            course_id: course_id.to_string(),
            course_name: course_display_name(course_id),
            date_completed: format_completion_date(completed_at),
            issued_at: completed_at,
            is_valid: true,
        }
    }
}

/// Certificate ids are "CERT-" + the student id + a random alphanumeric
/// suffix, uppercased. Uniqueness is probabilistic; the id is the table's
/// primary key, so a collision surfaces as an insert error upstream.
pub fn generate_certificate_id(student_id: i64) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();

    format!("CERT-{}-{}", student_id, suffix).to_uppercase()
}

/// Course ids use '-' or '_' as word separators; the printable course name
/// replaces them with spaces.
pub fn course_display_name(course_id: &str) -> String {
    course_id.replace(['-', '_'], " ")
}

/// Day, long month name, year.
fn format_completion_date(completed_at: DateTime<Utc>) -> String {
    completed_at.format("%-d %B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn certificate_id_format() {
        let id = generate_certificate_id(42);
        assert!(id.starts_with("CERT-42-"));
        assert_eq!(id, id.to_uppercase());
        assert_eq!(id.len(), "CERT-42-".len() + 6);
    }

    #[test]
    fn certificate_ids_differ_between_calls() {
        assert_ne!(generate_certificate_id(1), generate_certificate_id(1));
    }

    #[test]
    fn course_name_replaces_separators() {
        assert_eq!(course_display_name("web-development"), "web development");
        assert_eq!(course_display_name("graphic_design"), "graphic design");
        assert_eq!(course_display_name("marketing"), "marketing");
    }

    #[test]
    fn completion_date_is_day_month_year() {
        let date = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        assert_eq!(format_completion_date(date), "6 August 2026");
    }

    #[test]
    fn issued_certificate_carries_derived_fields() {
        let date = Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap();
        let cert = Certificate::issue(7, "Ada Lovelace", "web-development", date);
        assert_eq!(cert.student_id, 7);
        assert_eq!(cert.student_name, "Ada Lovelace");
        assert_eq!(cert.course_name, "web development");
        assert_eq!(cert.date_completed, "15 January 2026");
        assert!(cert.is_valid);
        assert!(cert.id.starts_with("CERT-7-"));
    }
}
