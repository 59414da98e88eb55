// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::session::{ChoiceSnapshot, QuestionSnapshot};

/// One answer choice of a question.
/// `is_correct` never leaves the server; see `PublicQuestion`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionChoice {
    pub text: String,
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Course this question belongs to.
    pub course_id: String,

    /// Course week whose exam draws this question (12 = midterm, 24 = final).
    pub week_number: i32,

    /// The text content of the question.
    pub content: String,

    /// Ordered list of choices. Stored as a JSON array in the database;
    /// the order is the display order.
    pub choices: Json<Vec<QuestionChoice>>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    /// Freeze this question into a session snapshot.
    pub fn into_snapshot(self) -> QuestionSnapshot {
        QuestionSnapshot {
            id: self.id,
            content: self.content,
            choices: self
                .choices
                .0
                .into_iter()
                .map(|c| ChoiceSnapshot {
                    text: c.text,
                    is_correct: c.is_correct,
                })
                .collect(),
        }
    }
}

/// DTO for sending a question to an exam taker (choice texts only,
/// correctness flags stripped).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub index: usize,
    pub content: String,
    pub choices: Vec<String>,
}

impl PublicQuestion {
    pub fn from_snapshot(index: usize, snapshot: &QuestionSnapshot) -> Self {
        PublicQuestion {
            index,
            content: snapshot.content.clone(),
            choices: snapshot.choices.iter().map(|c| c.text.clone()).collect(),
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 100))]
    pub course_id: String,
    #[validate(range(min = 1, max = 52))]
    pub week_number: i32,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(custom(function = validate_choices))]
    pub choices: Vec<QuestionChoice>,
}

/// A question must offer at least two choices, and exactly one of them
/// may be marked correct. Malformed sets are rejected here, at creation,
/// so the scoring path never sees them.
fn validate_choices(choices: &[QuestionChoice]) -> Result<(), validator::ValidationError> {
    if choices.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_choices"));
    }
    let correct_count = choices.iter().filter(|c| c.is_correct).count();
    if correct_count != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_choice"));
    }
    for choice in choices {
        if choice.text.is_empty() || choice.text.len() > 500 {
            return Err(validator::ValidationError::new("choice_text_length"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(text: &str, is_correct: bool) -> QuestionChoice {
        QuestionChoice {
            text: text.to_string(),
            is_correct,
        }
    }

    #[test]
    fn accepts_exactly_one_correct_choice() {
        let choices = vec![choice("a", true), choice("b", false), choice("c", false)];
        assert!(validate_choices(&choices).is_ok());
    }

    #[test]
    fn rejects_zero_correct_choices() {
        let choices = vec![choice("a", false), choice("b", false)];
        assert!(validate_choices(&choices).is_err());
    }

    #[test]
    fn rejects_multiple_correct_choices() {
        let choices = vec![choice("a", true), choice("b", true)];
        assert!(validate_choices(&choices).is_err());
    }

    #[test]
    fn rejects_single_choice_question() {
        let choices = vec![choice("a", true)];
        assert!(validate_choices(&choices).is_err());
    }

    #[test]
    fn public_question_hides_correctness() {
        let q = Question {
            id: 1,
            course_id: "web-development".to_string(),
            week_number: 24,
            content: "What is Rust?".to_string(),
            choices: Json(vec![choice("a language", true), choice("a fungus", false)]),
            created_at: None,
        };
        let snapshot = q.into_snapshot();
        let public = PublicQuestion::from_snapshot(0, &snapshot);
        let rendered = serde_json::to_string(&public).unwrap();
        assert!(!rendered.contains("is_correct"));
        assert_eq!(public.choices, vec!["a language", "a fungus"]);
    }
}
