// src/models/discussion.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'discussion_posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DiscussionPost {
    pub id: i64,
    pub user_id: i64,
    pub course_id: String,
    pub week_number: i32,
    pub title: String,
    pub content: String,
    pub replies_count: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new discussion post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDiscussionPostRequest {
    /// Optional: falls back to the default course when absent.
    pub course_id: Option<String>,

    #[validate(range(min = 1, max = 52))]
    pub week_number: i32,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Title length must be between 1 and 100 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content length must be between 1 and 10000 chars"
    ))]
    pub content: String,
}

/// Query parameters for listing discussion posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    pub course_id: Option<String>,
    pub week_number: Option<i32>,

    /// Cursor for pagination: the created_at timestamp of the last post
    /// in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}

/// DTO for creating a reply.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReplyRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Reply must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

/// DTO for displaying a reply with author info.
#[derive(Debug, Serialize, FromRow)]
pub struct ReplyResponse {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'week_progress' table: one row per (user, course, week),
/// flipped to completed when the reply threshold is reached.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WeekProgress {
    pub user_id: i64,
    pub course_id: String,
    pub week_number: i32,
    pub completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}
