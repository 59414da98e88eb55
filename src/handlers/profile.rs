// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        certificate::Certificate,
        exam_result::ExamResult,
        user::{MeResponse, User},
    },
    utils::jwt::Claims,
};

/// Get current user's profile: account info, exam results, certificates,
/// and how many course weeks the discussion gate has marked completed.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let exam_results = sqlx::query_as::<_, ExamResult>(
        r#"
        SELECT user_id, course_id, exam_type, score_percent, status, completed_at
        FROM exam_results
        WHERE user_id = $1
        ORDER BY completed_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let certificates = sqlx::query_as::<_, Certificate>(
        r#"
        SELECT id, student_id, student_name, course_id, course_name,
               date_completed, issued_at, is_valid
        FROM certificates
        WHERE student_id = $1
        ORDER BY issued_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let completed_weeks: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM week_progress WHERE user_id = $1 AND completed = TRUE",
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
        created_at: user.created_at,
        completed_weeks,
        exam_results,
        certificates,
    }))
}
