// src/handlers/certificate.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{error::AppError, models::certificate::Certificate, utils::jwt::Claims};

/// Public verification lookup: anyone holding a certificate id can check
/// that it was issued and is still valid. Ids are stored uppercased, so
/// the lookup is case-insensitive.
pub async fn verify_certificate(
    State(pool): State<PgPool>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let certificate = sqlx::query_as::<_, Certificate>(
        r#"
        SELECT id, student_id, student_name, course_id, course_name,
               date_completed, issued_at, is_valid
        FROM certificates
        WHERE id = $1
        "#,
    )
    .bind(id.to_uppercase())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to look up certificate: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?
    .ok_or(AppError::NotFound("Certificate not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "valid": certificate.is_valid,
        "certificate": certificate,
    })))
}

/// Lists the current user's certificates, newest first.
pub async fn list_my_certificates(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

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
    .map_err(|e| {
        tracing::error!("Failed to list certificates: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(certificates))
}
