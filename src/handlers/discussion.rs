// src/handlers/discussion.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::{DEFAULT_COURSE_ID, WEEK_COMPLETION_REPLY_THRESHOLD},
    error::AppError,
    models::discussion::{
        CreateDiscussionPostRequest, CreateReplyRequest, DiscussionPost, PostListParams,
        ReplyResponse, WeekProgress,
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Create a new discussion post for a course week.
pub async fn create_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateDiscussionPostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id();
    let course_id = payload
        .course_id
        .unwrap_or_else(|| DEFAULT_COURSE_ID.to_string());
    let content = clean_html(&payload.content);

    let post_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO discussion_posts (user_id, course_id, week_number, title, content)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&course_id)
    .bind(payload.week_number)
    .bind(&payload.title)
    .bind(&content)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create discussion post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": post_id })),
    ))
}

/// List discussion posts (recent first), filtered by course and week.
/// Soft-deleted posts are excluded. Supports cursor-based pagination.
pub async fn list_posts(
    State(pool): State<PgPool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).min(100); // Default 20, max 100

    let posts = sqlx::query_as::<_, DiscussionPost>(
        r#"
        SELECT id, user_id, course_id, week_number, title, content,
               replies_count, created_at, deleted_at
        FROM discussion_posts
        WHERE deleted_at IS NULL
          AND ($1::TEXT IS NULL OR course_id = $1)
          AND ($2::INT IS NULL OR week_number = $2)
          AND ($3::TIMESTAMPTZ IS NULL OR created_at < $3)
        ORDER BY created_at DESC
        LIMIT $4
        "#,
    )
    .bind(params.course_id)
    .bind(params.week_number)
    .bind(params.cursor)
    .bind(limit)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list discussion posts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(posts))
}

/// Get a single discussion post by id.
pub async fn get_post(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = sqlx::query_as::<_, DiscussionPost>(
        r#"
        SELECT id, user_id, course_id, week_number, title, content,
               replies_count, created_at, deleted_at
        FROM discussion_posts
        WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// Create a reply on a post.
///
/// Replying is what drives week completion: once the author's reply count
/// for the post's course week reaches the threshold, the week is marked
/// completed. The flag flips once and is never unset by this flow.
pub async fn create_reply(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_id = claims.user_id();
    let content = clean_html(&payload.content);

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    // 1. The post must exist and not be deleted; its course/week scope the
    //    completion counter.
    let post = sqlx::query_as::<_, DiscussionPost>(
        r#"
        SELECT id, user_id, course_id, week_number, title, content,
               replies_count, created_at, deleted_at
        FROM discussion_posts
        WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    // 2. Insert Reply
    let reply_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO discussion_replies (post_id, user_id, content)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(&content)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    // 3. Update Post Count
    sqlx::query("UPDATE discussion_posts SET replies_count = replies_count + 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    // 4. Count this user's replies across the course week.
    let reply_count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM discussion_replies r
        JOIN discussion_posts p ON r.post_id = p.id
        WHERE r.user_id = $1 AND p.course_id = $2 AND p.week_number = $3
        "#,
    )
    .bind(user_id)
    .bind(&post.course_id)
    .bind(post.week_number)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    let week_completed = reply_count >= WEEK_COMPLETION_REPLY_THRESHOLD;

    // 5. At the threshold, flip the completion flag. completed_at keeps the
    //    first completion time across repeat upserts.
    if week_completed {
        sqlx::query(
            r#"
            INSERT INTO week_progress (user_id, course_id, week_number, completed, completed_at)
            VALUES ($1, $2, $3, TRUE, NOW())
            ON CONFLICT (user_id, course_id, week_number) DO UPDATE SET
                completed = TRUE,
                completed_at = COALESCE(week_progress.completed_at, EXCLUDED.completed_at)
            "#,
        )
        .bind(user_id)
        .bind(&post.course_id)
        .bind(post.week_number)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": reply_id,
            "week_completed": week_completed,
        })),
    ))
}

/// List all replies for a post with author info, oldest first.
pub async fn list_replies(
    State(pool): State<PgPool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let replies = sqlx::query_as::<_, ReplyResponse>(
        r#"
        SELECT r.id, r.post_id, r.user_id, u.username, r.content, r.created_at
        FROM discussion_replies r
        JOIN users u ON r.user_id = u.id
        WHERE r.post_id = $1
        ORDER BY r.created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(replies))
}

/// List the current user's week completion records.
pub async fn my_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let progress = sqlx::query_as::<_, WeekProgress>(
        r#"
        SELECT user_id, course_id, week_number, completed, completed_at
        FROM week_progress
        WHERE user_id = $1
        ORDER BY course_id, week_number
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(progress))
}
