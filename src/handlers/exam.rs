// src/handlers/exam.rs

use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::DEFAULT_COURSE_ID,
    error::AppError,
    models::{
        certificate::Certificate,
        exam_result::status_label,
        question::{PublicQuestion, Question},
    },
    session::{
        AnswerResult, ExamSession, ExamType, ResultView, SessionError, SessionIdentity,
        SubmissionSummary, is_exam_week,
    },
    state::AppState,
    utils::jwt::optional_claims,
};

/// Bound on each store write during submission. A hung store must not hang
/// the transition to the result view.
const PERSIST_TIMEOUT: Duration = Duration::from_secs(5);

fn session_error(err: SessionError) -> AppError {
    match err {
        SessionError::NotFound => AppError::NotFound("Exam session not found".to_string()),
        SessionError::ChoiceOutOfRange => {
            AppError::BadRequest("Choice index out of range".to_string())
        }
    }
}

/// DTO for starting an exam session.
#[derive(Debug, Deserialize, Validate)]
pub struct StartExamRequest {
    /// Optional: falls back to the default course when absent.
    #[validate(length(min = 1, max = 100))]
    pub course_id: Option<String>,
    pub week_number: i32,
}

/// DTO for answering the current question.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    /// Index into the current question's choices.
    pub choice: usize,
}

/// Starts a timed exam session.
///
/// * Only the midterm and final weeks have an exam; anything else is a 400.
/// * The question set for (course, week) is snapshotted into the session in
///   display order. An empty bank means the exam is not ready: no session is
///   created and no scoring state exists.
/// * Works with or without a logged-in user; an anonymous attempt is never
///   persisted.
pub async fn start_exam(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !is_exam_week(payload.week_number) {
        return Err(AppError::BadRequest(format!(
            "Week {} does not have an exam",
            payload.week_number
        )));
    }

    let course_id = payload
        .course_id
        .unwrap_or_else(|| DEFAULT_COURSE_ID.to_string());

    let identity = optional_claims(&headers, &state.config).map(|claims| SessionIdentity {
        id: claims.user_id(),
        name: claims.name,
    });

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, course_id, week_number, content, choices, created_at
        FROM questions
        WHERE course_id = $1 AND week_number = $2
        ORDER BY id
        "#,
    )
    .bind(&course_id)
    .bind(payload.week_number)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch exam questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if questions.is_empty() {
        return Err(AppError::NotFound(
            "Exam questions are not available yet".to_string(),
        ));
    }

    let snapshots = questions.into_iter().map(Question::into_snapshot).collect();
    let now = Utc::now();
    let session = ExamSession::new(
        identity,
        course_id.clone(),
        payload.week_number,
        snapshots,
        now,
    );

    let total_questions = session.total_questions();
    let remaining_seconds = session.remaining_seconds(now);
    let first_question = session
        .current_question()
        .map(|q| PublicQuestion::from_snapshot(0, q));
    let session_id = state.sessions.insert(session);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "session_id": session_id,
            "course_id": course_id,
            "week_number": payload.week_number,
            "exam_type": ExamType::from_week(payload.week_number).as_str(),
            "total_questions": total_questions,
            "remaining_seconds": remaining_seconds,
            "question": first_question,
        })),
    ))
}

/// Answers the current question of a session.
///
/// Scoring and advancement are synchronous; only when the answer completes
/// the set (or arrives past the deadline) does the submission pipeline run.
pub async fn answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();

    match state
        .sessions
        .answer(session_id, payload.choice, now)
        .map_err(session_error)?
    {
        AnswerResult::Advanced {
            current_index,
            total_questions,
            remaining_seconds,
        } => {
            let question = state
                .sessions
                .with_session(session_id, |s| {
                    s.current_question()
                        .map(|q| PublicQuestion::from_snapshot(s.current_index(), q))
                })
                .map_err(session_error)?;

            Ok(Json(serde_json::json!({
                "phase": "in_progress",
                "current_index": current_index,
                "total_questions": total_questions,
                "remaining_seconds": remaining_seconds,
                "question": question,
            })))
        }
        AnswerResult::Completed(summary) => {
            let result = complete_submission(&state, summary).await;
            Ok(Json(serde_json::json!({
                "phase": "submitted",
                "result": result,
            })))
        }
        AnswerResult::AlreadySubmitted(outcome) => Ok(Json(serde_json::json!({
            "phase": "submitted",
            "result": ResultView::from(&outcome),
        }))),
    }
}

/// Current state of a session: progress and countdown while in progress,
/// the result view once submitted.
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();

    let body = state
        .sessions
        .with_session(session_id, |s| match s.outcome() {
            Some(outcome) => serde_json::json!({
                "phase": "submitted",
                "course_id": s.course_id,
                "week_number": s.week_number,
                "result": ResultView::from(outcome),
            }),
            None => serde_json::json!({
                "phase": "in_progress",
                "course_id": s.course_id,
                "week_number": s.week_number,
                "current_index": s.current_index(),
                "total_questions": s.total_questions(),
                "remaining_seconds": s.remaining_seconds(now),
                "question": s
                    .current_question()
                    .map(|q| PublicQuestion::from_snapshot(s.current_index(), q)),
            }),
        })
        .map_err(session_error)?;

    Ok(Json(body))
}

/// Restarts an attempt: question index 0, score 0, fresh time budget,
/// same question snapshot. Available mid-session and from the result view.
pub async fn restart(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    state
        .sessions
        .restart(session_id, now)
        .map_err(session_error)?;

    let body = state
        .sessions
        .with_session(session_id, |s| {
            serde_json::json!({
                "phase": "in_progress",
                "course_id": s.course_id,
                "week_number": s.week_number,
                "current_index": s.current_index(),
                "total_questions": s.total_questions(),
                "remaining_seconds": s.remaining_seconds(now),
                "question": s
                    .current_question()
                    .map(|q| PublicQuestion::from_snapshot(s.current_index(), q)),
            })
        })
        .map_err(session_error)?;

    Ok(Json(body))
}

/// Abandons a session: dropped from the registry, nothing persisted.
pub async fn abandon(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if state.sessions.remove(session_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Exam session not found".to_string()))
    }
}

/// Why a finalized attempt was not persisted.
#[derive(Debug)]
enum SubmitFailure {
    /// No authenticated identity on the session; nothing to key the
    /// result by.
    MissingIdentity,
    Store(sqlx::Error),
    Timeout,
}

/// Writes the exam result (upsert by user/course/exam type) and, when the
/// certificate gate passes, the certificate record. The two writes are
/// independent and may partially succeed.
async fn persist_submission(
    pool: &PgPool,
    summary: &SubmissionSummary,
) -> Result<Option<String>, SubmitFailure> {
    let identity = summary
        .identity
        .as_ref()
        .ok_or(SubmitFailure::MissingIdentity)?;
    let outcome = &summary.outcome;

    let upsert = sqlx::query(
        r#"
        INSERT INTO exam_results (user_id, course_id, exam_type, score_percent, status, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, course_id, exam_type) DO UPDATE SET
            score_percent = EXCLUDED.score_percent,
            status = EXCLUDED.status,
            completed_at = EXCLUDED.completed_at
        "#,
    )
    .bind(identity.id)
    .bind(&summary.course_id)
    .bind(outcome.exam_type.as_str())
    .bind(outcome.score_percent)
    .bind(status_label(outcome.passed))
    .bind(outcome.completed_at)
    .execute(pool);

    tokio::time::timeout(PERSIST_TIMEOUT, upsert)
        .await
        .map_err(|_| SubmitFailure::Timeout)?
        .map_err(SubmitFailure::Store)?;

    if !outcome.certificate_eligible {
        return Ok(None);
    }

    let certificate = Certificate::issue(
        identity.id,
        &identity.name,
        &summary.course_id,
        outcome.completed_at,
    );

    let insert = sqlx::query(
        r#"
        INSERT INTO certificates
            (id, student_id, student_name, course_id, course_name, date_completed, issued_at, is_valid)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&certificate.id)
    .bind(certificate.student_id)
    .bind(&certificate.student_name)
    .bind(&certificate.course_id)
    .bind(&certificate.course_name)
    .bind(&certificate.date_completed)
    .bind(certificate.issued_at)
    .bind(certificate.is_valid)
    .execute(pool);

    tokio::time::timeout(PERSIST_TIMEOUT, insert)
        .await
        .map_err(|_| SubmitFailure::Timeout)?
        .map_err(SubmitFailure::Store)?;

    Ok(Some(certificate.id))
}

/// Persists a finalized attempt and returns the result view.
///
/// Persistence failures are logged and swallowed: the result view is always
/// produced, whether or not anything durable was written.
pub async fn complete_submission(state: &AppState, summary: SubmissionSummary) -> ResultView {
    match persist_submission(&state.pool, &summary).await {
        Ok(Some(certificate_id)) => {
            state
                .sessions
                .record_certificate(summary.session_id, certificate_id);
        }
        Ok(None) => {}
        Err(SubmitFailure::MissingIdentity) => {
            tracing::warn!(
                "Exam session {} submitted without identity; result not persisted",
                summary.session_id
            );
        }
        Err(SubmitFailure::Timeout) => {
            tracing::error!(
                "Timed out persisting submission for exam session {}",
                summary.session_id
            );
        }
        Err(SubmitFailure::Store(e)) => {
            tracing::error!(
                "Failed to persist submission for exam session {}: {:?}",
                summary.session_id,
                e
            );
        }
    }

    // Read back through the registry so a just-recorded certificate id is
    // reflected; fall back to the summary if the session is already gone.
    state
        .sessions
        .with_session(summary.session_id, |s| s.outcome().map(ResultView::from))
        .ok()
        .flatten()
        .unwrap_or_else(|| ResultView::from(&summary.outcome))
}

/// Background task owned by the application: once per second, finalize
/// overdue sessions through the same submission pipeline as the answer
/// path, then drop submitted sessions past their retention window.
pub fn spawn_expiry_watcher(state: AppState) {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            for summary in state.sessions.take_expired(now) {
                tracing::info!(
                    "Exam session {} ran out of time, auto-submitting",
                    summary.session_id
                );
                complete_submission(&state, summary).await;
            }
            state.sessions.purge_stale(now);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });
}
