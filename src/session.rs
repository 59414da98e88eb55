// src/session.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{
    CERTIFICATE_SCORE_PERCENTAGE, EXAM_TIME_LIMIT_SECS, FINAL_WEEK, MIDTERM_WEEK,
    PASSING_SCORE_PERCENTAGE, SESSION_RETENTION_SECS,
};

/// Exam label derived from the course week.
/// Week 12 is the midterm; any other triggering week is the final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamType {
    Midterm,
    Final,
}

impl ExamType {
    pub fn from_week(week_number: i32) -> Self {
        if week_number == MIDTERM_WEEK {
            ExamType::Midterm
        } else {
            ExamType::Final
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Midterm => "midterm",
            ExamType::Final => "final",
        }
    }
}

/// Only the midterm and final weeks start an exam session.
pub fn is_exam_week(week_number: i32) -> bool {
    week_number == MIDTERM_WEEK || week_number == FINAL_WEEK
}

/// One answer choice as snapshotted into a session.
#[derive(Debug, Clone)]
pub struct ChoiceSnapshot {
    pub text: String,
    pub is_correct: bool,
}

/// One question as snapshotted into a session. The snapshot is fixed for
/// the lifetime of the session; choices keep their display order.
#[derive(Debug, Clone)]
pub struct QuestionSnapshot {
    pub id: i64,
    pub content: String,
    pub choices: Vec<ChoiceSnapshot>,
}

/// The acting user as far as the engine cares: id and display name.
/// Absent for anonymous practice runs; nothing is persisted for those.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub id: i64,
    pub name: String,
}

/// Everything computed at submission time. Built exactly once per attempt;
/// the result view and the store writes both read from here, so the
/// displayed and persisted percentages cannot diverge.
#[derive(Debug, Clone)]
pub struct ExamOutcome {
    pub score: usize,
    pub total_questions: usize,
    pub score_percent: f64,
    pub passed: bool,
    pub exam_type: ExamType,
    pub certificate_eligible: bool,
    pub completed_at: DateTime<Utc>,
    pub certificate_id: Option<String>,
}

/// A finalized session, cloned out of the registry for persistence.
#[derive(Debug, Clone)]
pub struct SubmissionSummary {
    pub session_id: Uuid,
    pub identity: Option<SessionIdentity>,
    pub course_id: String,
    pub week_number: i32,
    pub outcome: ExamOutcome,
}

/// One timed attempt at a fixed question set.
#[derive(Debug)]
pub struct ExamSession {
    pub id: Uuid,
    pub identity: Option<SessionIdentity>,
    pub course_id: String,
    pub week_number: i32,
    questions: Vec<QuestionSnapshot>,
    current_index: usize,
    score: usize,
    deadline: DateTime<Utc>,
    submitted: bool,
    outcome: Option<ExamOutcome>,
}

fn score_percent(score: usize, total: usize) -> f64 {
    // Empty question sets must yield 0, never NaN.
    if total == 0 {
        return 0.0;
    }
    score as f64 / total as f64 * 100.0
}

impl ExamSession {
    pub fn new(
        identity: Option<SessionIdentity>,
        course_id: String,
        week_number: i32,
        questions: Vec<QuestionSnapshot>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            course_id,
            week_number,
            questions,
            current_index: 0,
            score: 0,
            deadline: now + Duration::seconds(EXAM_TIME_LIMIT_SECS),
            submitted: false,
            outcome: None,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&QuestionSnapshot> {
        self.questions.get(self.current_index)
    }

    pub fn submitted(&self) -> bool {
        self.submitted
    }

    pub fn outcome(&self) -> Option<&ExamOutcome> {
        self.outcome.as_ref()
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        if self.submitted {
            return 0;
        }
        (self.deadline - now).num_seconds().max(0)
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Score the chosen option and advance. Returns true when this was the
    /// last question and the session must be finalized.
    ///
    /// Scoring only inspects the chosen option's `is_correct` flag, so the
    /// score can never exceed the number of questions answered.
    fn apply_answer(&mut self, choice_index: usize) -> Result<bool, SessionError> {
        let question = match self.questions.get(self.current_index) {
            Some(q) => q,
            // Empty snapshot: nothing to score, go straight to submission.
            None => return Ok(true),
        };

        let choice = question
            .choices
            .get(choice_index)
            .ok_or(SessionError::ChoiceOutOfRange)?;

        if choice.is_correct {
            self.score += 1;
        }

        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            Ok(false)
        } else {
            Ok(true)
        }
    }

    /// Transition to the submitted state and compute the outcome.
    /// Idempotent: a second call is a no-op returning None, which is what
    /// keeps the last-answer path and the expiry watcher from double-writing.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<SubmissionSummary> {
        if self.submitted {
            return None;
        }
        self.submitted = true;

        let total = self.questions.len();
        let percent = score_percent(self.score, total);
        let outcome = ExamOutcome {
            score: self.score,
            total_questions: total,
            score_percent: percent,
            passed: percent >= PASSING_SCORE_PERCENTAGE,
            exam_type: ExamType::from_week(self.week_number),
            certificate_eligible: self.week_number == FINAL_WEEK
                && percent >= CERTIFICATE_SCORE_PERCENTAGE,
            completed_at: now,
            certificate_id: None,
        };
        self.outcome = Some(outcome.clone());

        Some(SubmissionSummary {
            session_id: self.id,
            identity: self.identity.clone(),
            course_id: self.course_id.clone(),
            week_number: self.week_number,
            outcome,
        })
    }

    /// Start the attempt over: same question snapshot, index 0, score 0,
    /// fresh time budget.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.current_index = 0;
        self.score = 0;
        self.deadline = now + Duration::seconds(EXAM_TIME_LIMIT_SECS);
        self.submitted = false;
        self.outcome = None;
    }

    /// Submitted sessions are retained for the result view until the
    /// retention window past their deadline runs out.
    fn stale(&self, now: DateTime<Utc>) -> bool {
        self.submitted && now >= self.deadline + Duration::seconds(SESSION_RETENTION_SECS)
    }
}

/// Errors surfaced by registry operations. Mapped to HTTP statuses at the
/// handler layer.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    NotFound,
    ChoiceOutOfRange,
}

/// What an answer did to the session.
#[derive(Debug)]
pub enum AnswerResult {
    /// Moved on to the next question.
    Advanced {
        current_index: usize,
        total_questions: usize,
        remaining_seconds: i64,
    },
    /// This answer finished the set, or the deadline had already passed;
    /// either way the session was finalized just now and must be persisted.
    Completed(SubmissionSummary),
    /// The session was finalized earlier; nothing to persist again.
    AlreadySubmitted(ExamOutcome),
}

/// Serializable result view, derived from the outcome.
#[derive(Debug, Serialize)]
pub struct ResultView {
    pub score: usize,
    pub total_questions: usize,
    pub score_percent: f64,
    pub passed: bool,
    pub exam_type: &'static str,
    pub certificate_issued: bool,
    pub certificate_id: Option<String>,
}

impl From<&ExamOutcome> for ResultView {
    fn from(outcome: &ExamOutcome) -> Self {
        ResultView {
            score: outcome.score,
            total_questions: outcome.total_questions,
            score_percent: outcome.score_percent,
            passed: outcome.passed,
            exam_type: outcome.exam_type.as_str(),
            certificate_issued: outcome.certificate_eligible,
            certificate_id: outcome.certificate_id.clone(),
        }
    }
}

/// In-memory registry of live and recently submitted sessions.
///
/// All mutation happens under one lock, so the answer path and the expiry
/// watcher cannot both finalize the same session.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, ExamSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ExamSession>> {
        self.inner.lock().expect("exam session store lock poisoned")
    }

    pub fn insert(&self, session: ExamSession) -> Uuid {
        let id = session.id;
        self.lock().insert(id, session);
        id
    }

    pub fn answer(
        &self,
        id: Uuid,
        choice_index: usize,
        now: DateTime<Utc>,
    ) -> Result<AnswerResult, SessionError> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound)?;

        if session.submitted {
            let outcome = session.outcome.clone().expect("submitted without outcome");
            return Ok(AnswerResult::AlreadySubmitted(outcome));
        }

        // Time ran out before this answer arrived: force submission with
        // whatever was scored so far. The late answer itself never counts.
        if session.expired(now) {
            let summary = session.finalize(now).expect("expired session not submitted");
            return Ok(AnswerResult::Completed(summary));
        }

        let completed = session.apply_answer(choice_index)?;
        if completed {
            let summary = session.finalize(now).expect("completed session not submitted");
            Ok(AnswerResult::Completed(summary))
        } else {
            Ok(AnswerResult::Advanced {
                current_index: session.current_index,
                total_questions: session.questions.len(),
                remaining_seconds: session.remaining_seconds(now),
            })
        }
    }

    /// Read-only snapshot for the status endpoint.
    pub fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&ExamSession) -> T,
    ) -> Result<T, SessionError> {
        let sessions = self.lock();
        let session = sessions.get(&id).ok_or(SessionError::NotFound)?;
        Ok(f(session))
    }

    pub fn restart(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), SessionError> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound)?;
        session.restart(now);
        Ok(())
    }

    /// Abandon a session: removed from the registry, nothing persisted.
    pub fn remove(&self, id: Uuid) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Retain the generated certificate id on the session so the result
    /// view can reference it.
    pub fn record_certificate(&self, id: Uuid, certificate_id: String) {
        if let Some(session) = self.lock().get_mut(&id) {
            if let Some(outcome) = session.outcome.as_mut() {
                outcome.certificate_id = Some(certificate_id);
            }
        }
    }

    /// Finalize every overdue session. Called by the expiry watcher;
    /// the `submitted` guard inside `finalize` makes this safe against a
    /// concurrent last-answer submission.
    pub fn take_expired(&self, now: DateTime<Utc>) -> Vec<SubmissionSummary> {
        let mut sessions = self.lock();
        sessions
            .values_mut()
            .filter(|s| !s.submitted && s.expired(now))
            .filter_map(|s| s.finalize(now))
            .collect()
    }

    /// Drop submitted sessions whose retention window has passed.
    pub fn purge_stale(&self, now: DateTime<Utc>) {
        self.lock().retain(|_, s| !s.stale(now));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A question whose first choice is the correct one.
    fn question(id: i64) -> QuestionSnapshot {
        QuestionSnapshot {
            id,
            content: format!("Question {}", id),
            choices: vec![
                ChoiceSnapshot {
                    text: "right".to_string(),
                    is_correct: true,
                },
                ChoiceSnapshot {
                    text: "wrong".to_string(),
                    is_correct: false,
                },
            ],
        }
    }

    fn session(week_number: i32, question_count: usize) -> ExamSession {
        let questions = (0..question_count).map(|i| question(i as i64)).collect();
        ExamSession::new(
            Some(SessionIdentity {
                id: 7,
                name: "student".to_string(),
            }),
            "web-development".to_string(),
            week_number,
            questions,
            Utc::now(),
        )
    }

    fn store_with(session: ExamSession) -> (SessionStore, Uuid) {
        let store = SessionStore::new();
        let id = store.insert(session);
        (store, id)
    }

    #[test]
    fn exam_type_derivation() {
        assert_eq!(ExamType::from_week(12), ExamType::Midterm);
        for week in [1, 5, 11, 13, 24, 100] {
            assert_eq!(ExamType::from_week(week), ExamType::Final);
        }
        assert_eq!(ExamType::Midterm.as_str(), "midterm");
        assert_eq!(ExamType::Final.as_str(), "final");
    }

    #[test]
    fn only_midterm_and_final_weeks_start_exams() {
        assert!(is_exam_week(12));
        assert!(is_exam_week(24));
        for week in [0, 1, 11, 13, 23, 25] {
            assert!(!is_exam_week(week));
        }
    }

    #[test]
    fn score_stays_within_bounds() {
        let (store, id) = store_with(session(24, 4));
        let now = Utc::now();

        // Answer everything correctly; score can never exceed the count.
        for _ in 0..3 {
            match store.answer(id, 0, now).unwrap() {
                AnswerResult::Advanced { .. } => {}
                other => panic!("unexpected: {:?}", other),
            }
        }
        let summary = match store.answer(id, 0, now).unwrap() {
            AnswerResult::Completed(summary) => summary,
            other => panic!("unexpected: {:?}", other),
        };
        assert_eq!(summary.outcome.score, 4);
        assert_eq!(summary.outcome.total_questions, 4);
        assert_eq!(summary.outcome.score_percent, 100.0);
    }

    #[test]
    fn pass_threshold_at_fifty_percent() {
        let mut s = session(12, 10);
        let now = Utc::now();
        // 5 of 10 correct.
        for i in 0..10 {
            let choice = if i < 5 { 0 } else { 1 };
            s.apply_answer(choice).unwrap();
        }
        let summary = s.finalize(now).unwrap();
        assert_eq!(summary.outcome.score_percent, 50.0);
        assert!(summary.outcome.passed);
    }

    #[test]
    fn fails_below_fifty_percent() {
        let mut s = session(12, 10);
        for i in 0..10 {
            let choice = if i < 4 { 0 } else { 1 };
            s.apply_answer(choice).unwrap();
        }
        let summary = s.finalize(Utc::now()).unwrap();
        assert_eq!(summary.outcome.score_percent, 40.0);
        assert!(!summary.outcome.passed);
    }

    #[test]
    fn certificate_gate_requires_final_week_and_seventy_percent() {
        // Final week, 7/10: eligible.
        let mut s = session(24, 10);
        for i in 0..10 {
            s.apply_answer(if i < 7 { 0 } else { 1 }).unwrap();
        }
        let outcome = s.finalize(Utc::now()).unwrap().outcome;
        assert!(outcome.passed);
        assert!(outcome.certificate_eligible);

        // Final week, 6/10: passed but no certificate.
        let mut s = session(24, 10);
        for i in 0..10 {
            s.apply_answer(if i < 6 { 0 } else { 1 }).unwrap();
        }
        let outcome = s.finalize(Utc::now()).unwrap().outcome;
        assert!(outcome.passed);
        assert!(!outcome.certificate_eligible);

        // Midterm week, 9/10: high score never issues a certificate.
        let mut s = session(12, 10);
        for i in 0..10 {
            s.apply_answer(if i < 9 { 0 } else { 1 }).unwrap();
        }
        let outcome = s.finalize(Utc::now()).unwrap().outcome;
        assert!(outcome.passed);
        assert!(!outcome.certificate_eligible);
    }

    #[test]
    fn empty_question_set_scores_zero_percent() {
        let mut s = ExamSession::new(
            None,
            "web-development".to_string(),
            24,
            Vec::new(),
            Utc::now(),
        );
        let outcome = s.finalize(Utc::now()).unwrap().outcome;
        assert_eq!(outcome.score_percent, 0.0);
        assert!(!outcome.passed);
        assert!(!outcome.certificate_eligible);
    }

    #[test]
    fn finalize_is_idempotent() {
        let mut s = session(24, 2);
        assert!(s.finalize(Utc::now()).is_some());
        assert!(s.finalize(Utc::now()).is_none());
        assert!(s.submitted());
    }

    #[test]
    fn expiry_counts_only_answered_questions() {
        let mut s = session(12, 10);
        // 3 of 10 answered, all correct, then the clock runs out.
        for _ in 0..3 {
            s.apply_answer(0).unwrap();
        }
        let deadline_passed = Utc::now() + Duration::seconds(EXAM_TIME_LIMIT_SECS + 1);
        assert!(s.expired(deadline_passed));
        let outcome = s.finalize(deadline_passed).unwrap().outcome;
        assert_eq!(outcome.score, 3);
        assert_eq!(outcome.total_questions, 10);
        assert_eq!(outcome.score_percent, 30.0);
    }

    #[test]
    fn late_answer_forces_submission_without_scoring() {
        let (store, id) = store_with(session(12, 10));
        let now = Utc::now();
        match store.answer(id, 0, now).unwrap() {
            AnswerResult::Advanced { current_index, .. } => assert_eq!(current_index, 1),
            other => panic!("unexpected: {:?}", other),
        }

        let late = now + Duration::seconds(EXAM_TIME_LIMIT_SECS + 5);
        match store.answer(id, 0, late).unwrap() {
            AnswerResult::Completed(summary) => {
                // Only the one pre-deadline answer counts.
                assert_eq!(summary.outcome.score, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn answer_after_submission_does_not_rescore() {
        let (store, id) = store_with(session(12, 1));
        let now = Utc::now();
        match store.answer(id, 0, now).unwrap() {
            AnswerResult::Completed(summary) => assert_eq!(summary.outcome.score, 1),
            other => panic!("unexpected: {:?}", other),
        }
        match store.answer(id, 0, now).unwrap() {
            AnswerResult::AlreadySubmitted(outcome) => assert_eq!(outcome.score, 1),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn out_of_range_choice_is_rejected_without_state_change() {
        let (store, id) = store_with(session(12, 3));
        let now = Utc::now();
        let err = store.answer(id, 9, now).unwrap_err();
        assert_eq!(err, SessionError::ChoiceOutOfRange);

        store
            .with_session(id, |s| {
                assert_eq!(s.current_index(), 0);
                assert!(!s.submitted());
            })
            .unwrap();
    }

    #[test]
    fn restart_resets_progress_and_timer() {
        let mut s = session(24, 5);
        for _ in 0..5 {
            s.apply_answer(0).unwrap();
        }
        s.finalize(Utc::now());
        assert!(s.submitted());

        let now = Utc::now();
        s.restart(now);
        assert_eq!(s.current_index(), 0);
        assert!(!s.submitted());
        assert!(s.outcome().is_none());
        assert_eq!(s.remaining_seconds(now), EXAM_TIME_LIMIT_SECS);

        // Fresh attempt scores from zero.
        for _ in 0..5 {
            s.apply_answer(1).unwrap();
        }
        let outcome = s.finalize(Utc::now()).unwrap().outcome;
        assert_eq!(outcome.score, 0);
    }

    #[test]
    fn remaining_seconds_never_negative() {
        let s = session(12, 2);
        let long_after = Utc::now() + Duration::seconds(EXAM_TIME_LIMIT_SECS * 3);
        assert_eq!(s.remaining_seconds(long_after), 0);
    }

    #[test]
    fn watcher_finalizes_overdue_sessions_exactly_once() {
        let (store, id) = store_with(session(24, 10));
        let now = Utc::now();
        store.answer(id, 0, now).unwrap();

        let after_deadline = now + Duration::seconds(EXAM_TIME_LIMIT_SECS + 1);
        let expired = store.take_expired(after_deadline);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].outcome.score, 1);

        // Second sweep finds nothing left to finalize.
        assert!(store.take_expired(after_deadline).is_empty());
    }

    #[test]
    fn abandoned_session_is_gone() {
        let (store, id) = store_with(session(24, 10));
        assert!(store.remove(id));
        assert!(!store.remove(id));

        let after_deadline = Utc::now() + Duration::seconds(EXAM_TIME_LIMIT_SECS + 1);
        assert!(store.take_expired(after_deadline).is_empty());
        assert_eq!(
            store.answer(id, 0, Utc::now()).unwrap_err(),
            SessionError::NotFound
        );
    }

    #[test]
    fn purge_drops_submitted_sessions_past_retention() {
        let (store, id) = store_with(session(12, 1));
        let now = Utc::now();
        store.answer(id, 0, now).unwrap();
        assert_eq!(store.len(), 1);

        // Still retained right after submission, for the result view.
        store.purge_stale(now);
        assert_eq!(store.len(), 1);

        let long_after =
            now + Duration::seconds(EXAM_TIME_LIMIT_SECS + SESSION_RETENTION_SECS + 1);
        store.purge_stale(long_after);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn recorded_certificate_id_shows_in_result_view() {
        let (store, id) = store_with(session(24, 1));
        store.answer(id, 0, Utc::now()).unwrap();
        store.record_certificate(id, "CERT-7-ABC123".to_string());

        let view = store
            .with_session(id, |s| ResultView::from(s.outcome().unwrap()))
            .unwrap();
        assert!(view.certificate_issued);
        assert_eq!(view.certificate_id.as_deref(), Some("CERT-7-ABC123"));
    }
}
