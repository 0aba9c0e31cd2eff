use chrono::{DateTime, Utc};
use serde::Serialize;

use atc_core::model::{FlightState, Instruction, Session, Statistics, Verdict};

use crate::scheduler::SchedulerState;

pub const GOOD_READBACK: &str = "Good readback!";
pub const BAD_READBACK: &str = "Incorrect readback. Please repeat.";
pub const CORRECT_ANSWER: &str = "Correct answer!";
pub const INCORRECT_ANSWER: &str = "Incorrect answer. Try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Readback,
    Answer,
}

/// Short-lived verdict shown after a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub is_correct: bool,
    pub kind: FeedbackKind,
    pub message: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Feedback {
    #[must_use]
    pub fn new(
        kind: FeedbackKind,
        verdict: Verdict,
        issued_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        let message = match (kind, verdict) {
            (FeedbackKind::Readback, Verdict::Accepted) => GOOD_READBACK,
            (FeedbackKind::Readback, Verdict::Rejected) => BAD_READBACK,
            (FeedbackKind::Answer, Verdict::Accepted) => CORRECT_ANSWER,
            (FeedbackKind::Answer, Verdict::Rejected) => INCORRECT_ANSWER,
        };
        Self {
            is_correct: verdict.is_accepted(),
            kind,
            message: message.to_string(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Read-only view of the engine for presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSnapshot {
    pub state: SchedulerState,
    pub session: Session,
    pub flight_state: FlightState,
    pub outstanding_instruction: Option<Instruction>,
    pub is_waiting_for_response: bool,
    pub last_feedback: Option<Feedback>,
    pub statistics: Statistics,
}

impl TrainingSnapshot {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }
}
