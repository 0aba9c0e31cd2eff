use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::CommandId;

/// Outcome of evaluating a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    #[must_use]
    pub fn is_accepted(self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    #[must_use]
    pub fn from_bool(accepted: bool) -> Self {
        if accepted {
            Verdict::Accepted
        } else {
            Verdict::Rejected
        }
    }
}

/// What a response was answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ResponseTarget {
    Command(CommandId),
    Question,
}

/// A pilot transmission matched against the outstanding instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub target: ResponseTarget,
    pub transcript: String,
    pub is_correct: bool,
    pub responded_at: DateTime<Utc>,
    /// Milliseconds between the instruction being issued and this response.
    pub response_time_ms: u64,
}

impl Response {
    #[must_use]
    pub fn new(
        target: ResponseTarget,
        transcript: impl Into<String>,
        verdict: Verdict,
        issued_at: DateTime<Utc>,
        responded_at: DateTime<Utc>,
    ) -> Self {
        let elapsed = (responded_at - issued_at).num_milliseconds();
        Self {
            target,
            transcript: transcript.into(),
            is_correct: verdict.is_accepted(),
            responded_at,
            response_time_ms: u64::try_from(elapsed).unwrap_or(0),
        }
    }

    #[must_use]
    pub fn is_question_answer(&self) -> bool {
        matches!(self.target, ResponseTarget::Question)
    }
}
