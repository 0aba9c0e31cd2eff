use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Session;

/// How many session summaries `Statistics` keeps.
pub const RECENT_SESSIONS_CAP: usize = 10;

/// Summary of one completed session, as shown in the history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub date: DateTime<Utc>,
    pub score: i64,
    /// Correct responses in the session.
    pub commands_completed: u32,
    /// Rounded percent.
    pub accuracy: u32,
    #[serde(default)]
    pub avg_response_time_secs: f64,
}

impl SessionRecord {
    /// Summarize a session as of `date`.
    #[must_use]
    pub fn from_session(session: &Session, date: DateTime<Utc>) -> Self {
        Self {
            date,
            score: session.score(),
            commands_completed: session.correct_responses(),
            accuracy: session.accuracy(),
            avg_response_time_secs: round_tenths(session.avg_response_time_secs()),
        }
    }
}

/// Lifetime training statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_score: i64,
    pub sessions_completed: u32,
    /// Running average of per-session accuracy, rounded percent.
    pub accuracy: u32,
    #[serde(default)]
    pub avg_response_time_secs: f64,
    /// Most recent first.
    pub recent_sessions: Vec<SessionRecord>,
}

impl Statistics {
    /// Fold a completed session into the lifetime totals.
    pub fn fold(&mut self, record: SessionRecord) {
        let completed = f64::from(self.sessions_completed);
        let next = completed + 1.0;

        let accuracy = (f64::from(self.accuracy) * completed + f64::from(record.accuracy)) / next;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.accuracy = accuracy.round() as u32;
        }
        self.avg_response_time_secs = round_tenths(
            (self.avg_response_time_secs * completed + record.avg_response_time_secs) / next,
        );

        self.total_score = self.total_score.saturating_add(record.score);
        self.sessions_completed = self.sessions_completed.saturating_add(1);
        self.recent_sessions.insert(0, record);
        self.recent_sessions.truncate(RECENT_SESSIONS_CAP);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions_completed == 0 && self.recent_sessions.is_empty()
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
