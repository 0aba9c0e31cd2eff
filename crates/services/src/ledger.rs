use chrono::{DateTime, Utc};

use atc_core::model::{
    Command, Question, Response, Session, SessionError, SessionRecord, Statistics,
};

/// Owns the current session and the lifetime statistics it folds into.
#[derive(Debug, Clone, Default)]
pub struct SessionLedger {
    session: Session,
    statistics: Statistics,
}

impl SessionLedger {
    #[must_use]
    pub fn new(statistics: Statistics) -> Self {
        Self {
            session: Session::default(),
            statistics,
        }
    }

    /// Discard the previous session and begin a new one.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.session = Session::start(now);
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside a session.
    pub fn record_command(&mut self, command: Command) -> Result<(), SessionError> {
        self.session.record_command(command)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside a session.
    pub fn record_question(&mut self, question: Question) -> Result<(), SessionError> {
        self.session.record_question(question)
    }

    /// Record a response and return the points it earned.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` outside a session or for unmatched responses.
    pub fn record_response(&mut self, response: Response) -> Result<i64, SessionError> {
        self.session.record_response(response)
    }

    /// Close the active session and fold it into the statistics.
    ///
    /// Returns `None` when there was no active session.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<SessionRecord> {
        if !self.session.finish(now) {
            return None;
        }
        let record = SessionRecord::from_session(&self.session, now);
        self.statistics.fold(record.clone());
        Some(record)
    }

    pub fn reset_statistics(&mut self) {
        self.statistics = Statistics::default();
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }
}
