use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Command, Question, Response};

/// Points for a correct command read-back.
pub const COMMAND_READBACK_POINTS: i64 = 10;
/// Points for a correct cross-check answer.
pub const QUESTION_ANSWER_POINTS: i64 = 15;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is not active")]
    NotActive,

    #[error("response without an outstanding instruction ({responses} responses for {issued} instructions)")]
    UnmatchedResponse { responses: usize, issued: u32 },
}

/// Record of one training session.
///
/// Every instruction put in the slot counts towards `commands_issued`,
/// questions included, so `correct_responses <= commands_issued` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    is_active: bool,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    commands_issued: u32,
    questions_asked: u32,
    correct_responses: u32,
    score: i64,
    commands: Vec<Command>,
    questions: Vec<Question>,
    responses: Vec<Response>,
}

impl Session {
    /// A fresh, active session.
    #[must_use]
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            is_active: true,
            started_at: Some(now),
            ..Self::default()
        }
    }

    /// Append a command to the log.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` once the session has finished.
    pub fn record_command(&mut self, command: Command) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.commands.push(command);
        self.commands_issued = self.commands_issued.saturating_add(1);
        Ok(())
    }

    /// Append a cross-check question to the log.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` once the session has finished.
    pub fn record_question(&mut self, question: Question) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.questions.push(question);
        self.questions_asked = self.questions_asked.saturating_add(1);
        self.commands_issued = self.commands_issued.saturating_add(1);
        Ok(())
    }

    /// Append a response and apply its score delta. Returns the points awarded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` once the session has finished, and
    /// `SessionError::UnmatchedResponse` if there are already as many
    /// responses as issued instructions.
    pub fn record_response(&mut self, response: Response) -> Result<i64, SessionError> {
        self.ensure_active()?;
        if self.responses.len() >= self.commands_issued as usize {
            return Err(SessionError::UnmatchedResponse {
                responses: self.responses.len(),
                issued: self.commands_issued,
            });
        }

        let points = match (response.is_correct, response.is_question_answer()) {
            (false, _) => 0,
            (true, false) => COMMAND_READBACK_POINTS,
            (true, true) => QUESTION_ANSWER_POINTS,
        };
        if response.is_correct {
            self.correct_responses = self.correct_responses.saturating_add(1);
        }
        self.score = self.score.saturating_add(points);
        self.responses.push(response);
        Ok(points)
    }

    /// Mark the session finished. Returns false if it was not active.
    pub fn finish(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.ended_at = Some(now);
        true
    }

    /// Percentage of issued instructions answered correctly, rounded.
    #[must_use]
    pub fn accuracy(&self) -> u32 {
        percent(self.correct_responses, self.commands_issued)
    }

    /// Mean response time in seconds, or 0 when nothing was answered.
    #[must_use]
    pub fn avg_response_time_secs(&self) -> f64 {
        if self.responses.is_empty() {
            return 0.0;
        }
        let total_ms: u64 = self.responses.iter().map(|r| r.response_time_ms).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = total_ms as f64 / self.responses.len() as f64 / 1000.0;
        mean
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.is_active {
            Ok(())
        } else {
            Err(SessionError::NotActive)
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn commands_issued(&self) -> u32 {
        self.commands_issued
    }

    #[must_use]
    pub fn questions_asked(&self) -> u32 {
        self.questions_asked
    }

    #[must_use]
    pub fn correct_responses(&self) -> u32 {
        self.correct_responses
    }

    #[must_use]
    pub fn score(&self) -> i64 {
        self.score
    }

    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }
}

/// Rounded percentage, 0 when the denominator is 0.
#[must_use]
pub fn percent(numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let ratio = f64::from(numerator) / f64::from(denominator) * 100.0;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = ratio.round() as u32;
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandCategory, QuestionKind, ResponseTarget, Verdict};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn command() -> Command {
        Command::new(
            "Climb to flight level one eight zero",
            CommandCategory::Altitude,
            "Climbing to flight level one eight zero",
            fixed_now(),
        )
    }

    #[test]
    fn scores_are_asymmetric() {
        let now = fixed_now();
        let mut session = Session::start(now);
        let cmd = command();
        let id = cmd.id;
        session.record_command(cmd).unwrap();
        session
            .record_question(Question::new(QuestionKind::ReportSpeed, now))
            .unwrap();

        let readback = Response::new(
            ResponseTarget::Command(id),
            "climbing flight level",
            Verdict::Accepted,
            now,
            now + Duration::seconds(2),
        );
        let answer = Response::new(
            ResponseTarget::Question,
            "450",
            Verdict::Accepted,
            now,
            now + Duration::seconds(4),
        );

        assert_eq!(session.record_response(readback).unwrap(), 10);
        assert_eq!(session.record_response(answer).unwrap(), 15);
        assert_eq!(session.score(), 25);
        assert_eq!(session.commands_issued(), 2);
        assert_eq!(session.questions_asked(), 1);
        assert_eq!(session.correct_responses(), 2);
        assert_eq!(session.accuracy(), 100);
        assert!((session.avg_response_time_secs() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rejected_response_scores_nothing() {
        let now = fixed_now();
        let mut session = Session::start(now);
        let cmd = command();
        let id = cmd.id;
        session.record_command(cmd).unwrap();
        let miss = Response::new(ResponseTarget::Command(id), "say again", Verdict::Rejected, now, now);
        assert_eq!(session.record_response(miss).unwrap(), 0);
        assert_eq!(session.correct_responses(), 0);
        assert_eq!(session.accuracy(), 0);
    }

    #[test]
    fn response_without_instruction_is_refused() {
        let now = fixed_now();
        let mut session = Session::start(now);
        let stray = Response::new(ResponseTarget::Question, "300", Verdict::Accepted, now, now);
        assert_eq!(
            session.record_response(stray),
            Err(SessionError::UnmatchedResponse {
                responses: 0,
                issued: 0
            })
        );
        assert_eq!(session.correct_responses(), 0);
    }

    #[test]
    fn finished_session_rejects_records_and_finishes_once() {
        let now = fixed_now();
        let mut session = Session::start(now);
        assert!(session.finish(now));
        assert!(!session.finish(now + Duration::seconds(5)));
        assert_eq!(session.ended_at(), Some(now));
        assert_eq!(session.record_command(command()), Err(SessionError::NotActive));
    }

    #[test]
    fn percent_handles_zero_and_rounding() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 2), 50);
    }
}
