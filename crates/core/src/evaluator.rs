//! Heuristic grading of transcribed pilot speech.
//!
//! This is a keyword/number overlap check, not a phraseology parser.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{FlightState, Verdict};

/// Aviation terms counted when comparing a read-back to its instruction.
pub const READBACK_KEYWORDS: [&str; 10] = [
    "climb", "descend", "turn", "left", "right", "heading", "altitude", "speed", "flight",
    "level",
];

/// Keyword matches needed to accept a read-back.
pub const MIN_KEYWORD_MATCHES: usize = 2;

pub const SPEED_TOLERANCE_KT: f64 = 20.0;
pub const ALTITUDE_TOLERANCE_FT: f64 = 500.0;
pub const HEADING_TOLERANCE_DEG: f64 = 10.0;

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("static number pattern compiles"));

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEvaluator;

impl ResponseEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Accept when at least two keywords appear in both texts, or when a
    /// digit group from the command shows up inside a transcript token.
    ///
    /// Spelled-out numbers ("two seven zero") never count as a numeric echo.
    #[must_use]
    pub fn evaluate_readback(&self, transcript: &str, command_text: &str) -> Verdict {
        let transcript_tokens = tokenize(transcript);
        let command_tokens = tokenize(command_text);
        let transcript_set: HashSet<&str> = transcript_tokens.iter().map(String::as_str).collect();
        let command_set: HashSet<&str> = command_tokens.iter().map(String::as_str).collect();

        let keyword_matches = READBACK_KEYWORDS
            .iter()
            .filter(|kw| command_set.contains(*kw) && transcript_set.contains(*kw))
            .count();

        let numeric_echo = command_tokens
            .iter()
            .filter(|token| token.chars().any(|c| c.is_ascii_digit()))
            .map(|token| token.chars().filter(char::is_ascii_digit).collect::<String>())
            .any(|digits| transcript_tokens.iter().any(|t| t.contains(&digits)));

        Verdict::from_bool(keyword_matches >= MIN_KEYWORD_MATCHES || numeric_echo)
    }

    /// Compare the first integer in the transcript with the parameter the
    /// question asks for. Only the first number is considered.
    #[must_use]
    pub fn evaluate_question_response(
        &self,
        transcript: &str,
        question_text: &str,
        state: &FlightState,
    ) -> Verdict {
        let question = question_text.to_lowercase();
        let (actual, tolerance) = if question.contains("speed") {
            (state.speed, SPEED_TOLERANCE_KT)
        } else if question.contains("altitude") {
            (state.altitude, ALTITUDE_TOLERANCE_FT)
        } else if question.contains("heading") {
            (state.heading, HEADING_TOLERANCE_DEG)
        } else {
            return Verdict::Rejected;
        };

        match first_number(transcript) {
            Some(reported) => Verdict::from_bool((reported - actual).abs() <= tolerance),
            None => Verdict::Rejected,
        }
    }
}

/// Lower-case whitespace tokens with surrounding punctuation removed.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| c.is_ascii_punctuation())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn first_number(text: &str) -> Option<f64> {
    FIRST_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|n| n as f64)
}
