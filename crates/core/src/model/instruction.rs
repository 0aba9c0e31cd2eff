use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::CommandId;

//
// ─── COMMAND ──────────────────────────────────────────────────────────────────
//

/// Family an ATC instruction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    Altitude,
    Heading,
    Speed,
    Clearance,
}

impl CommandCategory {
    pub const ALL: [CommandCategory; 4] = [
        CommandCategory::Altitude,
        CommandCategory::Heading,
        CommandCategory::Speed,
        CommandCategory::Clearance,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommandCategory::Altitude => "altitude",
            CommandCategory::Heading => "heading",
            CommandCategory::Speed => "speed",
            CommandCategory::Clearance => "clearance",
        }
    }
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An instruction the trainee must read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub text: String,
    pub category: CommandCategory,
    /// One acceptable read-back, shown as a hint.
    pub expected_response: String,
    pub issued_at: DateTime<Utc>,
}

impl Command {
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        category: CommandCategory,
        expected_response: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CommandId::new_v4(),
            text: text.into(),
            category,
            expected_response: expected_response.into(),
            issued_at,
        }
    }
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// Which flight parameter a cross-check question asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    ReportSpeed,
    ReportAltitude,
    ReportHeading,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 3] = [
        QuestionKind::ReportSpeed,
        QuestionKind::ReportAltitude,
        QuestionKind::ReportHeading,
    ];

    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            QuestionKind::ReportSpeed => "What is your current speed?",
            QuestionKind::ReportAltitude => "What is your current altitude?",
            QuestionKind::ReportHeading => "What is your current heading?",
        }
    }
}

/// A comprehension prompt asking for a current flight parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub kind: QuestionKind,
    pub text: String,
    pub issued_at: DateTime<Utc>,
}

impl Question {
    #[must_use]
    pub fn new(kind: QuestionKind, issued_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            text: kind.text().to_string(),
            issued_at,
        }
    }
}

//
// ─── INSTRUCTION SLOT CONTENT ─────────────────────────────────────────────────
//

/// Whatever currently occupies the single instruction slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    Command(Command),
    Question(Question),
}

impl Instruction {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Instruction::Command(command) => &command.text,
            Instruction::Question(question) => &question.text,
        }
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        match self {
            Instruction::Command(command) => command.issued_at,
            Instruction::Question(question) => question.issued_at,
        }
    }
}
