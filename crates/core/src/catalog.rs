//! Phraseology tables and instruction selection.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::model::{Command, CommandCategory, FlightState, Question, QuestionKind};

/// When a phrase makes sense for the current aircraft state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Applicability {
    Always,
    /// Inclusive altitude band in feet.
    AltitudeBand { min: f64, max: f64 },
    SpeedAbove(f64),
    SpeedBelow(f64),
}

impl Applicability {
    #[must_use]
    pub fn applies(self, state: &FlightState) -> bool {
        match self {
            Applicability::Always => true,
            Applicability::AltitudeBand { min, max } => {
                state.altitude >= min && state.altitude <= max
            }
            Applicability::SpeedAbove(limit) => state.speed > limit,
            Applicability::SpeedBelow(limit) => state.speed < limit,
        }
    }
}

/// One instruction with its acceptable read-backs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phrase {
    pub text: &'static str,
    pub readbacks: [&'static str; 3],
    pub applicability: Applicability,
}

const fn phrase(
    text: &'static str,
    readbacks: [&'static str; 3],
    applicability: Applicability,
) -> Phrase {
    Phrase {
        text,
        readbacks,
        applicability,
    }
}

const fn band(min: f64, max: f64) -> Applicability {
    Applicability::AltitudeBand { min, max }
}

static ALTITUDE_PHRASES: [Phrase; 6] = [
    phrase(
        "Climb to flight level one eight zero",
        [
            "Climbing to flight level one eight zero",
            "Roger, climbing FL180",
            "Wilco, climb flight level one eight zero",
        ],
        band(0.0, 12_000.0),
    ),
    phrase(
        "Descend to five thousand feet",
        [
            "Descending to five thousand feet",
            "Wilco, descending five thousand",
            "Roger, down to five thousand",
        ],
        band(15_000.0, 99_999.0),
    ),
    phrase(
        "Maintain flight level two four zero",
        [
            "Maintaining flight level two four zero",
            "Roger, maintaining FL240",
            "Wilco, maintain two four zero",
        ],
        band(20_000.0, 26_000.0),
    ),
    phrase(
        "Climb to one zero thousand feet",
        [
            "Climbing to one zero thousand feet",
            "Roger, climbing ten thousand",
            "Wilco, climb ten thousand",
        ],
        band(0.0, 8_000.0),
    ),
    phrase(
        "Descend and maintain flight level one five zero",
        [
            "Descending and maintaining flight level one five zero",
            "Roger, descend FL150",
            "Wilco, maintain FL150",
        ],
        band(20_000.0, 40_000.0),
    ),
    phrase(
        "Climb and maintain flight level three one zero",
        [
            "Climbing and maintaining flight level three one zero",
            "Roger, climbing FL310",
            "Wilco, maintain FL310",
        ],
        band(15_000.0, 25_000.0),
    ),
];

static HEADING_PHRASES: [Phrase; 6] = [
    phrase(
        "Turn left heading two seven zero",
        [
            "Left heading two seven zero",
            "Roger, left heading two seven zero",
            "Wilco, heading two seven zero",
        ],
        Applicability::Always,
    ),
    phrase(
        "Turn right heading zero nine zero",
        [
            "Right heading zero nine zero",
            "Roger, right heading zero nine zero",
            "Wilco, heading zero nine zero",
        ],
        Applicability::Always,
    ),
    phrase(
        "Fly heading three six zero",
        [
            "Flying heading three six zero",
            "Roger, heading three six zero",
            "Wilco, three six zero",
        ],
        Applicability::Always,
    ),
    phrase(
        "Turn left heading one eight zero",
        [
            "Left heading one eight zero",
            "Roger, left heading one eight zero",
            "Wilco, heading one eight zero",
        ],
        Applicability::Always,
    ),
    phrase(
        "Proceed direct to waypoint ALPHA",
        [
            "Direct to ALPHA",
            "Roger, proceeding direct ALPHA",
            "Wilco, direct ALPHA",
        ],
        Applicability::Always,
    ),
    phrase(
        "Continue present heading",
        [
            "Continuing present heading",
            "Roger, present heading",
            "Wilco, continue heading",
        ],
        Applicability::Always,
    ),
];

/// Index of the speed phrase used when nothing else applies.
const DEFAULT_SPEED_PHRASE: usize = 2;

static SPEED_PHRASES: [Phrase; 5] = [
    phrase(
        "Reduce speed to two five zero knots",
        [
            "Reducing speed to two five zero knots",
            "Roger, reducing two five zero",
            "Wilco, speed two five zero",
        ],
        Applicability::SpeedAbove(280.0),
    ),
    phrase(
        "Increase speed to three zero zero knots",
        [
            "Increasing speed to three zero zero knots",
            "Roger, speeding up to three zero zero",
            "Wilco, three zero zero knots",
        ],
        Applicability::SpeedBelow(250.0),
    ),
    phrase(
        "Maintain present speed",
        [
            "Maintaining present speed",
            "Roger, maintaining speed",
            "Wilco, present speed",
        ],
        Applicability::Always,
    ),
    phrase(
        "Reduce to minimum clean speed",
        [
            "Reducing to minimum clean speed",
            "Roger, slowing to min clean",
            "Wilco, minimum clean speed",
        ],
        Applicability::SpeedAbove(200.0),
    ),
    phrase(
        "Increase to maximum cruise speed",
        [
            "Increasing to maximum cruise speed",
            "Roger, speeding up to max cruise",
            "Wilco, maximum cruise",
        ],
        Applicability::SpeedBelow(280.0),
    ),
];

static CLEARANCE_PHRASES: [Phrase; 8] = [
    phrase(
        "Cleared for ILS approach runway two seven",
        [
            "Cleared ILS approach runway two seven",
            "Roger, cleared ILS two seven",
            "Wilco, ILS approach runway two seven",
        ],
        Applicability::Always,
    ),
    phrase(
        "Contact tower on one one eight decimal one",
        [
            "Contacting tower one one eight decimal one",
            "Roger, switching one one eight decimal one",
            "Wilco, tower one one eight decimal one",
        ],
        Applicability::Always,
    ),
    phrase(
        "Squawk seven five zero zero",
        [
            "Squawking seven five zero zero",
            "Roger, squawk seven five zero zero",
            "Wilco, seven five zero zero",
        ],
        Applicability::Always,
    ),
    phrase(
        "Report established on the localizer",
        [
            "Will report established",
            "Roger, will report established",
            "Wilco, reporting established",
        ],
        Applicability::Always,
    ),
    phrase(
        "Cleared for takeoff runway three six",
        [
            "Cleared for takeoff runway three six",
            "Roger, cleared takeoff three six",
            "Wilco, taking off runway three six",
        ],
        Applicability::Always,
    ),
    phrase(
        "Cleared to land runway two eight",
        [
            "Cleared to land runway two eight",
            "Roger, cleared landing two eight",
            "Wilco, landing runway two eight",
        ],
        Applicability::Always,
    ),
    phrase(
        "Hold short of runway one eight",
        [
            "Holding short runway one eight",
            "Roger, hold short one eight",
            "Wilco, holding short runway one eight",
        ],
        Applicability::Always,
    ),
    phrase(
        "Line up and wait runway two seven",
        [
            "Lining up and waiting runway two seven",
            "Roger, line up and wait two seven",
            "Wilco, line up runway two seven",
        ],
        Applicability::Always,
    ),
];

/// Stateless instruction picker. All randomness comes from the caller's RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandCatalog;

impl CommandCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The phrase table for a category.
    #[must_use]
    pub fn phrases(&self, category: CommandCategory) -> &'static [Phrase] {
        match category {
            CommandCategory::Altitude => &ALTITUDE_PHRASES,
            CommandCategory::Heading => &HEADING_PHRASES,
            CommandCategory::Speed => &SPEED_PHRASES,
            CommandCategory::Clearance => &CLEARANCE_PHRASES,
        }
    }

    /// Phrases of `category` applicable to `state`, or the category default
    /// when none apply.
    #[must_use]
    pub fn candidates(&self, category: CommandCategory, state: &FlightState) -> Vec<&'static Phrase> {
        let table = self.phrases(category);
        let applicable: Vec<&'static Phrase> = table
            .iter()
            .filter(|p| p.applicability.applies(state))
            .collect();
        if !applicable.is_empty() {
            return applicable;
        }
        let fallback = match category {
            CommandCategory::Speed => &table[DEFAULT_SPEED_PHRASE],
            _ => &table[0],
        };
        vec![fallback]
    }

    /// Pick a category uniformly, then an applicable phrase and one read-back.
    pub fn select_command<R: Rng + ?Sized>(
        &self,
        state: &FlightState,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Command {
        let category = CommandCategory::ALL[rng.random_range(0..CommandCategory::ALL.len())];
        self.select_in_category(category, state, rng, now)
    }

    pub fn select_in_category<R: Rng + ?Sized>(
        &self,
        category: CommandCategory,
        state: &FlightState,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Command {
        let candidates = self.candidates(category, state);
        let chosen = candidates[rng.random_range(0..candidates.len())];
        let readback = chosen.readbacks[rng.random_range(0..chosen.readbacks.len())];
        Command::new(chosen.text, category, readback, now)
    }

    pub fn select_question<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> Question {
        let kind = QuestionKind::ALL[rng.random_range(0..QuestionKind::ALL.len())];
        Question::new(kind, now)
    }
}
