//! The training engine: one explicit object owning every piece of session
//! state.
//!
//! All methods are synchronous and return the events they produced. Side
//! effects such as persistence and speech are left to the caller (see
//! `runtime`).

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use atc_core::Clock;
use atc_core::catalog::CommandCatalog;
use atc_core::evaluator::ResponseEvaluator;
use atc_core::model::{
    FlightState, Instruction, Response, ResponseTarget, SessionRecord, Statistics,
    TrainingSettings,
};
use atc_core::simulator::FlightStateSimulator;

use crate::error::EngineError;
use crate::ledger::SessionLedger;
use crate::scheduler::{InstructionScheduler, SchedulerState, TimerKind};
use crate::snapshot::{Feedback, FeedbackKind, TrainingSnapshot};

/// Something the outside world may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SessionStarted { at: DateTime<Utc> },
    InstructionIssued(Instruction),
    /// The same instruction is spoken again, after a response timeout or
    /// one second after a rejected response.
    InstructionReplayed(Instruction),
    ResponseEvaluated { feedback: Feedback, points: i64 },
    SessionEnded { record: SessionRecord },
    StatisticsChanged(Statistics),
}

impl EngineEvent {
    /// Text to speak for this event, if any.
    #[must_use]
    pub fn announcement(&self) -> Option<&str> {
        match self {
            EngineEvent::InstructionIssued(i) | EngineEvent::InstructionReplayed(i) => {
                Some(i.text())
            }
            EngineEvent::ResponseEvaluated { feedback, .. } => Some(&feedback.message),
            _ => None,
        }
    }
}

pub struct TrainingEngine {
    clock: Clock,
    rng: StdRng,
    settings: TrainingSettings,
    simulator: FlightStateSimulator,
    catalog: CommandCatalog,
    evaluator: ResponseEvaluator,
    scheduler: InstructionScheduler,
    ledger: SessionLedger,
    feedback: Option<Feedback>,
}

impl TrainingEngine {
    #[must_use]
    pub fn new(clock: Clock, settings: TrainingSettings) -> Self {
        Self {
            clock,
            rng: StdRng::from_os_rng(),
            settings,
            simulator: FlightStateSimulator::new(FlightState::cruise()),
            catalog: CommandCatalog::new(),
            evaluator: ResponseEvaluator::new(),
            scheduler: InstructionScheduler::new(),
            ledger: SessionLedger::default(),
            feedback: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Seed lifetime statistics, typically loaded from storage.
    #[must_use]
    pub fn with_statistics(mut self, statistics: Statistics) -> Self {
        self.ledger = SessionLedger::new(statistics);
        self
    }

    //
    // ─── SESSION LIFECYCLE ─────────────────────────────────────────────────────
    //

    /// Begin a fresh session. A running session is ended and folded first.
    pub fn start_session(&mut self) -> Vec<EngineEvent> {
        let mut events = self.end_session();
        let now = self.clock.now();

        self.ledger.start(now);
        self.simulator.reset(FlightState::cruise());
        self.feedback = None;
        self.scheduler.start(now, &self.settings);
        info!(at = %now, "training session started");

        events.push(EngineEvent::SessionStarted { at: now });
        events.extend(self.poll());
        events
    }

    /// Stop all timers and fold the session into statistics.
    /// Calling this while idle does nothing.
    pub fn end_session(&mut self) -> Vec<EngineEvent> {
        if !self.scheduler.stop() {
            debug!("end_session ignored: no active session");
            return Vec::new();
        }
        let now = self.clock.now();
        let Some(record) = self.ledger.finalize(now) else {
            return Vec::new();
        };
        info!(
            score = record.score,
            accuracy = record.accuracy,
            commands = record.commands_completed,
            "training session ended"
        );
        vec![
            EngineEvent::SessionEnded { record },
            EngineEvent::StatisticsChanged(self.ledger.statistics().clone()),
        ]
    }

    //
    // ─── RESPONSES ─────────────────────────────────────────────────────────────
    //

    /// Evaluate a transcript against the outstanding instruction.
    ///
    /// Ignored when nothing is outstanding. Empty or garbled transcripts are
    /// simply rejected.
    pub fn submit_response(&mut self, transcript: &str) -> Vec<EngineEvent> {
        let Some(instruction) = self.scheduler.take_outstanding() else {
            debug!(state = ?self.scheduler.state(), "response ignored: nothing outstanding");
            return Vec::new();
        };
        let now = self.clock.now();

        let (target, verdict, kind) = match &instruction {
            Instruction::Command(command) => (
                ResponseTarget::Command(command.id),
                self.evaluator.evaluate_readback(transcript, &command.text),
                FeedbackKind::Readback,
            ),
            Instruction::Question(question) => (
                ResponseTarget::Question,
                self.evaluator.evaluate_question_response(
                    transcript,
                    &question.text,
                    &self.simulator.snapshot(),
                ),
                FeedbackKind::Answer,
            ),
        };

        let response = Response::new(target, transcript, verdict, instruction.issued_at(), now);
        let points = match self.ledger.record_response(response) {
            Ok(points) => points,
            Err(err) => {
                warn!(error = %err, "response not recorded");
                0
            }
        };
        info!(?verdict, points, instruction = instruction.text(), "response evaluated");

        if !verdict.is_accepted() {
            self.scheduler.schedule_repeat(instruction, now);
        }

        let feedback = Feedback::new(kind, verdict, now, self.settings.feedback_ttl());
        self.feedback = Some(feedback.clone());
        vec![EngineEvent::ResponseEvaluated { feedback, points }]
    }

    //
    // ─── TIMERS ────────────────────────────────────────────────────────────────
    //

    /// Fire every timer due at the current clock reading, oldest first.
    /// Instructions are stamped with the poll time.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();

        while let Some((kind, _)) = self.scheduler.pop_due(now) {
            match kind {
                TimerKind::FlightTick => {
                    self.simulator.tick(&mut self.rng);
                }
                TimerKind::ResponseTimeout => {
                    if let Some(instruction) = self.scheduler.outstanding() {
                        debug!(text = instruction.text(), "response timeout, replaying");
                        events.push(EngineEvent::InstructionReplayed(instruction.clone()));
                    }
                }
                TimerKind::Repeat => {
                    if let Some(instruction) = self.scheduler.take_repeat() {
                        debug!(text = instruction.text(), "repeating rejected instruction");
                        events.push(EngineEvent::InstructionReplayed(instruction));
                    }
                }
                TimerKind::CommandTrigger | TimerKind::QuestionTrigger => {
                    if !self.scheduler.is_armed() {
                        continue;
                    }
                    match self.issue(kind, now) {
                        Ok(instruction) => events.push(EngineEvent::InstructionIssued(instruction)),
                        Err(err) => warn!(error = %err, "instruction not issued"),
                    }
                }
            }
        }

        if self.feedback.as_ref().is_some_and(|f| f.is_expired(now)) {
            self.feedback = None;
        }
        events
    }

    /// Move a fixed clock forward and fire whatever became due.
    pub fn advance(&mut self, delta: Duration) -> Vec<EngineEvent> {
        self.clock.advance(delta);
        self.poll()
    }

    fn issue(&mut self, kind: TimerKind, at: DateTime<Utc>) -> Result<Instruction, EngineError> {
        let instruction = if kind == TimerKind::QuestionTrigger {
            Instruction::Question(self.catalog.select_question(&mut self.rng, at))
        } else {
            let state = self.simulator.snapshot();
            Instruction::Command(self.catalog.select_command(&state, &mut self.rng, at))
        };

        self.scheduler
            .issue(instruction.clone(), at, self.settings.response_timeout())?;
        let recorded = match &instruction {
            Instruction::Command(command) => self.ledger.record_command(command.clone()),
            Instruction::Question(question) => self.ledger.record_question(question.clone()),
        };
        recorded.map_err(atc_core::error::Error::from)?;
        info!(text = instruction.text(), "instruction issued");
        Ok(instruction)
    }

    //
    // ─── QUERIES & SETTINGS ────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn snapshot(&self) -> TrainingSnapshot {
        let now = self.clock.now();
        let outstanding = self.scheduler.outstanding().cloned();
        TrainingSnapshot {
            state: self.scheduler.state(),
            session: self.ledger.session().clone(),
            flight_state: self.simulator.snapshot(),
            is_waiting_for_response: outstanding.is_some(),
            outstanding_instruction: outstanding,
            last_feedback: self.feedback.clone().filter(|f| !f.is_expired(now)),
            statistics: self.ledger.statistics().clone(),
        }
    }

    /// Zero the lifetime statistics. The current session is untouched.
    pub fn reset_statistics(&mut self) -> Vec<EngineEvent> {
        self.ledger.reset_statistics();
        info!("statistics reset");
        vec![EngineEvent::StatisticsChanged(self.ledger.statistics().clone())]
    }

    /// Replace settings. Timer periods take effect at the next session start.
    pub fn apply_settings(&mut self, settings: TrainingSettings) {
        self.settings = settings;
    }

    #[must_use]
    pub fn settings(&self) -> &TrainingSettings {
        &self.settings
    }

    #[must_use]
    pub fn statistics(&self) -> &Statistics {
        self.ledger.statistics()
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }
}
