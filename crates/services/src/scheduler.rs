//! Timer bookkeeping and the instruction slot.
//!
//! The scheduler never reads the wall clock. Callers pass `now` to
//! [`InstructionScheduler::pop_due`] and handle each returned trigger before
//! asking for the next one, so every transition runs serially.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use atc_core::model::{Instruction, TrainingSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Armed,
    AwaitingResponse,
    QuestionAwaiting,
}

/// Delay before a rejected instruction is spoken again.
pub const REPEAT_DELAY_MS: i64 = 1_000;

/// Timers in tie-break order: when two fire at the same instant the
/// earlier variant runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKind {
    FlightTick,
    ResponseTimeout,
    /// One-shot re-announcement after a rejected response.
    Repeat,
    CommandTrigger,
    QuestionTrigger,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SlotError {
    #[error("no active session")]
    Inactive,
    #[error("instruction slot already occupied")]
    Occupied,
}

/// Periodic timer on a fixed grid `origin + k * period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    due: DateTime<Utc>,
    origin: DateTime<Utc>,
    period: Duration,
}

impl Timer {
    fn new(origin: DateTime<Utc>, first_in: Duration, period: Duration) -> Self {
        Self {
            due: origin + first_in,
            origin,
            period,
        }
    }

    /// Move to the first grid point after `now`. Firings missed while the
    /// process was suspended collapse into the one just handled.
    fn rearm(&mut self, now: DateTime<Utc>) {
        let period_ms = self.period.num_milliseconds().max(1);
        let elapsed_ms = (now.max(self.due) - self.origin).num_milliseconds();
        let steps = elapsed_ms.div_euclid(period_ms) + 1;
        self.due = self.origin + Duration::milliseconds(steps * period_ms);
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstructionScheduler {
    active: bool,
    slot: Option<Instruction>,
    flight_tick: Option<Timer>,
    command_trigger: Option<Timer>,
    question_trigger: Option<Timer>,
    response_timeout: Option<Timer>,
    repeat_at: Option<DateTime<Utc>>,
    repeat: Option<Instruction>,
}

impl InstructionScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle → Armed. Arms the flight tick and both instruction triggers.
    ///
    /// The command trigger fires once after the initial delay and then on
    /// every multiple of the command interval counted from `now`.
    pub fn start(&mut self, now: DateTime<Utc>, settings: &TrainingSettings) {
        self.active = true;
        self.slot = None;
        self.response_timeout = None;
        self.cancel_repeat();
        self.flight_tick = Some(Timer::new(
            now,
            settings.flight_tick(),
            settings.flight_tick(),
        ));
        self.command_trigger = Some(Timer::new(
            now,
            settings.initial_command_delay(),
            settings.command_interval(),
        ));
        self.question_trigger = settings.cross_check_enabled().then(|| {
            Timer::new(
                now,
                settings.question_interval(),
                settings.question_interval(),
            )
        });
    }

    /// Any state → Idle. Cancels every timer. Returns false if already idle.
    pub fn stop(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.slot = None;
        self.flight_tick = None;
        self.command_trigger = None;
        self.question_trigger = None;
        self.response_timeout = None;
        self.cancel_repeat();
        was_active
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        if !self.active {
            return SchedulerState::Idle;
        }
        match &self.slot {
            None => SchedulerState::Armed,
            Some(Instruction::Command(_)) => SchedulerState::AwaitingResponse,
            Some(Instruction::Question(_)) => SchedulerState::QuestionAwaiting,
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state() == SchedulerState::Armed
    }

    #[must_use]
    pub fn outstanding(&self) -> Option<&Instruction> {
        self.slot.as_ref()
    }

    /// Put an instruction in the empty slot and start the response timeout.
    /// A pending repeat of the previous instruction is dropped.
    ///
    /// # Errors
    ///
    /// Returns `SlotError::Inactive` when idle and `SlotError::Occupied`
    /// when another instruction is outstanding.
    pub fn issue(
        &mut self,
        instruction: Instruction,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<(), SlotError> {
        if !self.active {
            return Err(SlotError::Inactive);
        }
        if self.slot.is_some() {
            return Err(SlotError::Occupied);
        }
        self.cancel_repeat();
        self.slot = Some(instruction);
        self.response_timeout = Some(Timer::new(now, timeout, timeout));
        Ok(())
    }

    /// Clear the slot and cancel the response timeout.
    pub fn take_outstanding(&mut self) -> Option<Instruction> {
        self.response_timeout = None;
        self.slot.take()
    }

    /// Arm the one-shot repeat of an answered instruction.
    pub fn schedule_repeat(&mut self, instruction: Instruction, now: DateTime<Utc>) {
        if !self.active {
            return;
        }
        self.repeat_at = Some(now + Duration::milliseconds(REPEAT_DELAY_MS));
        self.repeat = Some(instruction);
    }

    /// The instruction to repeat once `TimerKind::Repeat` has fired.
    pub fn take_repeat(&mut self) -> Option<Instruction> {
        if self.repeat_at.is_some() {
            return None;
        }
        self.repeat.take()
    }

    /// Earliest pending due time, if any timer is armed.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.timers().map(|(_, due)| due).min()
    }

    /// Pop the earliest timer due at or before `now`.
    ///
    /// Periodic timers move to their next grid point after `now`. The
    /// response timeout restarts from `now`. The repeat timer is disarmed.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<(TimerKind, DateTime<Utc>)> {
        let (kind, due) = self
            .timers()
            .filter(|(_, due)| *due <= now)
            .min_by_key(|(kind, due)| (*due, *kind))?;

        if kind == TimerKind::Repeat {
            self.repeat_at = None;
        } else if let Some(timer) = self.timer_mut(kind) {
            if kind == TimerKind::ResponseTimeout {
                timer.origin = now;
            }
            timer.rearm(now);
        }
        Some((kind, due))
    }

    fn cancel_repeat(&mut self) {
        self.repeat_at = None;
        self.repeat = None;
    }

    fn timers(&self) -> impl Iterator<Item = (TimerKind, DateTime<Utc>)> + '_ {
        [
            (TimerKind::FlightTick, self.flight_tick.map(|t| t.due)),
            (TimerKind::ResponseTimeout, self.response_timeout.map(|t| t.due)),
            (TimerKind::Repeat, self.repeat_at),
            (TimerKind::CommandTrigger, self.command_trigger.map(|t| t.due)),
            (TimerKind::QuestionTrigger, self.question_trigger.map(|t| t.due)),
        ]
        .into_iter()
        .filter_map(|(kind, due)| due.map(|d| (kind, d)))
    }

    fn timer_mut(&mut self, kind: TimerKind) -> Option<&mut Timer> {
        match kind {
            TimerKind::FlightTick => self.flight_tick.as_mut(),
            TimerKind::ResponseTimeout => self.response_timeout.as_mut(),
            TimerKind::CommandTrigger => self.command_trigger.as_mut(),
            TimerKind::QuestionTrigger => self.question_trigger.as_mut(),
            TimerKind::Repeat => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atc_core::model::{Question, QuestionKind, TrainingSettingsDraft};
    use atc_core::time::fixed_now;

    fn drain(s: &mut InstructionScheduler, now: DateTime<Utc>) -> Vec<TimerKind> {
        std::iter::from_fn(|| s.pop_due(now).map(|(k, _)| k)).collect()
    }

    /// Drain every half second from `from` through `to`.
    fn run(s: &mut InstructionScheduler, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<TimerKind> {
        let mut fired = Vec::new();
        let mut t = from;
        while t <= to {
            fired.extend(drain(s, t));
            t += Duration::milliseconds(500);
        }
        fired
    }

    fn question(now: DateTime<Utc>) -> Instruction {
        Instruction::Question(Question::new(QuestionKind::ReportHeading, now))
    }

    fn quiet_settings() -> TrainingSettings {
        TrainingSettingsDraft {
            flight_tick_ms: 3_600_000,
            cross_check_enabled: false,
            ..TrainingSettingsDraft::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn starts_idle_and_arms_on_start() {
        let mut s = InstructionScheduler::new();
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(s.pop_due(fixed_now()).is_none());

        s.start(fixed_now(), &TrainingSettings::default());
        assert_eq!(s.state(), SchedulerState::Armed);
        assert_eq!(
            s.next_due(),
            Some(fixed_now() + Duration::milliseconds(500))
        );
    }

    #[test]
    fn timers_fire_in_order_with_tie_break() {
        let start = fixed_now();
        let mut s = InstructionScheduler::new();
        s.start(start, &TrainingSettings::default());

        // 0.5s command, 2s tick
        assert_eq!(
            drain(&mut s, start + Duration::seconds(2)),
            vec![TimerKind::CommandTrigger, TimerKind::FlightTick]
        );
        // up to 30s: ticks at 4..30 (14), command at 20, question at 30
        let fired = run(
            &mut s,
            start + Duration::milliseconds(2_500),
            start + Duration::seconds(30),
        );
        assert_eq!(fired.iter().filter(|k| **k == TimerKind::FlightTick).count(), 14);
        assert_eq!(fired.iter().filter(|k| **k == TimerKind::CommandTrigger).count(), 1);
        // tick at 30 beats the question at 30
        assert_eq!(
            &fired[fired.len() - 2..],
            &[TimerKind::FlightTick, TimerKind::QuestionTrigger]
        );
    }

    #[test]
    fn command_trigger_keeps_interval_grid_after_first_delay() {
        let now = fixed_now();
        let mut s = InstructionScheduler::new();
        s.start(now, &quiet_settings());

        let offsets: Vec<_> = [500, 20_000, 40_000]
            .into_iter()
            .map(|ms| {
                s.pop_due(now + Duration::milliseconds(ms))
                    .map(|(kind, due)| (kind, due - now))
            })
            .collect();
        assert_eq!(
            offsets,
            vec![
                Some((TimerKind::CommandTrigger, Duration::milliseconds(500))),
                Some((TimerKind::CommandTrigger, Duration::seconds(20))),
                Some((TimerKind::CommandTrigger, Duration::seconds(40))),
            ]
        );
    }

    #[test]
    fn slot_is_exclusive() {
        let now = fixed_now();
        let mut s = InstructionScheduler::new();
        assert_eq!(
            s.issue(question(now), now, Duration::seconds(15)),
            Err(SlotError::Inactive)
        );
        s.start(now, &TrainingSettings::default());
        s.issue(question(now), now, Duration::seconds(15)).unwrap();
        assert_eq!(s.state(), SchedulerState::QuestionAwaiting);
        assert_eq!(
            s.issue(question(now), now, Duration::seconds(15)),
            Err(SlotError::Occupied)
        );
        assert!(s.take_outstanding().is_some());
        assert_eq!(s.state(), SchedulerState::Armed);
        assert!(s.take_outstanding().is_none());
    }

    #[test]
    fn response_timeout_restarts_and_is_cancelled_on_take() {
        let now = fixed_now();
        let settings = TrainingSettingsDraft {
            flight_tick_ms: 3_600_000,
            initial_command_delay_ms: 3_600_000,
            cross_check_enabled: false,
            ..TrainingSettingsDraft::default()
        }
        .validate()
        .unwrap();
        let mut s = InstructionScheduler::new();
        s.start(now, &settings);
        s.issue(question(now), now, Duration::seconds(15)).unwrap();

        assert_eq!(
            run(&mut s, now, now + Duration::seconds(31)),
            vec![TimerKind::ResponseTimeout, TimerKind::ResponseTimeout]
        );
        assert_eq!(s.next_due(), Some(now + Duration::seconds(45)));

        s.take_outstanding();
        assert!(drain(&mut s, now + Duration::seconds(60)).is_empty());
    }

    #[test]
    fn missed_firings_collapse_after_a_clock_jump() {
        let now = fixed_now();
        let mut s = InstructionScheduler::new();
        s.start(now, &TrainingSettings::default());
        s.issue(question(now), now, Duration::seconds(15)).unwrap();

        let later = now + Duration::minutes(5);
        assert_eq!(
            drain(&mut s, later),
            vec![
                TimerKind::CommandTrigger,
                TimerKind::FlightTick,
                TimerKind::ResponseTimeout,
                TimerKind::QuestionTrigger,
            ]
        );
        // next tick on the 2s grid, timeout restarted from the late poll
        assert_eq!(s.next_due(), Some(later + Duration::seconds(2)));
        assert_eq!(
            run(&mut s, later, later + Duration::seconds(15))
                .iter()
                .filter(|k| **k == TimerKind::ResponseTimeout)
                .count(),
            1
        );
    }

    #[test]
    fn repeat_fires_once_and_yields_to_new_instructions() {
        let now = fixed_now();
        let mut s = InstructionScheduler::new();
        s.start(now, &quiet_settings());

        s.schedule_repeat(question(now), now);
        assert!(s.take_repeat().is_none());
        assert_eq!(drain(&mut s, now + Duration::milliseconds(999)), vec![TimerKind::CommandTrigger]);
        assert_eq!(drain(&mut s, now + Duration::seconds(1)), vec![TimerKind::Repeat]);
        assert!(s.take_repeat().is_some());
        assert!(s.take_repeat().is_none());

        s.schedule_repeat(question(now), now);
        s.issue(question(now), now, Duration::seconds(15)).unwrap();
        assert!(!drain(&mut s, now + Duration::seconds(2)).contains(&TimerKind::Repeat));
        assert!(s.take_repeat().is_none());
    }

    #[test]
    fn stop_cancels_everything() {
        let now = fixed_now();
        let mut s = InstructionScheduler::new();
        s.start(now, &TrainingSettings::default());
        s.issue(question(now), now, Duration::seconds(15)).unwrap();
        s.take_outstanding();
        s.schedule_repeat(question(now), now);
        assert!(s.stop());
        assert!(!s.stop());
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(s.outstanding().is_none());
        assert!(s.next_due().is_none());
        assert!(drain(&mut s, now + Duration::hours(1)).is_empty());
        assert!(s.take_repeat().is_none());
    }

    #[test]
    fn disabled_cross_check_never_fires_questions() {
        let now = fixed_now();
        let settings = TrainingSettingsDraft {
            cross_check_enabled: false,
            ..TrainingSettingsDraft::default()
        }
        .validate()
        .unwrap();
        let mut s = InstructionScheduler::new();
        s.start(now, &settings);
        assert!(!run(&mut s, now, now + Duration::minutes(5)).contains(&TimerKind::QuestionTrigger));
    }
}
