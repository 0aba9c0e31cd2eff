//! Random-walk flight state.
//!
//! Not a flight model: each tick nudges every parameter by a bounded random
//! amount and re-clamps it.

use rand::Rng;

use crate::model::{FlightState, clamp_altitude, clamp_speed, normalize_heading};

/// Largest altitude change per tick, feet.
pub const ALTITUDE_STEP_FT: f64 = 50.0;
/// Largest heading change per tick, degrees.
pub const HEADING_STEP_DEG: f64 = 5.0;
/// Largest speed change per tick, knots.
pub const SPEED_STEP_KT: f64 = 10.0;
/// Vertical speed is resampled within this magnitude every tick, feet/minute.
pub const VERTICAL_SPEED_RANGE_FPM: f64 = 1_000.0;

#[derive(Debug, Clone, Default)]
pub struct FlightStateSimulator {
    state: FlightState,
}

impl FlightStateSimulator {
    #[must_use]
    pub fn new(state: FlightState) -> Self {
        Self { state }
    }

    /// Advance one interval and return the new state.
    pub fn tick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> FlightState {
        let s = &mut self.state;
        s.altitude = clamp_altitude(s.altitude + symmetric(rng, ALTITUDE_STEP_FT));
        s.heading = normalize_heading(s.heading + symmetric(rng, HEADING_STEP_DEG));
        s.speed = clamp_speed(s.speed + symmetric(rng, SPEED_STEP_KT));
        s.vertical_speed = symmetric(rng, VERTICAL_SPEED_RANGE_FPM);
        *s
    }

    #[must_use]
    pub fn snapshot(&self) -> FlightState {
        self.state
    }

    /// Put the aircraft back into the given state.
    pub fn reset(&mut self, state: FlightState) {
        self.state = state;
    }
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, magnitude: f64) -> f64 {
    rng.random_range(-magnitude..=magnitude)
}
