use serde::{Deserialize, Serialize};

/// Lowest indicated airspeed the simulator will report, in knots.
pub const MIN_SPEED_KT: f64 = 200.0;
/// Highest indicated airspeed the simulator will report, in knots.
pub const MAX_SPEED_KT: f64 = 500.0;

/// Snapshot of the simulated aircraft.
///
/// Values are kept valid by construction: altitude is never negative,
/// heading lives in `[0, 360)` and speed in `[MIN_SPEED_KT, MAX_SPEED_KT]`.
/// Vertical speed is not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightState {
    /// Feet above mean sea level.
    pub altitude: f64,
    /// Degrees magnetic.
    pub heading: f64,
    /// Knots.
    pub speed: f64,
    /// Feet per minute, positive when climbing.
    pub vertical_speed: f64,
}

impl FlightState {
    /// Builds a state, normalizing each field into its valid range.
    #[must_use]
    pub fn new(altitude: f64, heading: f64, speed: f64, vertical_speed: f64) -> Self {
        Self {
            altitude: clamp_altitude(altitude),
            heading: normalize_heading(heading),
            speed: clamp_speed(speed),
            vertical_speed,
        }
    }

    /// Cruise state every session starts from.
    #[must_use]
    pub fn cruise() -> Self {
        Self::new(37_000.0, 270.0, 450.0, 0.0)
    }

    /// Returns true when every field sits inside its documented range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.altitude >= 0.0
            && (0.0..360.0).contains(&self.heading)
            && (MIN_SPEED_KT..=MAX_SPEED_KT).contains(&self.speed)
    }
}

impl Default for FlightState {
    fn default() -> Self {
        Self::cruise()
    }
}

/// Wraps any finite heading into `[0, 360)`.
#[must_use]
pub fn normalize_heading(heading: f64) -> f64 {
    let wrapped = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[must_use]
pub fn clamp_speed(speed: f64) -> f64 {
    speed.clamp(MIN_SPEED_KT, MAX_SPEED_KT)
}

#[must_use]
pub fn clamp_altitude(altitude: f64) -> f64 {
    altitude.max(0.0)
}
