mod flight;
mod ids;
mod instruction;
mod response;
mod session;
mod settings;
mod statistics;

pub use flight::{
    FlightState, MAX_SPEED_KT, MIN_SPEED_KT, clamp_altitude, clamp_speed, normalize_heading,
};
pub use ids::CommandId;
pub use instruction::{Command, CommandCategory, Instruction, Question, QuestionKind};
pub use response::{Response, ResponseTarget, Verdict};
pub use session::{
    COMMAND_READBACK_POINTS, QUESTION_ANSWER_POINTS, Session, SessionError, percent,
};
pub use settings::{
    DEFAULT_COMMAND_INTERVAL_MS, DEFAULT_FEEDBACK_TTL_MS, DEFAULT_FLIGHT_TICK_MS,
    DEFAULT_INITIAL_COMMAND_DELAY_MS, DEFAULT_QUESTION_INTERVAL_MS, DEFAULT_RESPONSE_TIMEOUT_MS,
    SettingsError, TrainingSettings, TrainingSettingsDraft,
};
pub use statistics::{RECENT_SESSIONS_CAP, SessionRecord, Statistics};
