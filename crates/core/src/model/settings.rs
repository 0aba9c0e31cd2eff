use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_FLIGHT_TICK_MS: u64 = 2_000;
pub const DEFAULT_COMMAND_INTERVAL_MS: u64 = 20_000;
pub const DEFAULT_QUESTION_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_FEEDBACK_TTL_MS: u64 = 3_000;
pub const DEFAULT_INITIAL_COMMAND_DELAY_MS: u64 = 500;

/// Upper bound for any configured period (one hour).
const MAX_PERIOD_MS: u64 = 3_600_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("{field} must be between 1 and {MAX_PERIOD_MS} ms, got {value}")]
    InvalidPeriod { field: &'static str, value: u64 },
    #[error("initial command delay must not exceed {MAX_PERIOD_MS} ms, got {0}")]
    InvalidInitialDelay(u64),
    #[error("invalid transcription URL")]
    InvalidTranscriptionUrl,
}

/// Editable, serializable form of `TrainingSettings`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainingSettingsDraft {
    pub flight_tick_ms: u64,
    pub command_interval_ms: u64,
    pub question_interval_ms: u64,
    pub response_timeout_ms: u64,
    pub feedback_ttl_ms: u64,
    pub initial_command_delay_ms: u64,
    pub cross_check_enabled: bool,
    pub voice_feedback: bool,
    pub transcription_url: Option<String>,
}

impl Default for TrainingSettingsDraft {
    fn default() -> Self {
        Self {
            flight_tick_ms: DEFAULT_FLIGHT_TICK_MS,
            command_interval_ms: DEFAULT_COMMAND_INTERVAL_MS,
            question_interval_ms: DEFAULT_QUESTION_INTERVAL_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            feedback_ttl_ms: DEFAULT_FEEDBACK_TTL_MS,
            initial_command_delay_ms: DEFAULT_INITIAL_COMMAND_DELAY_MS,
            cross_check_enabled: true,
            voice_feedback: true,
            transcription_url: None,
        }
    }
}

impl TrainingSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if a period is zero or too large, or if the
    /// transcription URL is present but unparsable.
    pub fn validate(self) -> Result<TrainingSettings, SettingsError> {
        let flight_tick_ms = check_period("flight tick", self.flight_tick_ms)?;
        let command_interval_ms = check_period("command interval", self.command_interval_ms)?;
        let question_interval_ms = check_period("question interval", self.question_interval_ms)?;
        let response_timeout_ms = check_period("response timeout", self.response_timeout_ms)?;
        let feedback_ttl_ms = check_period("feedback lifetime", self.feedback_ttl_ms)?;
        if self.initial_command_delay_ms > MAX_PERIOD_MS {
            return Err(SettingsError::InvalidInitialDelay(
                self.initial_command_delay_ms,
            ));
        }

        let transcription_url = self
            .transcription_url
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty());
        if let Some(url) = transcription_url.as_ref() {
            if Url::parse(url).is_err() {
                return Err(SettingsError::InvalidTranscriptionUrl);
            }
        }

        Ok(TrainingSettings {
            flight_tick_ms,
            command_interval_ms,
            question_interval_ms,
            response_timeout_ms,
            feedback_ttl_ms,
            initial_command_delay_ms: self.initial_command_delay_ms,
            cross_check_enabled: self.cross_check_enabled,
            voice_feedback: self.voice_feedback,
            transcription_url,
        })
    }
}

fn check_period(field: &'static str, value: u64) -> Result<u64, SettingsError> {
    if value == 0 || value > MAX_PERIOD_MS {
        return Err(SettingsError::InvalidPeriod { field, value });
    }
    Ok(value)
}

/// Validated timer and feature configuration for the training engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrainingSettings {
    flight_tick_ms: u64,
    command_interval_ms: u64,
    question_interval_ms: u64,
    response_timeout_ms: u64,
    feedback_ttl_ms: u64,
    initial_command_delay_ms: u64,
    cross_check_enabled: bool,
    voice_feedback: bool,
    transcription_url: Option<String>,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        let d = TrainingSettingsDraft::default();
        Self {
            flight_tick_ms: d.flight_tick_ms,
            command_interval_ms: d.command_interval_ms,
            question_interval_ms: d.question_interval_ms,
            response_timeout_ms: d.response_timeout_ms,
            feedback_ttl_ms: d.feedback_ttl_ms,
            initial_command_delay_ms: d.initial_command_delay_ms,
            cross_check_enabled: d.cross_check_enabled,
            voice_feedback: d.voice_feedback,
            transcription_url: d.transcription_url,
        }
    }
}

impl TrainingSettings {
    /// Rehydrate settings from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the stored values no longer validate.
    pub fn from_persisted(draft: TrainingSettingsDraft) -> Result<Self, SettingsError> {
        draft.validate()
    }

    #[must_use]
    pub fn to_draft(&self) -> TrainingSettingsDraft {
        TrainingSettingsDraft {
            flight_tick_ms: self.flight_tick_ms,
            command_interval_ms: self.command_interval_ms,
            question_interval_ms: self.question_interval_ms,
            response_timeout_ms: self.response_timeout_ms,
            feedback_ttl_ms: self.feedback_ttl_ms,
            initial_command_delay_ms: self.initial_command_delay_ms,
            cross_check_enabled: self.cross_check_enabled,
            voice_feedback: self.voice_feedback,
            transcription_url: self.transcription_url.clone(),
        }
    }

    #[must_use]
    pub fn flight_tick(&self) -> Duration {
        millis(self.flight_tick_ms)
    }

    #[must_use]
    pub fn command_interval(&self) -> Duration {
        millis(self.command_interval_ms)
    }

    #[must_use]
    pub fn question_interval(&self) -> Duration {
        millis(self.question_interval_ms)
    }

    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        millis(self.response_timeout_ms)
    }

    #[must_use]
    pub fn feedback_ttl(&self) -> Duration {
        millis(self.feedback_ttl_ms)
    }

    #[must_use]
    pub fn initial_command_delay(&self) -> Duration {
        millis(self.initial_command_delay_ms)
    }

    #[must_use]
    pub fn cross_check_enabled(&self) -> bool {
        self.cross_check_enabled
    }

    #[must_use]
    pub fn voice_feedback(&self) -> bool {
        self.voice_feedback
    }

    #[must_use]
    pub fn transcription_url(&self) -> Option<&str> {
        self.transcription_url.as_deref()
    }
}

// Values are bounded by MAX_PERIOD_MS during validation.
fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}
