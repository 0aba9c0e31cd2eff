#![forbid(unsafe_code)]

pub mod app_services;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod runtime;
pub mod scheduler;
pub mod settings_service;
pub mod snapshot;
pub mod speech;
pub mod statistics_service;

pub use atc_core::Clock;

pub use app_services::AppServices;
pub use engine::{EngineEvent, TrainingEngine};
pub use error::{AppServicesError, EngineError, RuntimeError, SettingsServiceError, TranscriptionError};
pub use ledger::SessionLedger;
pub use runtime::{TrainingHandle, TrainingRuntime};
pub use scheduler::{InstructionScheduler, SchedulerState};
pub use settings_service::SettingsService;
pub use snapshot::{Feedback, FeedbackKind, TrainingSnapshot};
pub use speech::{Announcer, AudioClip, HttpTranscriber, LogAnnouncer, RecordingAnnouncer, SpeechToText};
pub use statistics_service::StatisticsService;
