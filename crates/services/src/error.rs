//! Shared error types for the services crate.

use thiserror::Error;

use atc_core::model::SettingsError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `SettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by speech-to-text clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TranscriptionError {
    #[error("speech-to-text is not configured")]
    Disabled,
    #[error("speech-to-text returned an empty transcript")]
    EmptyResponse,
    #[error("speech-to-text request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `TrainingHandle` when talking to the runtime task.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error("training runtime has shut down")]
    Closed,
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

/// Internal engine failures. Logged by the engine, never surfaced to callers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] atc_core::error::Error),
    #[error(transparent)]
    Slot(#[from] crate::scheduler::SlotError),
}
