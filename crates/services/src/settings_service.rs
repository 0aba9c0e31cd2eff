use std::sync::Arc;

use tracing::warn;

use atc_core::model::TrainingSettings;
use storage::repository::{SettingsRepository, StorageError};

use crate::error::SettingsServiceError;

/// Loads settings at startup and writes them back after every update.
///
/// Write failures are logged; the settings applied in memory stay in force.
#[derive(Clone)]
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    #[must_use]
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    /// Load persisted settings (or defaults if missing).
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError` on storage failures.
    pub async fn load(&self) -> Result<TrainingSettings, SettingsServiceError> {
        let settings = self.repo.load_settings().await?;
        Ok(settings.unwrap_or_default())
    }

    /// Like [`Self::load`], but logs failures and falls back to defaults.
    pub async fn load_or_default(&self) -> TrainingSettings {
        self.load().await.unwrap_or_else(|err| {
            warn!(error = %err, "failed to load settings, using defaults");
            TrainingSettings::default()
        })
    }

    /// Write settings, logging instead of failing.
    pub async fn persist(&self, settings: &TrainingSettings) {
        if let Err(err) = self.try_persist(settings).await {
            warn!(error = %err, "failed to persist settings");
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` when the write fails.
    pub async fn try_persist(&self, settings: &TrainingSettings) -> Result<(), StorageError> {
        self.repo.save_settings(settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atc_core::model::TrainingSettingsDraft;
    use storage::repository::InMemoryRepository;

    struct ReadOnly;

    #[async_trait]
    impl SettingsRepository for ReadOnly {
        async fn load_settings(&self) -> Result<Option<TrainingSettings>, StorageError> {
            Ok(None)
        }

        async fn save_settings(&self, _settings: &TrainingSettings) -> Result<(), StorageError> {
            Err(StorageError::Connection("read-only".into()))
        }
    }

    #[tokio::test]
    async fn missing_settings_load_as_defaults() {
        let service = SettingsService::new(Arc::new(InMemoryRepository::new()));
        assert_eq!(service.load().await.unwrap(), TrainingSettings::default());
    }

    #[tokio::test]
    async fn persisted_settings_round_trip() {
        let service = SettingsService::new(Arc::new(InMemoryRepository::new()));
        let settings = TrainingSettingsDraft {
            feedback_ttl_ms: 5_000,
            ..TrainingSettingsDraft::default()
        }
        .validate()
        .unwrap();
        service.persist(&settings).await;
        assert_eq!(service.load_or_default().await, settings);
        assert_eq!(settings.feedback_ttl(), chrono::Duration::seconds(5));
    }

    #[tokio::test]
    async fn failed_writes_are_swallowed_by_persist() {
        let service = SettingsService::new(Arc::new(ReadOnly));
        let settings = TrainingSettings::default();
        assert!(service.try_persist(&settings).await.is_err());
        service.persist(&settings).await;
        assert_eq!(service.load().await.unwrap(), settings);
    }
}
