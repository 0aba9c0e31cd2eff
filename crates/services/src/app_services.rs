use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use atc_core::model::Statistics;
use storage::repository::Storage;

use crate::engine::TrainingEngine;
use crate::error::{AppServicesError, RuntimeError};
use crate::runtime::{TrainingHandle, TrainingRuntime};
use crate::settings_service::SettingsService;
use crate::speech::{Announcer, HttpTranscriber, SpeechToText};
use crate::statistics_service::StatisticsService;
use crate::Clock;

/// Wires storage, persistence services and the training runtime together.
pub struct AppServices {
    training: TrainingHandle,
    runtime_task: JoinHandle<()>,
    statistics: Arc<StatisticsService>,
    settings: Arc<SettingsService>,
    transcriber: Arc<dyn SpeechToText>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        seed: Option<u64>,
        announcer: Arc<dyn Announcer>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, seed, announcer).await)
    }

    /// Build services over throwaway in-memory storage.
    pub async fn in_memory(clock: Clock, seed: Option<u64>, announcer: Arc<dyn Announcer>) -> Self {
        Self::from_storage(Storage::in_memory(), clock, seed, announcer).await
    }

    /// Load settings and statistics once, then spawn the runtime.
    pub async fn from_storage(
        storage: Storage,
        clock: Clock,
        seed: Option<u64>,
        announcer: Arc<dyn Announcer>,
    ) -> Self {
        let statistics = Arc::new(StatisticsService::new(Arc::clone(&storage.statistics)));
        let settings = Arc::new(SettingsService::new(Arc::clone(&storage.settings)));

        let loaded_settings = settings.load_or_default().await;
        let loaded_stats = statistics.load_or_default().await;
        info!(
            sessions = loaded_stats.sessions_completed,
            total_score = loaded_stats.total_score,
            "statistics loaded"
        );

        let mut engine = TrainingEngine::new(clock, loaded_settings).with_statistics(loaded_stats);
        if let Some(seed) = seed {
            engine = engine.with_seed(seed);
        }

        let (training, runtime_task) = TrainingRuntime::spawn(
            engine,
            StatisticsService::clone(&statistics),
            SettingsService::clone(&settings),
            announcer,
        );
        let transcriber: Arc<dyn SpeechToText> =
            Arc::new(HttpTranscriber::new(training.watch_settings()));

        Self {
            training,
            runtime_task,
            statistics,
            settings,
            transcriber,
        }
    }

    #[must_use]
    pub fn training(&self) -> TrainingHandle {
        self.training.clone()
    }

    #[must_use]
    pub fn statistics(&self) -> Arc<StatisticsService> {
        Arc::clone(&self.statistics)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }

    #[must_use]
    pub fn transcriber(&self) -> Arc<dyn SpeechToText> {
        Arc::clone(&self.transcriber)
    }

    /// End any running session, stop the runtime and wait for it.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` if the runtime was already gone.
    pub async fn shutdown(self) -> Result<Statistics, RuntimeError> {
        let stats = self.training.shutdown().await?;
        let _ = self.runtime_task.await;
        Ok(stats)
    }
}
