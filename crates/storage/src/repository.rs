use async_trait::async_trait;
use atc_core::model::{Statistics, TrainingSettings, TrainingSettingsDraft};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Key holding lifetime statistics as JSON.
pub const STATISTICS_KEY: &str = "pilotTrainingStats";
/// Key holding tunable training settings as JSON.
pub const SETTINGS_KEY: &str = "pilotTrainingSettings";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Insert or replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the value cannot be written.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait StatisticsRepository: Send + Sync {
    /// Load persisted statistics, `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read or decode failures.
    async fn load_statistics(&self) -> Result<Option<Statistics>, StorageError>;

    /// Replace persisted statistics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on encode or write failures.
    async fn save_statistics(&self, stats: &Statistics) -> Result<(), StorageError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Load persisted settings, `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read, decode, or validation failures.
    async fn load_settings(&self) -> Result<Option<TrainingSettings>, StorageError>;

    /// Replace persisted settings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on encode or write failures.
    async fn save_settings(&self, settings: &TrainingSettings) -> Result<(), StorageError>;
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> StatisticsRepository for T {
    async fn load_statistics(&self) -> Result<Option<Statistics>, StorageError> {
        let Some(raw) = self.get(STATISTICS_KEY).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(ser)
    }

    async fn save_statistics(&self, stats: &Statistics) -> Result<(), StorageError> {
        let raw = serde_json::to_string(stats).map_err(ser)?;
        self.put(STATISTICS_KEY, &raw).await
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> SettingsRepository for T {
    async fn load_settings(&self) -> Result<Option<TrainingSettings>, StorageError> {
        let Some(raw) = self.get(SETTINGS_KEY).await? else {
            return Ok(None);
        };
        let draft: TrainingSettingsDraft = serde_json::from_str(&raw).map_err(ser)?;
        TrainingSettings::from_persisted(draft).map(Some).map_err(ser)
    }

    async fn save_settings(&self, settings: &TrainingSettings) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&settings.to_draft()).map_err(ser)?;
        self.put(SETTINGS_KEY, &raw).await
    }
}

/// Simple in-memory store for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// Typed repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub statistics: Arc<dyn StatisticsRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_store(InMemoryRepository::new())
    }

    /// Share one key-value backend between both repositories.
    #[must_use]
    pub fn from_store<S: KeyValueStore + Clone + 'static>(store: S) -> Self {
        let statistics: Arc<dyn StatisticsRepository> = Arc::new(store.clone());
        let settings: Arc<dyn SettingsRepository> = Arc::new(store);
        Self {
            statistics,
            settings,
        }
    }
}
