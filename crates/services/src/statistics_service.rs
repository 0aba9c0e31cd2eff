use std::sync::Arc;

use tracing::warn;

use atc_core::model::Statistics;
use storage::repository::{StatisticsRepository, StorageError};

/// Loads statistics once and writes them back after every change.
///
/// Failures are logged and swallowed; the in-memory copy stays authoritative.
#[derive(Clone)]
pub struct StatisticsService {
    repo: Arc<dyn StatisticsRepository>,
}

impl StatisticsService {
    #[must_use]
    pub fn new(repo: Arc<dyn StatisticsRepository>) -> Self {
        Self { repo }
    }

    /// Persisted statistics, or zeroes when missing or unreadable.
    pub async fn load_or_default(&self) -> Statistics {
        match self.repo.load_statistics().await {
            Ok(stats) => stats.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "failed to load statistics, starting from zero");
                Statistics::default()
            }
        }
    }

    /// Write statistics, logging instead of failing.
    pub async fn persist(&self, stats: &Statistics) {
        if let Err(err) = self.try_persist(stats).await {
            warn!(error = %err, "failed to persist statistics");
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` when the write fails.
    pub async fn try_persist(&self, stats: &Statistics) -> Result<(), StorageError> {
        self.repo.save_statistics(stats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use storage::repository::{InMemoryRepository, KeyValueStore, STATISTICS_KEY};

    struct Broken;

    #[async_trait]
    impl StatisticsRepository for Broken {
        async fn load_statistics(&self) -> Result<Option<Statistics>, StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn save_statistics(&self, _stats: &Statistics) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }
    }

    #[tokio::test]
    async fn broken_store_falls_back_to_defaults() {
        let service = StatisticsService::new(Arc::new(Broken));
        assert_eq!(service.load_or_default().await, Statistics::default());
        service.persist(&Statistics::default()).await;
        assert!(service.try_persist(&Statistics::default()).await.is_err());
    }

    #[tokio::test]
    async fn corrupt_payload_loads_as_default() {
        let store = InMemoryRepository::new();
        store.put(STATISTICS_KEY, "not json").await.unwrap();
        let service = StatisticsService::new(Arc::new(store));
        assert!(service.load_or_default().await.is_empty());
    }
}
