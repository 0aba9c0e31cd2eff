use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atc_core::model::{Statistics, TrainingSettings, TrainingSettingsDraft};
use services::{
    Announcer, AppServices, AudioClip, Clock, RecordingAnnouncer, RuntimeError,
    TranscriptionError,
};
use storage::repository::{
    InMemoryRepository, SettingsRepository, StatisticsRepository, Storage, StorageError,
};
use storage::sqlite::SqliteRepository;

fn immediate_commands() -> TrainingSettingsDraft {
    TrainingSettingsDraft {
        initial_command_delay_ms: 0,
        cross_check_enabled: false,
        ..TrainingSettingsDraft::default()
    }
}

async fn seeded_storage(store: InMemoryRepository) -> Storage {
    let storage = Storage::from_store(store);
    storage
        .settings
        .save_settings(&immediate_commands().validate().unwrap())
        .await
        .unwrap();
    storage
}

/// Wait until the speaker task has spoken `text`.
async fn spoken_soon(announcer: &RecordingAnnouncer, text: &str) -> bool {
    for _ in 0..100 {
        if announcer.spoken().iter().any(|spoken| spoken == text) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn runtime_session_round_trip_persists_statistics() {
    let store = InMemoryRepository::new();
    let announcer = RecordingAnnouncer::new();
    let app = AppServices::from_storage(
        seeded_storage(store.clone()).await,
        Clock::system(),
        Some(3),
        Arc::new(announcer.clone()),
    )
    .await;
    let training = app.training();

    let snap = training.start_session().await.unwrap();
    assert!(snap.is_waiting_for_response);
    let text = snap.outstanding_instruction.unwrap().text().to_string();
    assert!(spoken_soon(&announcer, &text).await);

    let feedback = training.submit_response("negative").await.unwrap().unwrap();
    assert!(!feedback.is_correct);
    assert!(spoken_soon(&announcer, &feedback.message).await);
    assert_eq!(training.submit_response("negative").await.unwrap(), None);

    // The rejected instruction is spoken once more after a second.
    tokio::time::sleep(Duration::from_millis(1_300)).await;
    let repeats = announcer.spoken().iter().filter(|spoken| **spoken == text).count();
    assert_eq!(repeats, 2);

    let snap = training.end_session().await.unwrap();
    assert!(!snap.is_active());
    assert_eq!(snap.statistics.sessions_completed, 1);
    assert_eq!(snap.statistics.accuracy, 0);

    let persisted = store.load_statistics().await.unwrap().unwrap();
    assert_eq!(persisted, snap.statistics);

    let reset = training.reset_statistics().await.unwrap();
    assert!(reset.is_empty());
    assert!(store.load_statistics().await.unwrap().unwrap().is_empty());

    app.shutdown().await.unwrap();
    assert!(matches!(
        training.snapshot().await,
        Err(RuntimeError::Closed)
    ));
}

struct Offline;

#[async_trait]
impl StatisticsRepository for Offline {
    async fn load_statistics(&self) -> Result<Option<Statistics>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn save_statistics(&self, _stats: &Statistics) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn persistence_failures_keep_in_memory_statistics() {
    let mut storage = seeded_storage(InMemoryRepository::new()).await;
    storage.statistics = Arc::new(Offline);
    let app = AppServices::from_storage(
        storage,
        Clock::system(),
        Some(9),
        Arc::new(RecordingAnnouncer::new()),
    )
    .await;
    let training = app.training();

    training.start_session().await.unwrap();
    training.submit_response("say again").await.unwrap();
    let snap = training.end_session().await.unwrap();
    assert_eq!(snap.statistics.sessions_completed, 1);

    training.start_session().await.unwrap();
    let stats = app.shutdown().await.unwrap();
    assert_eq!(stats.sessions_completed, 2);
}

#[tokio::test]
async fn settings_updates_are_validated_and_applied() {
    let app = AppServices::in_memory(Clock::system(), Some(1), Arc::new(RecordingAnnouncer::new()))
        .await;
    let training = app.training();

    let err = training
        .update_settings(TrainingSettingsDraft {
            flight_tick_ms: 0,
            ..TrainingSettingsDraft::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Settings(_)));

    let updated = training
        .update_settings(TrainingSettingsDraft {
            voice_feedback: false,
            ..immediate_commands()
        })
        .await
        .unwrap();
    assert_eq!(training.settings().await.unwrap(), updated);
    assert_eq!(app.settings().load().await.unwrap(), updated);
    app.shutdown().await.unwrap();
}

struct ReadOnlySettings;

#[async_trait]
impl SettingsRepository for ReadOnlySettings {
    async fn load_settings(&self) -> Result<Option<TrainingSettings>, StorageError> {
        Ok(None)
    }

    async fn save_settings(&self, _settings: &TrainingSettings) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn settings_apply_even_when_the_write_fails() {
    let mut storage = Storage::in_memory();
    storage.settings = Arc::new(ReadOnlySettings);
    let app = AppServices::from_storage(
        storage,
        Clock::system(),
        Some(2),
        Arc::new(RecordingAnnouncer::new()),
    )
    .await;
    let training = app.training();

    let updated = training
        .update_settings(TrainingSettingsDraft {
            voice_feedback: false,
            ..TrainingSettingsDraft::default()
        })
        .await
        .unwrap();
    assert!(!updated.voice_feedback());
    assert!(!training.settings().await.unwrap().voice_feedback());
    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn transcriber_follows_updated_endpoint() {
    let app = AppServices::in_memory(Clock::system(), Some(4), Arc::new(RecordingAnnouncer::new()))
        .await;
    let clip = || AudioClip::webm(b"roger".to_vec());
    if std::env::var("ATC_STT_URL").is_err() {
        let err = app.transcriber().transcribe(clip()).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Disabled));
    }

    app.training()
        .update_settings(TrainingSettingsDraft {
            transcription_url: Some("http://127.0.0.1:9/stt".into()),
            ..TrainingSettingsDraft::default()
        })
        .await
        .unwrap();
    let err = app.transcriber().transcribe(clip()).await.unwrap_err();
    assert!(!matches!(err, TranscriptionError::Disabled));
    app.shutdown().await.unwrap();
}

struct SlowAnnouncer;

#[async_trait]
impl Announcer for SlowAnnouncer {
    async fn announce(&self, _text: &str) {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
}

#[tokio::test]
async fn slow_speech_does_not_block_requests() {
    let app = AppServices::from_storage(
        seeded_storage(InMemoryRepository::new()).await,
        Clock::system(),
        Some(6),
        Arc::new(SlowAnnouncer),
    )
    .await;
    let training = app.training();

    let started = training.start_session().await.unwrap();
    assert!(started.is_waiting_for_response);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snap = tokio::time::timeout(Duration::from_secs(1), training.snapshot())
        .await
        .expect("snapshot answered while speech plays")
        .unwrap();
    assert!(snap.is_active());
    let feedback = tokio::time::timeout(Duration::from_secs(1), training.submit_response("unable"))
        .await
        .expect("submit answered while speech plays")
        .unwrap();
    assert!(feedback.is_some());
}

#[tokio::test]
async fn muted_voice_feedback_announces_nothing() {
    let announcer = RecordingAnnouncer::new();
    let app = AppServices::in_memory(Clock::system(), Some(5), Arc::new(announcer.clone())).await;
    let training = app.training();
    training
        .update_settings(TrainingSettingsDraft {
            voice_feedback: false,
            ..immediate_commands()
        })
        .await
        .unwrap();

    let snap = training.start_session().await.unwrap();
    assert!(snap.is_waiting_for_response);
    training.submit_response("roger").await.unwrap();
    app.shutdown().await.unwrap();
    assert!(announcer.spoken().is_empty());
}

#[tokio::test]
async fn statistics_survive_restart_on_sqlite() {
    let url = "sqlite:file:memdb_runtime_restart?mode=memory&cache=shared";
    let keeper = SqliteRepository::connect(url).await.expect("connect");

    let first = AppServices::new_sqlite(url, Clock::system(), Some(11), Arc::new(RecordingAnnouncer::new()))
        .await
        .expect("sqlite services");
    first
        .training()
        .update_settings(immediate_commands())
        .await
        .unwrap();
    first.training().start_session().await.unwrap();
    first.training().submit_response("unable").await.unwrap();
    first.shutdown().await.unwrap();

    let second = AppServices::new_sqlite(url, Clock::system(), None, Arc::new(RecordingAnnouncer::new()))
        .await
        .expect("sqlite services again");
    let snap = second.training().snapshot().await.unwrap();
    assert_eq!(snap.statistics.sessions_completed, 1);
    assert_eq!(snap.statistics.recent_sessions.len(), 1);
    assert_eq!(snap.statistics.recent_sessions[0].commands_completed, 0);
    assert_eq!(second.settings().load().await.unwrap().initial_command_delay().num_milliseconds(), 0);
    second.shutdown().await.unwrap();
    drop(keeper);
}
