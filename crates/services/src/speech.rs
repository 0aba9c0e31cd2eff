use std::env;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use atc_core::model::TrainingSettings;

use crate::error::TranscriptionError;

/// Recorded pilot audio waiting to be transcribed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioClip {
    #[must_use]
    pub fn webm(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: "recording.webm".into(),
            mime_type: "audio/webm".into(),
        }
    }
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Turn a clip into text.
    ///
    /// # Errors
    ///
    /// Returns `TranscriptionError` when the backend is unavailable or fails.
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError>;
}

/// Fire-and-forget text-to-speech.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, text: &str);
}

//
// ─── HTTP TRANSCRIPTION ───────────────────────────────────────────────────────
//

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriberConfig {
    pub endpoint: String,
}

impl TranscriberConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("ATC_STT_URL").ok()?;
        Self::from_endpoint(&endpoint)
    }

    /// Prefer the configured endpoint, falling back to `ATC_STT_URL`.
    #[must_use]
    pub fn from_settings(settings: &TrainingSettings) -> Option<Self> {
        settings
            .transcription_url()
            .and_then(Self::from_endpoint)
            .or_else(Self::from_env)
    }

    fn from_endpoint(endpoint: &str) -> Option<Self> {
        let endpoint = endpoint.trim();
        (!endpoint.is_empty()).then(|| Self {
            endpoint: endpoint.to_string(),
        })
    }
}

/// Posts audio as multipart form data (`audio` part) and reads `{ "text" }`.
///
/// The endpoint is read from the latest applied settings on every call.
#[derive(Clone)]
pub struct HttpTranscriber {
    client: Client,
    settings: watch::Receiver<TrainingSettings>,
}

impl HttpTranscriber {
    #[must_use]
    pub fn new(settings: watch::Receiver<TrainingSettings>) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl SpeechToText for HttpTranscriber {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError> {
        let config = {
            let settings = self.settings.borrow();
            TranscriberConfig::from_settings(&settings)
        }
        .ok_or(TranscriptionError::Disabled)?;

        let part = Part::bytes(clip.bytes)
            .file_name(clip.file_name)
            .mime_str(&clip.mime_type)?;
        let form = Form::new().part("audio", part);

        let response = self
            .client
            .post(&config.endpoint)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranscriptionError::HttpStatus(response.status()));
        }

        let body: TranscriptionResponse = response.json().await?;
        let text = body.text.ok_or(TranscriptionError::EmptyResponse)?;
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

/// Transcribe in the background so the caller keeps reacting to timers.
pub fn spawn_transcription(
    stt: Arc<dyn SpeechToText>,
    clip: AudioClip,
) -> JoinHandle<Result<String, TranscriptionError>> {
    tokio::spawn(async move {
        let result = stt.transcribe(clip).await;
        if let Err(err) = &result {
            warn!(error = %err, "transcription failed");
        }
        result
    })
}

//
// ─── ANNOUNCERS ───────────────────────────────────────────────────────────────
//

/// Writes announcements to the log instead of a speaker.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAnnouncer;

#[async_trait]
impl Announcer for LogAnnouncer {
    async fn announce(&self, text: &str) {
        info!(target: "atc::announce", "{text}");
    }
}

/// Keeps every announcement in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingAnnouncer {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingAnnouncer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, text: &str) {
        if let Ok(mut guard) = self.spoken.lock() {
            guard.push(text.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atc_core::model::TrainingSettingsDraft;

    struct Echo;

    #[async_trait]
    impl SpeechToText for Echo {
        async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError> {
            String::from_utf8(clip.bytes).map_err(|_| TranscriptionError::EmptyResponse)
        }
    }

    #[tokio::test]
    async fn disabled_transcriber_reports_disabled() {
        let (_tx, rx) = watch::channel(TrainingSettings::default());
        let stt = HttpTranscriber::new(rx);
        let err = stt.transcribe(AudioClip::webm(vec![1, 2, 3])).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Disabled));
    }

    #[test]
    fn settings_url_configures_transcriber() {
        let settings = TrainingSettingsDraft {
            transcription_url: Some("http://localhost:9000/transcribe".into()),
            ..TrainingSettingsDraft::default()
        }
        .validate()
        .unwrap();
        let config = TranscriberConfig::from_settings(&settings).unwrap();
        assert_eq!(config.endpoint, "http://localhost:9000/transcribe");
    }

    #[tokio::test]
    async fn spawned_transcription_resolves() {
        let stt: Arc<dyn SpeechToText> = Arc::new(Echo);
        let handle = spawn_transcription(stt, AudioClip::webm(b"roger".to_vec()));
        assert_eq!(handle.await.unwrap().unwrap(), "roger");
    }

    #[tokio::test]
    async fn recording_announcer_keeps_order() {
        let announcer = RecordingAnnouncer::new();
        announcer.announce("one").await;
        announcer.announce("two").await;
        assert_eq!(announcer.spoken(), vec!["one", "two"]);
    }
}
