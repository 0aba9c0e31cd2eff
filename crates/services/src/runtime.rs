//! Actor task owning the `TrainingEngine`.
//!
//! Every request and every timer poll runs on the same task, so engine
//! transitions never interleave. Callers hold a cloneable `TrainingHandle`.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use atc_core::model::{SettingsError, Statistics, TrainingSettings, TrainingSettingsDraft};

use crate::engine::{EngineEvent, TrainingEngine};
use crate::error::RuntimeError;
use crate::settings_service::SettingsService;
use crate::snapshot::{Feedback, TrainingSnapshot};
use crate::speech::Announcer;
use crate::statistics_service::StatisticsService;

/// How often the actor polls engine timers.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
const REQUEST_BUFFER: usize = 32;

enum Request {
    Start(oneshot::Sender<TrainingSnapshot>),
    End(oneshot::Sender<TrainingSnapshot>),
    Submit(String, oneshot::Sender<Option<Feedback>>),
    Snapshot(oneshot::Sender<TrainingSnapshot>),
    ResetStatistics(oneshot::Sender<Statistics>),
    UpdateSettings(
        TrainingSettingsDraft,
        oneshot::Sender<Result<TrainingSettings, SettingsError>>,
    ),
    Settings(oneshot::Sender<TrainingSettings>),
    Shutdown(oneshot::Sender<Statistics>),
}

pub struct TrainingRuntime {
    engine: TrainingEngine,
    statistics: StatisticsService,
    settings: SettingsService,
    applied: watch::Sender<TrainingSettings>,
    speech: mpsc::UnboundedSender<String>,
    speaker: JoinHandle<()>,
    requests: mpsc::Receiver<Request>,
}

impl TrainingRuntime {
    /// Spawn the actor on the current tokio runtime.
    ///
    /// Announcements go to a separate speaker task and are spoken in order;
    /// the actor never waits for speech.
    #[must_use]
    pub fn spawn(
        engine: TrainingEngine,
        statistics: StatisticsService,
        settings: SettingsService,
        announcer: Arc<dyn Announcer>,
    ) -> (TrainingHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);
        let (applied, applied_rx) = watch::channel(engine.settings().clone());
        let (speech, speaker) = spawn_speaker(announcer);
        let runtime = Self {
            engine,
            statistics,
            settings,
            applied,
            speech,
            speaker,
            requests: rx,
        };
        let task = tokio::spawn(runtime.run());
        (
            TrainingHandle {
                tx,
                settings: applied_rx,
            },
            task,
        )
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("training runtime started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let events = self.engine.poll();
                    self.dispatch(events).await;
                }
                request = self.requests.recv() => {
                    let Some(request) = request else {
                        // All handles dropped: close the session so it still counts.
                        let events = self.engine.end_session();
                        self.dispatch(events).await;
                        break;
                    };
                    let events = self.engine.poll();
                    self.dispatch(events).await;
                    if self.handle(request).await.is_break() {
                        break;
                    }
                }
            }
        }

        // Let queued announcements finish before reporting the task done.
        let Self { speech, speaker, .. } = self;
        drop(speech);
        let _ = speaker.await;
        debug!("training runtime stopped");
    }

    async fn handle(&mut self, request: Request) -> ControlFlow<()> {
        match request {
            Request::Start(reply) => {
                let events = self.engine.start_session();
                self.dispatch(events).await;
                let _ = reply.send(self.engine.snapshot());
            }
            Request::End(reply) => {
                let events = self.engine.end_session();
                self.dispatch(events).await;
                let _ = reply.send(self.engine.snapshot());
            }
            Request::Submit(transcript, reply) => {
                let events = self.engine.submit_response(&transcript);
                let feedback = events.iter().find_map(|event| match event {
                    EngineEvent::ResponseEvaluated { feedback, .. } => Some(feedback.clone()),
                    _ => None,
                });
                self.dispatch(events).await;
                let _ = reply.send(feedback);
            }
            Request::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
            }
            Request::ResetStatistics(reply) => {
                let events = self.engine.reset_statistics();
                self.dispatch(events).await;
                let _ = reply.send(self.engine.statistics().clone());
            }
            Request::UpdateSettings(draft, reply) => {
                let result = draft.validate();
                if let Ok(settings) = &result {
                    self.engine.apply_settings(settings.clone());
                    self.applied.send_replace(settings.clone());
                    info!("training settings updated");
                    self.settings.persist(settings).await;
                }
                let _ = reply.send(result);
            }
            Request::Settings(reply) => {
                let _ = reply.send(self.engine.settings().clone());
            }
            Request::Shutdown(reply) => {
                let events = self.engine.end_session();
                self.dispatch(events).await;
                let _ = reply.send(self.engine.statistics().clone());
                debug!("training runtime shut down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn dispatch(&self, events: Vec<EngineEvent>) {
        for event in events {
            if let EngineEvent::StatisticsChanged(stats) = &event {
                self.statistics.persist(stats).await;
                continue;
            }
            if !self.engine.settings().voice_feedback() {
                continue;
            }
            if let Some(text) = event.announcement() {
                if self.speech.send(text.to_string()).is_err() {
                    debug!("speaker task gone, announcement dropped");
                }
            }
        }
    }
}

fn spawn_speaker(announcer: Arc<dyn Announcer>) -> (mpsc::UnboundedSender<String>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            announcer.announce(&text).await;
        }
    });
    (tx, task)
}

/// Cloneable front door to a running `TrainingRuntime`.
#[derive(Clone)]
pub struct TrainingHandle {
    tx: mpsc::Sender<Request>,
    settings: watch::Receiver<TrainingSettings>,
}

impl TrainingHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the runtime has stopped.
    pub async fn start_session(&self) -> Result<TrainingSnapshot, RuntimeError> {
        self.call(Request::Start).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the runtime has stopped.
    pub async fn end_session(&self) -> Result<TrainingSnapshot, RuntimeError> {
        self.call(Request::End).await
    }

    /// Submit a transcript. `None` means nothing was outstanding.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the runtime has stopped.
    pub async fn submit_response(
        &self,
        transcript: impl Into<String>,
    ) -> Result<Option<Feedback>, RuntimeError> {
        let transcript = transcript.into();
        self.call(|reply| Request::Submit(transcript, reply)).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the runtime has stopped.
    pub async fn snapshot(&self) -> Result<TrainingSnapshot, RuntimeError> {
        self.call(Request::Snapshot).await
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the runtime has stopped.
    pub async fn reset_statistics(&self) -> Result<Statistics, RuntimeError> {
        self.call(Request::ResetStatistics).await
    }

    /// Validate and apply new settings, then persist them.
    ///
    /// A failed write is logged; the settings still take effect.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Settings` for invalid drafts and
    /// `RuntimeError::Closed` once the runtime has stopped.
    pub async fn update_settings(
        &self,
        draft: TrainingSettingsDraft,
    ) -> Result<TrainingSettings, RuntimeError> {
        Ok(self
            .call(|reply| Request::UpdateSettings(draft, reply))
            .await??)
    }

    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` once the runtime has stopped.
    pub async fn settings(&self) -> Result<TrainingSettings, RuntimeError> {
        self.call(Request::Settings).await
    }

    /// Follow settings as they are applied by the runtime.
    #[must_use]
    pub fn watch_settings(&self) -> watch::Receiver<TrainingSettings> {
        self.settings.clone()
    }

    /// End any running session and stop the actor. Returns final statistics.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` if the runtime already stopped.
    pub async fn shutdown(&self) -> Result<Statistics, RuntimeError> {
        self.call(Request::Shutdown).await
    }
}
