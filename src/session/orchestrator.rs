//! The session facade: owns the camera and the perception channel, wires
//! the clock, scheduler, speech and nudge components together, and
//! guarantees teardown on every exit path.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{BackendClient, FeedbackPayload};
use crate::channel::loop_worker::StreamContext;
use crate::channel::{FrameSource, StreamController};
use crate::clock::progress_loop;
use crate::coach::{checkpoint_loop, CoachContext};
use crate::config::{BackendConfig, SessionConfig, SessionTiming};
use crate::models::{SessionRecord, SessionStatus};
use crate::nudge::NudgeTrigger;
use crate::record::{self, RecordStore};
use crate::session::state::{SessionSnapshot, Shared};
use crate::speech::{SpeechEngine, SpeechPipeline};

type SharedFrames = Arc<StdMutex<Option<Box<dyn FrameSource>>>>;

#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<Shared>,
    client: BackendClient,
    backends: BackendConfig,
    timing: SessionTiming,
    engine: SpeechEngine,
    store: RecordStore,
    frames: SharedFrames,
    stream: Mutex<StreamController>,
    cancel: StdMutex<Option<CancellationToken>>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

enum EndOutcome {
    First(SessionRecord),
    AlreadyEnded(SessionRecord),
    NotStarted,
}

impl SessionOrchestrator {
    pub fn new(backends: BackendConfig, timing: SessionTiming, record_path: PathBuf) -> Self {
        let client = BackendClient::new(&backends);
        Self {
            inner: Arc::new(Inner {
                shared: Shared::new(),
                client,
                backends,
                timing,
                engine: SpeechEngine::new(),
                store: RecordStore::new(record_path),
                frames: Arc::new(StdMutex::new(None)),
                stream: Mutex::new(StreamController::new()),
                cancel: StdMutex::new(None),
                tasks: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Observe orchestrator state. The renderer never touches internals;
    /// every state change publishes a fresh snapshot here.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.shared.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.shared.snapshot().await
    }

    /// Start a session, taking exclusive ownership of the camera source.
    pub async fn start_session(
        &self,
        config: SessionConfig,
        frames: Box<dyn FrameSource>,
    ) -> Result<()> {
        {
            let state = self.inner.shared.state.lock().await;
            if state.status == SessionStatus::Running {
                bail!("session already active");
            }
        }

        let session_id = Uuid::new_v4().to_string();
        let vibe = config.vibe;
        info!(
            "starting {}-minute {} session {session_id}",
            config.duration_minutes,
            vibe.as_str()
        );

        {
            let mut guard = lock_or_recover(&self.inner.frames);
            *guard = Some(frames);
        }

        let cancel = CancellationToken::new();
        {
            let mut guard = lock_or_recover(&self.inner.cancel);
            if let Some(stale) = guard.replace(cancel.clone()) {
                stale.cancel();
            }
        }

        self.inner
            .shared
            .update(|state| {
                state.begin_session(session_id, config.clone(), Utc::now(), Instant::now());
            })
            .await;

        let (completed_tx, completed_rx) = mpsc::channel(1);
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(progress_loop(
            self.inner.shared.clone(),
            self.inner.timing,
            cancel.child_token(),
            completed_tx,
        )));
        tasks.push(self.spawn_completion_watcher(completed_rx));

        let trigger = NudgeTrigger {
            client: self.inner.client.clone(),
            shared: self.inner.shared.clone(),
            timing: self.inner.timing,
            vibe,
            cancel: cancel.child_token(),
        };
        self.inner
            .stream
            .lock()
            .await
            .start(
                StreamContext {
                    url: self.inner.backends.perception_ws_url.clone(),
                    duration_minutes: config.duration_minutes,
                    timing: self.inner.timing,
                    shared: self.inner.shared.clone(),
                    frames: self.inner.frames.clone(),
                    trigger,
                },
                &cancel,
            )
            .context("failed to start perception channel")?;

        tasks.push(tokio::spawn(checkpoint_loop(
            CoachContext {
                client: self.inner.client.clone(),
                shared: self.inner.shared.clone(),
                timing: self.inner.timing,
                config,
                speech: SpeechPipeline {
                    client: self.inner.client.clone(),
                    engine: self.inner.engine.clone(),
                    vibe,
                },
            },
            cancel.child_token(),
        )));

        lock_or_recover(&self.inner.tasks).extend(tasks);
        Ok(())
    }

    fn spawn_completion_watcher(&self, mut completed: mpsc::Receiver<()>) -> JoinHandle<()> {
        // Weak reference: the watcher must not keep a dropped orchestrator
        // alive past its last external handle.
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            if completed.recv().await.is_none() {
                return;
            }
            let Some(inner) = weak.upgrade() else { return };
            let orchestrator = SessionOrchestrator { inner };
            if let Err(err) = orchestrator.end_session().await {
                error!("automatic end-of-session failed: {err:#}");
            }
        })
    }

    /// End the session and assemble the terminal record. One-shot and
    /// idempotent: the timer and an explicit user stop may race here, and
    /// the second caller gets the already-assembled record.
    pub async fn end_session(&self) -> Result<SessionRecord> {
        let timing = self.inner.timing;
        let outcome = self
            .inner
            .shared
            .update(|state| {
                if let Some(existing) = state.record.clone() {
                    return EndOutcome::AlreadyEnded(existing);
                }
                if state.status != SessionStatus::Running {
                    return EndOutcome::NotStarted;
                }
                state.sync_progress(&timing);
                state.status = SessionStatus::Ended;
                state.status_line = "Session complete".into();
                let record = record::assemble(state, &timing);
                state.record = Some(record.clone());
                EndOutcome::First(record)
            })
            .await;

        let record = match outcome {
            EndOutcome::AlreadyEnded(record) => return Ok(record),
            EndOutcome::NotStarted => bail!("no active session to end"),
            EndOutcome::First(record) => record,
        };
        info!(
            "session {} ended: {} distractions, score {:?}",
            record.session_id, record.total_distractions, record.focus_score
        );

        if let Some(cancel) = lock_or_recover(&self.inner.cancel).take() {
            cancel.cancel();
        }
        if let Err(err) = self.inner.stream.lock().await.stop().await {
            warn!("perception channel stop failed: {err:#}");
        }
        if let Some(mut source) = lock_or_recover(&self.inner.frames).take() {
            source.release();
        }
        self.inner.engine.stop();

        let saved = self.inner.store.save(&record);

        for task in lock_or_recover(&self.inner.tasks).drain(..) {
            task.abort();
        }

        saved.context("failed to persist session record")?;
        Ok(record)
    }

    /// Explicit user dismissal of the active nudge; re-arms the trigger.
    pub async fn dismiss_nudge(&self) {
        self.inner
            .shared
            .update(|state| {
                let _ = state.aggregator.dismiss(None);
            })
            .await;
    }

    /// Annotate a distraction event as a false positive (or undo that).
    /// Pure annotation for later feedback submission.
    pub async fn mark_false_positive(&self, index: usize, value: bool) -> bool {
        self.inner
            .shared
            .update(|state| state.aggregator.annotate(index, value))
            .await
    }

    /// Send the user's corrections to the feedback backend. Fire-and-forget:
    /// failures are logged and never surfaced.
    pub fn submit_feedback(&self) {
        let inner = self.inner.clone();
        let _ = tokio::spawn(async move {
            let payload = {
                let state = inner.shared.state.lock().await;
                let corrected: Vec<_> = state
                    .aggregator
                    .history()
                    .iter()
                    .filter(|event| event.is_false_positive.is_some())
                    .cloned()
                    .collect();
                FeedbackPayload {
                    session_id: state.session_id.clone().unwrap_or_default(),
                    false_positive_count: corrected
                        .iter()
                        .filter(|event| event.is_false_positive == Some(true))
                        .count(),
                    corrected_events: corrected,
                }
            };
            if let Err(err) = inner.client.submit_feedback(&payload).await {
                warn!("feedback submission failed: {err:#}");
            }
        });
    }

    /// Read side of the record slot, for the reporting layer.
    pub fn load_last_record(&self) -> Result<Option<SessionRecord>> {
        self.inner.store.load()
    }
}

fn lock_or_recover<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Drop for Inner {
    // Abrupt teardown (navigation away, panic unwind): cancel everything
    // and release the camera without waiting for a clean end_session.
    fn drop(&mut self) {
        if let Ok(mut guard) = self.cancel.lock() {
            if let Some(cancel) = guard.take() {
                cancel.cancel();
            }
        }
        if let Ok(mut guard) = self.tasks.lock() {
            for task in guard.drain(..) {
                task.abort();
            }
        }
        if let Ok(mut guard) = self.frames.lock() {
            if let Some(mut source) = guard.take() {
                source.release();
            }
        }
        self.engine.stop();
    }
}
