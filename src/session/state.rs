use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::config::{SessionConfig, SessionTiming};
use crate::models::{
    CoachingMessage, ConnectionStatus, FocusSample, Nudge, SessionRecord, SessionStatus,
};
use crate::nudge::DistractionAggregator;

/// Renderer-facing view of the orchestrator. Published on every state
/// change through a `watch` channel; the orchestrator stays agnostic of
/// whoever is observing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub connection: ConnectionStatus,
    pub status_line: String,
    pub elapsed_secs: u64,
    pub progress_pct: f64,
    pub focus: FocusSample,
    pub distracted: bool,
    pub message: Option<CoachingMessage>,
    pub nudge: Option<Nudge>,
    pub total_distractions: usize,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            session_id: None,
            connection: ConnectionStatus::Idle,
            status_line: "--".into(),
            elapsed_secs: 0,
            progress_pct: 0.0,
            focus: FocusSample::default(),
            distracted: false,
            message: None,
            nudge: None,
            total_distractions: 0,
        }
    }
}

/// Mutable per-session state, held behind one mutex for the session's life.
pub(crate) struct SessionState {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub config: Option<SessionConfig>,
    pub started_at: Option<DateTime<Utc>>,
    pub anchor: Option<Instant>,
    pub elapsed: Duration,
    pub progress_pct: f64,
    pub connection: ConnectionStatus,
    pub status_line: String,
    pub focus: FocusSample,
    pub distracted: bool,
    pub message: Option<CoachingMessage>,
    pub aggregator: DistractionAggregator,
    pub record: Option<SessionRecord>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            session_id: None,
            config: None,
            started_at: None,
            anchor: None,
            elapsed: Duration::ZERO,
            progress_pct: 0.0,
            connection: ConnectionStatus::Idle,
            status_line: "--".into(),
            focus: FocusSample::default(),
            distracted: false,
            message: None,
            aggregator: DistractionAggregator::new(),
            record: None,
        }
    }
}

impl SessionState {
    pub fn begin_session(
        &mut self,
        session_id: String,
        config: SessionConfig,
        started_at: DateTime<Utc>,
        anchor: Instant,
    ) {
        *self = Self {
            status: SessionStatus::Running,
            session_id: Some(session_id),
            config: Some(config),
            started_at: Some(started_at),
            anchor: Some(anchor),
            status_line: "Camera active".into(),
            ..Self::default()
        };
    }

    /// Refresh elapsed time and progress from the running anchor. Progress
    /// never moves backward and freezes once the session has ended.
    pub fn sync_progress(&mut self, timing: &SessionTiming) {
        if self.status != SessionStatus::Running {
            return;
        }
        let (Some(anchor), Some(config)) = (self.anchor, self.config.as_ref()) else {
            return;
        };
        self.elapsed = anchor.elapsed();
        let total = timing.session_length(config.duration_minutes);
        self.progress_pct = self
            .progress_pct
            .max(progress_percent(self.elapsed, total));
    }

    /// Whole logical minutes since session start.
    pub fn minutes_elapsed(&self, timing: &SessionTiming) -> u32 {
        (self.elapsed.as_secs_f64() / timing.minute.as_secs_f64()).floor() as u32
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            session_id: self.session_id.clone(),
            connection: self.connection,
            status_line: self.status_line.clone(),
            elapsed_secs: self.elapsed.as_secs(),
            progress_pct: self.progress_pct,
            focus: self.focus.clone(),
            distracted: self.distracted,
            message: self.message.clone(),
            nudge: self.aggregator.active().cloned(),
            total_distractions: self.aggregator.total(),
        }
    }
}

pub(crate) fn progress_percent(elapsed: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        return 100.0;
    }
    (elapsed.as_secs_f64() / total.as_secs_f64()).min(1.0) * 100.0
}

/// Shared state plus its change-notification channel.
pub(crate) struct Shared {
    pub state: Mutex<SessionState>,
    notify: watch::Sender<SessionSnapshot>,
}

impl Shared {
    pub fn new() -> Arc<Self> {
        let (notify, _) = watch::channel(SessionSnapshot::default());
        Arc::new(Self {
            state: Mutex::new(SessionState::default()),
            notify,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.notify.subscribe()
    }

    /// Mutate the state and publish the resulting snapshot.
    pub async fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut guard = self.state.lock().await;
        let result = f(&mut guard);
        let _ = self.notify.send(guard.snapshot());
        result
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }
}
