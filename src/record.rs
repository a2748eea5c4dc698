//! Terminal session record: assembly at end-of-session and the local slot
//! the reporting layer reads it from after navigation.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::config::SessionTiming;
use crate::models::SessionRecord;
use crate::session::state::SessionState;

/// Snapshot accumulated session state into the terminal record. Called
/// exactly once per session, from the idempotent end-of-session path.
pub(crate) fn assemble(state: &SessionState, timing: &SessionTiming) -> SessionRecord {
    let (duration_minutes, vibe) = state
        .config
        .as_ref()
        .map(|config| (config.duration_minutes, config.vibe))
        .unwrap_or((0, crate::models::Vibe::Calm));

    SessionRecord {
        session_id: state.session_id.clone().unwrap_or_default(),
        started_at: state.started_at.unwrap_or_else(Utc::now),
        duration_minutes,
        vibe,
        minutes_elapsed: state.minutes_elapsed(timing),
        distraction_history: state.aggregator.history().to_vec(),
        total_distractions: state.aggregator.total(),
        focus_score: state.focus.score,
    }
}

/// Single-slot persistence for the most recent session record. The slot is
/// the only contract between the orchestrator and post-session reporting.
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        let serialized = serde_json::to_string_pretty(record)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write session record to {}", self.path.display()))
    }

    pub fn load(&self) -> Result<Option<SessionRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session record from {}", self.path.display()))?;
        let record = serde_json::from_str(&contents).context("corrupt session record slot")?;
        Ok(Some(record))
    }
}
