use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::Vibe;

/// Immutable parameters for one session, fixed at start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub duration_minutes: u32,
    pub goal_text: String,
    pub vibe: Vibe,
}

impl SessionConfig {
    pub fn new(duration_minutes: u32, goal_text: impl Into<String>, vibe: Vibe) -> Result<Self> {
        if duration_minutes < 1 {
            bail!("duration_minutes must be at least 1");
        }
        Ok(Self {
            duration_minutes,
            goal_text: goal_text.into(),
            vibe,
        })
    }
}

/// Endpoint locations for the external backends. Environment variables
/// override the localhost defaults.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Perception WebSocket endpoint (score + distraction events).
    pub perception_ws_url: String,
    /// Base URL for coaching messages and TTS.
    pub coach_base_url: String,
    /// Base URL for micro-nudges and feedback submission.
    pub nudge_base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            perception_ws_url: env_or("FOCUSDECK_PERCEPTION_URL", "ws://localhost:8001/ws/study"),
            coach_base_url: env_or("FOCUSDECK_COACH_URL", "http://localhost:8001"),
            nudge_base_url: env_or("FOCUSDECK_NUDGE_URL", "http://localhost:8002"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Timing policy for one session. Production uses the defaults; tests
/// compress the logical minute to exercise full sessions quickly.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Progress clock tick; progress updates at >= 1 Hz.
    pub clock_tick: Duration,
    /// Frame capture-and-send interval (~5 Hz).
    pub frame_interval: Duration,
    /// Length of one logical session minute.
    pub minute: Duration,
    /// Trailing window for the nudge trigger rule.
    pub nudge_window: Duration,
    /// How long an undismissed nudge stays visible.
    pub nudge_dismiss: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            clock_tick: Duration::from_secs(1),
            frame_interval: Duration::from_millis(200),
            minute: Duration::from_secs(60),
            nudge_window: Duration::from_secs(120),
            nudge_dismiss: Duration::from_secs(15),
        }
    }
}

impl SessionTiming {
    /// Total wall-clock length of a session with the given duration.
    pub fn session_length(&self, duration_minutes: u32) -> Duration {
        self.minute * duration_minutes
    }
}
