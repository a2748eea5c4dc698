use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coaching tone selector. Parameterizes every backend prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Vibe {
    Calm,
    Beast,
    Gamified,
}

impl Default for Vibe {
    fn default() -> Self {
        Vibe::Calm
    }
}

impl Vibe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vibe::Calm => "calm",
            Vibe::Beast => "beast",
            Vibe::Gamified => "gamified",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Running,
    Ended,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Idle
    }
}

/// Perception-channel connectivity, surfaced to the renderer as a persistent
/// indicator. Parse errors are reported on the status line and do not change
/// this value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        ConnectionStatus::Idle
    }
}

/// One distraction observation. Append-only; `is_false_positive` is set
/// later by user correction, never by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistractionEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_false_positive: Option<bool>,
}

impl DistractionEvent {
    pub fn new(timestamp: DateTime<Utc>, count: u32) -> Self {
        Self {
            timestamp,
            kind: "distraction".into(),
            count,
            is_false_positive: None,
        }
    }
}

/// Most recent score reading. `score: None` means the backend has not
/// produced a reading yet, which is distinct from a score of 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FocusSample {
    pub timestamp: Option<DateTime<Utc>>,
    pub score: Option<f64>,
}

/// One coaching message per checkpoint. `played` flips when a playback
/// request has been issued so a re-observed message never replays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CoachingMessage {
    pub text: String,
    pub checkpoint_index: u32,
    pub played: bool,
}

impl CoachingMessage {
    pub fn fresh(text: String, checkpoint_index: u32) -> Self {
        Self {
            text,
            checkpoint_index,
            played: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NudgeKind {
    Breathing,
    Posture,
    Stretch,
}

/// A short, time-boxed coaching suggestion shown after sustained distraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nudge {
    #[serde(rename = "type")]
    pub kind: NudgeKind,
    pub message: String,
}

/// Terminal session artifact, handed to the reporting layer through the
/// record slot. Created exactly once at session end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub vibe: Vibe,
    pub minutes_elapsed: u32,
    pub distraction_history: Vec<DistractionEvent>,
    pub total_distractions: usize,
    pub focus_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distraction_event_uses_client_facing_field_names() {
        let mut event = DistractionEvent::new(Utc::now(), 2);
        event.is_false_positive = Some(true);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "distraction");
        assert_eq!(value["count"], 2);
        assert_eq!(value["isFalsePositive"], true);
        assert!(value.get("is_false_positive").is_none());
    }

    #[test]
    fn unannotated_event_omits_the_correction_flag() {
        let value = serde_json::to_value(DistractionEvent::new(Utc::now(), 1)).unwrap();
        assert!(value.get("isFalsePositive").is_none());
    }
}
