//! Rolling distraction history and the micro-nudge trigger rule.
//!
//! The aggregator observes the distraction boolean derived from perception
//! replies, one observation per sampling tick. It never sees the raw event
//! list. Nudge lifecycle is an explicit `idle -> pending -> active -> idle`
//! machine so the single-in-flight invariant stays checkable.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;

use crate::models::{DistractionEvent, Nudge, NudgeKind};

/// How many history entries accompany a nudge request.
const RECENT_EVENTS: usize = 5;
/// Window count at which a nudge is warranted.
const TRIGGER_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgePhase {
    Idle,
    Pending,
    Active,
}

/// Parameters for one micro-nudge fetch, captured at trigger time.
#[derive(Debug, Clone, PartialEq)]
pub struct NudgeRequest {
    pub distraction_count: u32,
    pub recent_events: Vec<DistractionEvent>,
}

#[derive(Debug)]
pub struct DistractionAggregator {
    history: Vec<DistractionEvent>,
    /// Length of the current distraction run; resets when focus returns.
    run_count: u32,
    phase: NudgePhase,
    active: Option<Nudge>,
    /// Bumps on every activation so a stale auto-dismiss cannot clear a
    /// newer nudge.
    seq: u64,
}

impl Default for DistractionAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl DistractionAggregator {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            run_count: 0,
            phase: NudgePhase::Idle,
            active: None,
            seq: 0,
        }
    }

    /// Record one sampling tick. Returns a request exactly when the trigger
    /// rule fires: trailing-window count reaches the threshold while no
    /// nudge is pending or active.
    pub fn observe(
        &mut self,
        distracted: bool,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Option<NudgeRequest> {
        if !distracted {
            self.run_count = 0;
            return None;
        }

        self.run_count += 1;
        self.history
            .push(DistractionEvent::new(now, self.run_count));

        let cutoff = now
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(120));
        let windowed = self
            .history
            .iter()
            .filter(|event| event.timestamp > cutoff)
            .count();

        if windowed >= TRIGGER_THRESHOLD && self.phase == NudgePhase::Idle {
            self.phase = NudgePhase::Pending;
            let start = self.history.len().saturating_sub(RECENT_EVENTS);
            Some(NudgeRequest {
                distraction_count: self.run_count,
                recent_events: self.history[start..].to_vec(),
            })
        } else {
            None
        }
    }

    /// Move the pending nudge to active and return its sequence number for
    /// the auto-dismiss guard.
    pub fn resolve(&mut self, nudge: Nudge) -> u64 {
        self.seq += 1;
        self.phase = NudgePhase::Active;
        self.active = Some(nudge);
        self.seq
    }

    /// Clear the active nudge and re-arm the trigger. When `expected_seq`
    /// is given (auto-dismiss), a mismatch leaves newer nudges untouched.
    pub fn dismiss(&mut self, expected_seq: Option<u64>) -> bool {
        if let Some(seq) = expected_seq {
            if seq != self.seq {
                return false;
            }
        }
        if self.phase == NudgePhase::Idle {
            return false;
        }
        self.phase = NudgePhase::Idle;
        self.active = None;
        true
    }

    /// User correction of a history entry. Pure annotation; never touches
    /// the trigger state or the score.
    pub fn annotate(&mut self, index: usize, is_false_positive: bool) -> bool {
        match self.history.get_mut(index) {
            Some(event) => {
                event.is_false_positive = Some(is_false_positive);
                true
            }
            None => false,
        }
    }

    pub fn phase(&self) -> NudgePhase {
        self.phase
    }

    pub fn active(&self) -> Option<&Nudge> {
        self.active.as_ref()
    }

    pub fn history(&self) -> &[DistractionEvent] {
        &self.history
    }

    pub fn total(&self) -> usize {
        self.history.len()
    }

    pub fn run_count(&self) -> u32 {
        self.run_count
    }
}

/// Canned nudges shown when the backend fails; the user always sees a nudge
/// once the trigger fires.
pub fn fallback_nudges() -> [Nudge; 3] {
    [
        Nudge {
            kind: NudgeKind::Breathing,
            message: "Take a deep breath. Inhale for 4, hold for 4, exhale for 4.".into(),
        },
        Nudge {
            kind: NudgeKind::Posture,
            message: "Sit up straight. Roll your shoulders back and relax.".into(),
        },
        Nudge {
            kind: NudgeKind::Stretch,
            message: "Stand up and stretch for 30 seconds. Your body will thank you!".into(),
        },
    ]
}

pub fn pick_fallback() -> Nudge {
    let set = fallback_nudges();
    set.choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| set[0].clone())
}
