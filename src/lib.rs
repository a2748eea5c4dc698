//! focusdeck: client-side orchestrator for camera-coached focus sessions.
//!
//! One timed session at a time: frames stream to a perception backend over
//! a persistent channel, focus scores and distraction events flow back,
//! coaching messages fire at fixed checkpoints (with synthesized speech),
//! and sustained distraction triggers a micro-nudge. At the end the
//! orchestrator assembles a single session record for the reporting layer.
//!
//! The perception, coaching, TTS and nudge backends are external services;
//! so is the renderer, which observes state through
//! [`SessionOrchestrator::subscribe`].

pub mod api;
pub mod channel;
pub mod clock;
pub mod coach;
pub mod config;
pub mod models;
pub mod nudge;
pub mod record;
pub mod session;
pub mod speech;

pub use channel::FrameSource;
pub use config::{BackendConfig, SessionConfig, SessionTiming};
pub use models::{
    CoachingMessage, ConnectionStatus, DistractionEvent, FocusSample, Nudge, NudgeKind,
    SessionRecord, SessionStatus, Vibe,
};
pub use record::RecordStore;
pub use session::{SessionOrchestrator, SessionSnapshot};

/// Initialize logging from `RUST_LOG`, defaulting to info.
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
