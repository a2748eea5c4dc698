pub mod session;

pub use session::{
    CoachingMessage, ConnectionStatus, DistractionEvent, FocusSample, Nudge, NudgeKind,
    SessionRecord, SessionStatus, Vibe,
};
