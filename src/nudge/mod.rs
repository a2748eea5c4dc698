pub mod aggregator;
pub mod trigger;

pub use aggregator::{DistractionAggregator, NudgePhase, NudgeRequest};
pub(crate) use trigger::NudgeTrigger;
