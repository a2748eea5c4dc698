pub mod orchestrator;
pub mod state;

pub use orchestrator::SessionOrchestrator;
pub use state::SessionSnapshot;
