pub mod engine;
pub(crate) mod pipeline;

pub use engine::SpeechEngine;
pub(crate) use pipeline::SpeechPipeline;
