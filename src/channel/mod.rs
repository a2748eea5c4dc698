pub mod frame;
pub mod protocol;

pub mod controller;
pub(crate) mod loop_worker;

pub use frame::FrameSource;
pub(crate) use controller::StreamController;
