pub mod scheduler;

pub(crate) use scheduler::{checkpoint_loop, CoachContext};
