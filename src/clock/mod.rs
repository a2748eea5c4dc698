pub mod tracker;

pub(crate) use tracker::progress_loop;
