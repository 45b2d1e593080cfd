pub mod ranking;
pub mod snapshot;
pub mod vote;
