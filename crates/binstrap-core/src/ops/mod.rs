//! Orchestration - the readiness state machine

pub mod ready;

pub use ready::{LoadContext, LoadEvent, ensure_ready, load_server};
