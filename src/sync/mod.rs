//! Status synchronization
//!
//! [`SyncEngine`] runs a single cycle; [`Monitor`] drives cycles on a fixed
//! period without letting them overlap.

pub mod engine;
pub mod monitor;

pub use engine::{
    CycleReport, EndpointOutcome, EngineSettings, PublishOutcome, SnapshotSources, SyncEngine,
};
pub use monitor::Monitor;
