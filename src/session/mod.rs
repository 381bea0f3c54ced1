//! Research session state
//!
//! - `transcript`: ordered log of user and agent entries
//! - `status_table`: per-agent lifecycle reducer
//! - `controller`: owns the live stream and publishes snapshots

pub mod controller;
pub mod status_table;
pub mod transcript;

pub use controller::{
    ApplyOutcome, ControllerError, ControllerOptions, ControllerState, ResearchController,
    ResearchSnapshot,
};
pub use status_table::AgentStatusTable;
pub use transcript::{MessageOutcome, TranscriptStore};
