//! OTA Agent Core - Hardware-independent update orchestration for the ESP32 OTA agent
//!
//! This crate contains the polling protocol and the download/apply state
//! machine so they can be tested on the host platform without requiring
//! ESP32 hardware. The firmware supplies the real collaborators (HTTP
//! client, staging store, OTA partition writer) through the traits in
//! [`platform`].

pub mod intent;
pub mod orchestrator;
pub mod platform;
pub mod poll;
pub mod protocol;
pub mod schedule;

#[cfg(test)]
mod testutil;

pub use intent::IntentFlags;
pub use orchestrator::{
    ApplyOutcome, CycleOutcome, DownloadOutcome, Orchestrator, OrchestratorState,
};
pub use platform::{ApplySession, HttpBody, StagedImage, StagingStore, Transport, UpdateApplier};
pub use poll::PollEngine;
pub use schedule::PollSchedule;
