//! Library entry for edgefl (exposes modules for the binary and integration tests).

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod probe;
pub mod report;
pub mod trainer;
pub mod types;

pub use controller::{Attempt, RoundController, RoundHandle, RoundState};
pub use types::{GatePolicy, ReportPayload, ResourceSnapshot, RoundConfig, RoundEvent, RoundResult};
