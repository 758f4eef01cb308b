// src/service/mod.rs
//
// Runtime side of the engine:
//   commands (UI / automation / triggers / surface) → controller
//   location feed → controller sampler → volume_ramp → OutputSink

pub mod controller;
pub mod platform;
pub mod triggers;
pub mod volume_ramp;

pub use controller::TrackingController;
pub use platform::{LocationProvider, OutputSink, StatusSurface};
pub use triggers::{apply_automation, TriggerMonitor, TriggerOutcome};
pub use volume_ramp::{approach, VolumeRamp};
