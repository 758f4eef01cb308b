// src/lib.rs
//
// Speed-driven volume control engine.
//
// Signal flow:
//   LocationProvider ─ RawFix ─→ TrackingController ─→ SampleProcessor
//        (SpeedFilter → speed_to_level) ─ level ─→ VolumeRamp ─→ OutputSink
//   TriggerEvent ─→ TriggerMonitor (activation::decide) ─→ TrackingController
//   TrackingController ─ TrackingEvent ─→ observers

mod config;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod replay;
pub mod service;
pub mod types;
pub mod units;

pub use error::{ControlError, SinkError};
pub use pipeline::{EventBus, TrackingEvent, TrackingMetrics};
pub use service::{TrackingController, TriggerMonitor};
pub use types::{Config, TrackingState};
