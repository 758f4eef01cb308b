// src/engine/mod.rs
//
// Pure signal path, no I/O:
//   RawFix → sample_processor → speed_filter → volume_mapper → LevelChange
//   TriggerEvent state → activation::decide → desired tracking state

pub mod activation;
pub mod sample_processor;
pub mod speed_filter;
pub mod volume_mapper;

pub use activation::{decide, ActivationInputs};
pub use sample_processor::{LevelChange, SampleProcessor};
pub use speed_filter::{SpeedFilter, SPEED_WINDOW};
pub use volume_mapper::{speed_to_level, CalibrationHandle, VolumeCalibration};
