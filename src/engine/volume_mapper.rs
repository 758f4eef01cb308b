// src/engine/volume_mapper.rs

use crate::error::ControlError;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

/// Speed-to-volume bounds in native units. Only constructible valid:
/// `low_speed < high_speed` and `low_level <= high_level <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeCalibration {
    low_speed: f32,
    high_speed: f32,
    low_level: u8,
    high_level: u8,
}

impl VolumeCalibration {
    pub fn new(
        low_speed: f32,
        high_speed: f32,
        low_level: u8,
        high_level: u8,
    ) -> Result<Self, ControlError> {
        if !low_speed.is_finite() || !high_speed.is_finite() {
            return Err(ControlError::InvalidCalibration(
                "speed bounds must be finite".to_string(),
            ));
        }
        if high_speed <= low_speed {
            return Err(ControlError::InvalidCalibration(format!(
                "high speed {} must exceed low speed {}",
                high_speed, low_speed
            )));
        }
        if high_level > 100 {
            return Err(ControlError::InvalidCalibration(format!(
                "high volume {}% is above 100%",
                high_level
            )));
        }
        if high_level < low_level {
            return Err(ControlError::InvalidCalibration(format!(
                "high volume {}% is below low volume {}%",
                high_level, low_level
            )));
        }

        Ok(Self {
            low_speed,
            high_speed,
            low_level,
            high_level,
        })
    }

    pub fn low_speed(&self) -> f32 {
        self.low_speed
    }

    pub fn high_speed(&self) -> f32 {
        self.high_speed
    }

    pub fn low_level(&self) -> u8 {
        self.low_level
    }

    pub fn high_level(&self) -> u8 {
        self.high_level
    }
}

/// Map a smoothed speed (m/s) to an output level in [0, 1].
///
/// Clamps below `low_speed` and above `high_speed`, linear in between. The
/// linear branch reproduces both clamp values exactly at the bounds.
pub fn speed_to_level(speed: f32, calibration: &VolumeCalibration) -> f32 {
    let low = calibration.low_level as f32;
    let high = calibration.high_level as f32;

    if speed < calibration.low_speed {
        trace!("Below low speed at {:.2} m/s", speed);
        return low / 100.0;
    }
    if speed > calibration.high_speed {
        trace!("Above high speed at {:.2} m/s", speed);
        return high / 100.0;
    }

    let relative =
        (speed - calibration.low_speed) / (calibration.high_speed - calibration.low_speed);
    (low + (high - low) * relative) / 100.0
}

/// Calibration shared between the settings side and the sampling path.
/// Swappable at any time, including while tracking.
#[derive(Debug, Clone)]
pub struct CalibrationHandle {
    inner: Arc<RwLock<VolumeCalibration>>,
}

impl CalibrationHandle {
    pub fn new(calibration: VolumeCalibration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(calibration)),
        }
    }

    pub fn get(&self) -> VolumeCalibration {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, calibration: VolumeCalibration) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = calibration;
    }
}
