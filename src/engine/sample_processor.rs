// src/engine/sample_processor.rs
//
// Raw fixes in, level changes out. Prefers the provider's reported speed,
// falls back to distance over time from the previous fallback fix.

use super::speed_filter::SpeedFilter;
use super::volume_mapper::{speed_to_level, CalibrationHandle};
use crate::types::{LocationSample, RawFix};
use geo::{GeodesicDistance, Point};
use tracing::{debug, trace};

/// Result of processing one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelChange {
    /// Speed fed into the filter for this sample (m/s)
    pub raw_speed: f32,
    /// Mapped output level in [0, 1]
    pub level: f32,
    /// `level` as a percentage, truncated
    pub level_percent: u8,
}

#[derive(Debug, Clone, Copy)]
struct PreviousFix {
    position: Point<f64>,
    timestamp_ms: i64,
}

pub struct SampleProcessor {
    filter: SpeedFilter,
    calibration: CalibrationHandle,
    previous_fix: Option<PreviousFix>,
}

impl SampleProcessor {
    pub fn new(calibration: CalibrationHandle) -> Self {
        Self {
            filter: SpeedFilter::new(),
            calibration,
            previous_fix: None,
        }
    }

    /// Validate and process a raw fix. Malformed fixes are skipped.
    pub fn on_fix(&mut self, fix: &RawFix) -> Option<LevelChange> {
        match fix.to_sample() {
            Some(sample) => Some(self.on_sample(&sample)),
            None => {
                debug!("Skipping malformed fix: {:?}", fix);
                None
            }
        }
    }

    pub fn on_sample(&mut self, sample: &LocationSample) -> LevelChange {
        let raw_speed = match sample.reported_speed {
            Some(speed) => speed,
            None => self.fallback_speed(sample),
        };

        self.filter.push(raw_speed);
        // just pushed, so the window is never empty here
        let smoothed = self.filter.average().unwrap_or(raw_speed);
        let level = speed_to_level(smoothed, &self.calibration.get());
        let level_percent = (level * 100.0) as u8;

        trace!(
            "speed {:.2} m/s, smoothed {:.2} m/s -> {}%",
            raw_speed,
            smoothed,
            level_percent
        );

        LevelChange {
            raw_speed,
            level,
            level_percent,
        }
    }

    /// Distance over elapsed time since the last fallback fix.
    ///
    /// Only this path updates the previous fix; reported-speed samples leave
    /// it alone, so after a long reported-speed run it can be stale.
    fn fallback_speed(&mut self, sample: &LocationSample) -> f32 {
        let speed = match self.previous_fix {
            Some(prev) => {
                let meters = prev.position.geodesic_distance(&sample.position);
                let elapsed_ms = sample.timestamp_ms - prev.timestamp_ms;
                trace!("Fallback distance {:.1} m over {} ms", meters, elapsed_ms);
                if elapsed_ms > 0 {
                    (1000.0 * meters / elapsed_ms as f64) as f32
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        self.previous_fix = Some(PreviousFix {
            position: sample.position,
            timestamp_ms: sample.timestamp_ms,
        });
        speed
    }

    /// Forget the previous fix so no distance spans a stop/start boundary.
    pub fn reset_previous_fix(&mut self) {
        self.previous_fix = None;
    }

    #[cfg(test)]
    fn has_previous_fix(&self) -> bool {
        self.previous_fix.is_some()
    }

    pub fn calibration(&self) -> &CalibrationHandle {
        &self.calibration
    }
}
