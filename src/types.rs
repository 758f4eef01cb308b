// src/types.rs

use crate::units::SpeedUnits;
use geo::Point;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub calibration: CalibrationConfig,
    pub activation: ActivationConfig,
    pub location: LocationConfig,
    pub volume: VolumeRampConfig,
    pub logging: LoggingConfig,
    pub replay: ReplayConfig,
}

/// User-facing calibration. Speeds are in `speed_units`, volumes in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub speed_units: SpeedUnits,
    pub low_speed: f32,
    pub high_speed: f32,
    pub low_volume: u8,
    pub high_volume: u8,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            speed_units: SpeedUnits::KilometersPerHour,
            low_speed: 25.0,
            high_speed: 100.0,
            low_volume: 60,
            high_volume: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Only auto-activate while external power is connected
    pub enable_only_charging: bool,
    /// Auto-activate when a paired audio accessory connects
    pub enable_bluetooth: bool,
    /// Accessory addresses that count. Empty means any accessory.
    pub bluetooth_devices: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub interval_ms: u64,
    pub fastest_interval_ms: u64,
    pub high_accuracy: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            fastest_interval_ms: 500,
            high_accuracy: true,
        }
    }
}

/// Tunables for the background volume worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeRampConfig {
    /// Delay between sink writes
    pub update_delay_ms: u64,
    /// Close enough to jump straight to the target
    pub snap_threshold: f32,
    /// Fraction of the remaining distance covered per step
    pub approach_rate: f32,
    /// Largest step allowed, so jumps stay unnoticeable
    pub max_approach: f32,
}

impl Default for VolumeRampConfig {
    fn default() -> Self {
        Self {
            update_delay_ms: 150,
            snap_threshold: 0.03,
            approach_rate: 0.3,
            max_approach: 0.06,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Settings for the demo binary's trace replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub trace_path: String,
    /// Playback speed multiplier applied to recorded fix spacing
    pub speedup: f64,
    pub sink_max_volume: u32,
    pub location_permission: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            trace_path: "demos/drive.jsonl".to_string(),
            speedup: 10.0,
            sink_max_volume: 15,
            location_permission: true,
        }
    }
}

// ============================================================================
// LOCATION
// ============================================================================

/// A validated position fix. Immutable once received.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    pub timestamp_ms: i64,
    /// x = longitude, y = latitude (degrees)
    pub position: Point<f64>,
    /// Device-reported speed in m/s, when the provider has one
    pub reported_speed: Option<f32>,
}

impl LocationSample {
    pub fn new(timestamp_ms: i64, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp_ms,
            position: Point::new(longitude, latitude),
            reported_speed: None,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.reported_speed = Some(speed);
        self
    }
}

/// A fix as delivered by the location feed. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    #[serde(default)]
    pub time_ms: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub speed: Option<f32>,
}

impl RawFix {
    /// Validate into a sample. Returns `None` for partial or out-of-range fixes.
    pub fn to_sample(&self) -> Option<LocationSample> {
        let time_ms = self.time_ms?;
        let lat = self.latitude.filter(|v| v.is_finite() && v.abs() <= 90.0)?;
        let lon = self.longitude.filter(|v| v.is_finite() && v.abs() <= 180.0)?;

        let mut sample = LocationSample::new(time_ms, lat, lon);
        // a garbage speed is treated as "no speed", the fallback covers it
        sample.reported_speed = self.speed.filter(|s| s.is_finite() && *s >= 0.0);
        Some(sample)
    }
}

/// Subscription parameters handed to the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    pub interval: Duration,
    pub fastest_interval: Duration,
    pub high_accuracy: bool,
}

impl From<&LocationConfig> for LocationRequest {
    fn from(cfg: &LocationConfig) -> Self {
        Self {
            interval: Duration::from_millis(cfg.interval_ms),
            fastest_interval: Duration::from_millis(cfg.fastest_interval_ms),
            high_accuracy: cfg.high_accuracy,
        }
    }
}

// ============================================================================
// TRACKING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TrackingState {
    #[default]
    Idle,
    Tracking,
}

impl TrackingState {
    pub fn is_tracking(self) -> bool {
        self == TrackingState::Tracking
    }
}

/// Where a command came from. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSource {
    Manual,
    Automation,
    Trigger,
    Surface,
}

/// Environmental connect/disconnect events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerEvent {
    PowerConnected,
    PowerDisconnected,
    AccessoryConnected { address: String },
    AccessoryDisconnected { address: String },
}

/// Settings bundle delivered by the automation plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationBundle {
    #[serde(default)]
    pub tracking: Option<bool>,
}

impl AutomationBundle {
    /// A bundle without an explicit value asks for tracking.
    pub fn desired_state(&self) -> bool {
        self.tracking.unwrap_or(true)
    }
}
