use crate::engine::VolumeCalibration;
use crate::error::ControlError;
use crate::types::{CalibrationConfig, Config};
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        let config = Self::from_yaml_str(&contents).with_context(|| format!("parsing {}", path))?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ControlError> {
        self.calibration.to_native()?;
        Ok(())
    }
}

impl CalibrationConfig {
    /// Convert the user-facing bounds into a native-unit calibration.
    pub fn to_native(&self) -> Result<VolumeCalibration, ControlError> {
        VolumeCalibration::new(
            self.speed_units.to_native(self.low_speed),
            self.speed_units.to_native(self.high_speed),
            self.low_volume,
            self.high_volume,
        )
    }

    /// Re-express the current bounds in `units`, keeping the native values.
    pub fn convert_units(&self, units: crate::units::SpeedUnits) -> Self {
        let low_native = self.speed_units.to_native(self.low_speed);
        let high_native = self.speed_units.to_native(self.high_speed);
        Self {
            speed_units: units,
            low_speed: units.from_native(low_native).round(),
            high_speed: units.from_native(high_native).round(),
            ..self.clone()
        }
    }
}
