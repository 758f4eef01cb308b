// src/units.rs
//
// User-facing speed units. Everything below the configuration boundary
// works in native m/s.

use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KMH_TO_MS: f32 = 0.27778;
const MPH_TO_MS: f32 = 0.44704;
const MS_TO_KMH: f32 = 3.6;
const MS_TO_MPH: f32 = 2.23693;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum SpeedUnits {
    #[serde(rename = "m/s")]
    MetersPerSecond,
    #[default]
    #[serde(rename = "km/h")]
    KilometersPerHour,
    #[serde(rename = "mph")]
    MilesPerHour,
}

impl SpeedUnits {
    /// Convert a speed in these units to m/s
    pub fn to_native(self, speed: f32) -> f32 {
        match self {
            SpeedUnits::MetersPerSecond => speed,
            SpeedUnits::KilometersPerHour => speed * KMH_TO_MS,
            SpeedUnits::MilesPerHour => speed * MPH_TO_MS,
        }
    }

    /// Convert a speed in m/s to these units
    pub fn from_native(self, speed: f32) -> f32 {
        match self {
            SpeedUnits::MetersPerSecond => speed,
            SpeedUnits::KilometersPerHour => speed * MS_TO_KMH,
            SpeedUnits::MilesPerHour => speed * MS_TO_MPH,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeedUnits::MetersPerSecond => "m/s",
            SpeedUnits::KilometersPerHour => "km/h",
            SpeedUnits::MilesPerHour => "mph",
        }
    }
}

impl fmt::Display for SpeedUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SpeedUnits {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m/s" => Ok(SpeedUnits::MetersPerSecond),
            "km/h" => Ok(SpeedUnits::KilometersPerHour),
            "mph" => Ok(SpeedUnits::MilesPerHour),
            other => Err(ControlError::UnknownSpeedUnit(other.to_string())),
        }
    }
}

impl TryFrom<String> for SpeedUnits {
    type Error = ControlError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_conversion() {
        assert_eq!(SpeedUnits::MetersPerSecond.to_native(12.0), 12.0);
        assert!((SpeedUnits::KilometersPerHour.to_native(36.0) - 10.0).abs() < 1e-3);
        assert!((SpeedUnits::MilesPerHour.to_native(10.0) - 4.4704).abs() < 1e-4);
    }

    #[test]
    fn test_localized_conversion_inverts_native() {
        for units in [
            SpeedUnits::MetersPerSecond,
            SpeedUnits::KilometersPerHour,
            SpeedUnits::MilesPerHour,
        ] {
            let back = units.from_native(units.to_native(50.0));
            assert!((back - 50.0).abs() < 0.01, "{} drifted to {}", units, back);
        }
    }

    #[test]
    fn test_parse_units() {
        assert_eq!("mph".parse::<SpeedUnits>(), Ok(SpeedUnits::MilesPerHour));
        assert_eq!(
            "furlongs".parse::<SpeedUnits>(),
            Err(ControlError::UnknownSpeedUnit("furlongs".to_string()))
        );
    }
}
