//! Gyroscope sensor types
//!
//! Full-scale ranges and raw/physical sample types for the MPU-6050 gyroscope.

use core::f32::consts::PI;

/// Gyroscope full-scale range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyroFullScale {
    /// ±250°/s range
    Dps250 = 0,
    /// ±500°/s range
    Dps500 = 1,
    /// ±1000°/s range
    Dps1000 = 2,
    /// ±2000°/s range
    Dps2000 = 3,
}

impl GyroFullScale {
    /// Get the sensitivity in LSB/(°/s)
    ///
    /// This is used to convert raw sensor values to physical units.
    #[must_use]
    pub const fn sensitivity(self) -> f32 {
        match self {
            Self::Dps250 => 131.0, // LSB/(°/s)
            Self::Dps500 => 65.5,  // LSB/(°/s)
            Self::Dps1000 => 32.8, // LSB/(°/s)
            Self::Dps2000 => 16.4, // LSB/(°/s)
        }
    }

    /// Get the maximum value in °/s
    #[must_use]
    pub const fn max_value(self) -> u16 {
        match self {
            Self::Dps250 => 250,
            Self::Dps500 => 500,
            Self::Dps1000 => 1000,
            Self::Dps2000 => 2000,
        }
    }

    /// Decode the `FS_SEL` field
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Dps250,
            1 => Self::Dps500,
            2 => Self::Dps1000,
            _ => Self::Dps2000,
        }
    }
}

/// Gyroscope data (raw 16-bit values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroData {
    /// X-axis rotation (raw)
    pub x: i16,
    /// Y-axis rotation (raw)
    pub y: i16,
    /// Z-axis rotation (raw)
    pub z: i16,
}

impl GyroData {
    /// Axes as an array, X/Y/Z
    #[must_use]
    pub const fn as_array(&self) -> [i16; 3] {
        [self.x, self.y, self.z]
    }
}

/// Gyroscope data in degrees per second
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroDataDps {
    /// X-axis rotation in °/s
    pub x: f32,
    /// Y-axis rotation in °/s
    pub y: f32,
    /// Z-axis rotation in °/s
    pub z: f32,
}

impl GyroDataDps {
    /// Convert raw readings using the range sensitivity
    #[must_use]
    pub fn from_raw(raw: GyroData, scale: GyroFullScale) -> Self {
        let sensitivity = scale.sensitivity();
        Self {
            x: f32::from(raw.x) / sensitivity,
            y: f32::from(raw.y) / sensitivity,
            z: f32::from(raw.z) / sensitivity,
        }
    }

    /// Convert to radians per second
    #[must_use]
    pub fn to_rps(&self) -> GyroDataRps {
        const DEG_TO_RAD: f32 = PI / 180.0;
        GyroDataRps {
            x: self.x * DEG_TO_RAD,
            y: self.y * DEG_TO_RAD,
            z: self.z * DEG_TO_RAD,
        }
    }
}

/// Gyroscope data in radians per second
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroDataRps {
    /// X-axis rotation in rad/s
    pub x: f32,
    /// Y-axis rotation in rad/s
    pub y: f32,
    /// Z-axis rotation in rad/s
    pub z: f32,
}

impl GyroDataRps {
    /// Convert raw readings using the range sensitivity
    #[must_use]
    pub fn from_raw(raw: GyroData, scale: GyroFullScale) -> Self {
        GyroDataDps::from_raw(raw, scale).to_rps()
    }
}
