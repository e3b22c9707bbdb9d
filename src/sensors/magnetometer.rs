//! Magnetometer sensor types
//!
//! Configuration enums and sample types for the HMC5883L 3-axis magnetometer.

/// Number of samples averaged per measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagAveraging {
    /// No averaging
    One = 0,
    /// 2 samples
    Two = 1,
    /// 4 samples
    Four = 2,
    /// 8 samples
    Eight = 3,
}

/// Typical data output rate in continuous mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagDataRate {
    /// 0.75 Hz
    Hz0_75 = 0,
    /// 1.5 Hz
    Hz1_5 = 1,
    /// 3 Hz
    Hz3 = 2,
    /// 7.5 Hz
    Hz7_5 = 3,
    /// 15 Hz
    Hz15 = 4,
    /// 30 Hz
    Hz30 = 5,
    /// 75 Hz
    Hz75 = 6,
}

impl MagDataRate {
    /// Output rate in Hz
    #[must_use]
    pub const fn hz(self) -> f32 {
        match self {
            Self::Hz0_75 => 0.75,
            Self::Hz1_5 => 1.5,
            Self::Hz3 => 3.0,
            Self::Hz7_5 => 7.5,
            Self::Hz15 => 15.0,
            Self::Hz30 => 30.0,
            Self::Hz75 => 75.0,
        }
    }
}

/// Measurement bias applied to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagBias {
    /// Normal measurement
    Normal = 0,
    /// Positive self-test bias
    Positive = 1,
    /// Negative self-test bias
    Negative = 2,
}

/// Sensor field range and gain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagGain {
    /// ±0.88 Ga
    Ga0_88 = 0,
    /// ±1.3 Ga
    Ga1_3 = 1,
    /// ±1.9 Ga
    Ga1_9 = 2,
    /// ±2.5 Ga
    Ga2_5 = 3,
    /// ±4.0 Ga
    Ga4_0 = 4,
    /// ±4.7 Ga
    Ga4_7 = 5,
    /// ±5.6 Ga
    Ga5_6 = 6,
    /// ±8.1 Ga
    Ga8_1 = 7,
}

impl MagGain {
    /// Sensitivity in LSB/Gauss
    #[must_use]
    pub const fn lsb_per_gauss(self) -> f32 {
        match self {
            Self::Ga0_88 => 1370.0,
            Self::Ga1_3 => 1090.0,
            Self::Ga1_9 => 820.0,
            Self::Ga2_5 => 660.0,
            Self::Ga4_0 => 440.0,
            Self::Ga4_7 => 390.0,
            Self::Ga5_6 => 330.0,
            Self::Ga8_1 => 230.0,
        }
    }
}

/// Magnetometer operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MagMode {
    /// Continuous measurement mode
    Continuous = 0,
    /// Single measurement, then idle
    Single = 1,
    /// Idle mode
    Idle = 2,
}

/// Magnetometer data (raw 16-bit values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MagData {
    /// X-axis magnetic field (raw)
    pub x: i16,
    /// Y-axis magnetic field (raw)
    pub y: i16,
    /// Z-axis magnetic field (raw)
    pub z: i16,
}

impl MagData {
    /// Decode the output registers, which arrive in X, Z, Y order
    #[must_use]
    pub const fn from_registers(bytes: [u8; 6]) -> Self {
        Self {
            x: i16::from_be_bytes([bytes[0], bytes[1]]),
            z: i16::from_be_bytes([bytes[2], bytes[3]]),
            y: i16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }

    /// Axes as an array, X/Y/Z
    #[must_use]
    pub const fn as_array(&self) -> [i16; 3] {
        [self.x, self.y, self.z]
    }
}

/// Magnetometer data in Gauss
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MagDataGauss {
    /// X-axis magnetic field in Ga
    pub x: f32,
    /// Y-axis magnetic field in Ga
    pub y: f32,
    /// Z-axis magnetic field in Ga
    pub z: f32,
}

impl MagDataGauss {
    /// Convert raw readings using the gain setting
    #[must_use]
    pub fn from_raw(raw: MagData, gain: MagGain) -> Self {
        let scale = gain.lsb_per_gauss();
        Self {
            x: f32::from(raw.x) / scale,
            y: f32::from(raw.y) / scale,
            z: f32::from(raw.z) / scale,
        }
    }
}
