//! Sensor types
//!
//! Ranges, configuration enums and sample types for each sensor:
//! - Accelerometer (3-axis, MPU-6050)
//! - Gyroscope (3-axis, MPU-6050)
//! - Magnetometer (3-axis, HMC5883L)
//!
//! Bus operations live on [`Mpu6050`](crate::Mpu6050) and
//! [`Hmc5883l`](crate::Hmc5883l).

pub mod accelerometer;
pub mod gyroscope;
pub mod magnetometer;

// Re-export main types
pub use accelerometer::{AccelData, AccelDataG, AccelFullScale};
pub use gyroscope::{GyroData, GyroDataDps, GyroDataRps, GyroFullScale};
pub use magnetometer::{
    MagAveraging, MagBias, MagData, MagDataGauss, MagDataRate, MagGain, MagMode,
};
