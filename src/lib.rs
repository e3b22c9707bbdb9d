#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod ahrs;
pub mod calibration;
pub mod compass;
pub mod device;
pub mod imu;
pub mod interface;
pub mod output;
pub mod registers;
pub mod sensors;
pub mod storage;
pub mod time;
pub mod twi;

// Re-export main types
pub use ahrs::{EulerAngles, Mahony, MahonyParams, UpdateOutcome};
pub use calibration::{CalibrationConfig, CalibrationOffsets, CalibrationTarget, Calibrator};
pub use compass::{CompassConfig, Hmc5883l};
pub use device::{ClockSource, MotionData, Mpu6050, Mpu6050Config, SelfTestReport};
pub use imu::{Imu, ImuConfig, RawSample};
pub use interface::{I2cRegisters, RegisterDescriptor};
pub use output::RegisterBlock;
pub use sensors::{
    AccelData, AccelDataG, AccelFullScale, GyroData, GyroDataDps, GyroDataRps, GyroFullScale,
    MagAveraging, MagBias, MagData, MagDataGauss, MagDataRate, MagGain, MagMode,
};
pub use storage::{MemoryOffsetStore, OffsetStore};
pub use time::{Clock, TickCounter};
pub use twi::{
    TWI_BUFFER_LENGTH, TransactionBus, TwiBus, TwiConfig, TwiError, TwiPeripheral, TwiState,
    TwiStatus,
};

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bus transaction failed
    Bus(TwiError),
    /// Transaction did not complete within the configured budget
    Timeout,
    /// Identification register holds an unexpected value (contains the value read)
    InvalidDevice(u8),
    /// Invalid configuration parameter
    InvalidConfig,
    /// Factory self-test reported a deviation outside tolerance
    SelfTestFailed,
    /// Offset calibration hit its iteration bound before all axes settled
    CalibrationNotConverged,
    /// Offset storage could not be read or written
    Storage,
}

impl From<TwiError> for Error {
    fn from(error: TwiError) -> Self {
        Self::Bus(error)
    }
}
