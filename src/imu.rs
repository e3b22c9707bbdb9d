//! Complete attitude pipeline
//!
//! [`Imu`] owns both sensor drivers, the orientation filter and the output
//! block. A typical firmware calls [`Imu::new`] once, restores or runs the
//! offset calibration, then calls [`Imu::update`] from its main loop.

use embedded_hal::delay::DelayNs;
use nalgebra::Vector3;

use crate::ahrs::{EulerAngles, Mahony, MahonyParams, UpdateOutcome};
use crate::calibration::{CalibrationOffsets, Calibrator};
use crate::compass::{CompassConfig, Hmc5883l};
use crate::device::{MotionData, Mpu6050, Mpu6050Config, SelfTestReport};
use crate::interface::I2cRegisters;
use crate::output::RegisterBlock;
use crate::sensors::{GyroDataRps, MagData};
use crate::storage::OffsetStore;
use crate::time::Clock;
use crate::twi::TransactionBus;
use crate::Error;

/// Longest gap between updates integrated as elapsed time, in milliseconds
pub const MAX_UPDATE_GAP_MS: u32 = 100;

/// One reading of all nine sensor axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// Accelerometer and gyroscope
    pub motion: MotionData,
    /// Magnetometer
    pub mag: MagData,
}

impl RawSample {
    /// Accel X/Y/Z, gyro X/Y/Z, mag X/Y/Z
    #[must_use]
    pub const fn axes(&self) -> [i16; 9] {
        let [ax, ay, az, gx, gy, gz] = self.motion.axes();
        let [mx, my, mz] = self.mag.as_array();
        [ax, ay, az, gx, gy, gz, mx, my, mz]
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImuConfig {
    /// Accelerometer and gyroscope setup
    pub mpu: Mpu6050Config,
    /// Magnetometer setup
    pub compass: CompassConfig,
    /// Filter gains
    pub filter: MahonyParams,
}

/// MPU-6050 + HMC5883L attitude pipeline
pub struct Imu<'a, B, C> {
    registers: &'a I2cRegisters<B, C>,
    mpu: Mpu6050<'a, B, C>,
    compass: Hmc5883l<'a, B, C>,
    filter: Mahony,
    block: RegisterBlock,
    last_sample: RawSample,
    last_update: Option<u32>,
}

impl<'a, B, C> Imu<'a, B, C>
where
    B: TransactionBus,
    C: Clock,
{
    /// Detect and configure both sensors
    ///
    /// The MPU-6050 is configured first since the magnetometer only becomes
    /// reachable once its bypass switch is closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDevice`] if either sensor does not identify
    /// correctly, or a communication error.
    pub fn new(registers: &'a I2cRegisters<B, C>, config: ImuConfig) -> Result<Self, Error> {
        let mut mpu = Mpu6050::new(registers)?;
        mpu.init(config.mpu)?;

        let mut compass = Hmc5883l::new(registers)?;
        compass.init(config.compass)?;

        Ok(Self {
            registers,
            mpu,
            compass,
            filter: Mahony::new(
                core::time::Duration::from_secs_f32(
                    1.0 / crate::ahrs::DEFAULT_SAMPLE_FREQUENCY_HZ,
                ),
                config.filter,
            ),
            block: RegisterBlock::new(),
            last_sample: RawSample::default(),
            last_update: None,
        })
    }

    /// Apply offsets saved by an earlier calibration
    ///
    /// Returns the applied offsets, or `None` if the store is empty.
    ///
    /// # Errors
    ///
    /// Propagates storage and communication errors.
    pub fn restore_offsets<S: OffsetStore>(
        &mut self,
        store: &mut S,
    ) -> Result<Option<CalibrationOffsets>, Error> {
        let offsets = store.load_offsets()?;
        if let Some(offsets) = &offsets {
            self.mpu.set_offsets(offsets)?;
            #[cfg(feature = "defmt")]
            defmt::info!("Restored calibration offsets: {}", offsets);
        }
        Ok(offsets)
    }

    /// Calibrate, persist the result and apply what was persisted
    ///
    /// The device must be stationary and level. The filter is reset
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CalibrationNotConverged`] if the search fails,
    /// [`Error::Storage`] if the saved offsets cannot be read back, or a
    /// communication error.
    pub fn calibrate<D, S>(
        &mut self,
        calibrator: &mut Calibrator<D>,
        store: &mut S,
    ) -> Result<CalibrationOffsets, Error>
    where
        D: DelayNs,
        S: OffsetStore,
    {
        let offsets = calibrator.run(&mut self.mpu)?;
        store.save_offsets(&offsets)?;

        let stored = store.load_offsets()?.ok_or(Error::Storage)?;
        self.mpu.set_offsets(&stored)?;

        self.filter.reset();
        self.last_update = None;
        Ok(stored)
    }

    /// Run the MPU-6050 factory self-test
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfTestFailed`] if any axis is out of tolerance, or
    /// a communication error.
    pub fn self_test<D: DelayNs>(&mut self, delay: &mut D) -> Result<SelfTestReport, Error> {
        self.mpu.verify_self_test(delay)
    }

    /// Read all nine axes
    ///
    /// # Errors
    ///
    /// Returns an error if communication with either sensor fails.
    pub fn read_raw(&mut self) -> Result<RawSample, Error> {
        let motion = self.mpu.read_motion()?;
        let mag = self.compass.read_heading()?;
        Ok(RawSample { motion, mag })
    }

    /// Sample both sensors, advance the filter and refresh the output block
    ///
    /// The integration step is the time elapsed since the previous update.
    /// The first update, updates less than a millisecond apart and updates
    /// more than [`MAX_UPDATE_GAP_MS`] apart use the filter's nominal period
    /// instead.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with either sensor fails. The
    /// filter and output block are left untouched in that case.
    pub fn update(&mut self) -> Result<UpdateOutcome, Error> {
        let sample = self.read_raw()?;
        let now = self.registers.clock().millis();

        let dt = match self.last_update.map(|previous| now.wrapping_sub(previous)) {
            Some(gap @ 1..=MAX_UPDATE_GAP_MS) => {
                #[allow(clippy::cast_precision_loss)]
                let elapsed = gap as f32 / 1000.0;
                elapsed
            }
            _ => self.filter.sample_period(),
        };
        self.last_update = Some(now);

        let rate = GyroDataRps::from_raw(sample.motion.gyro, self.mpu.gyro_scale());
        let gyro = Vector3::new(rate.x, rate.y, rate.z);
        let accel = Self::to_vector(sample.motion.accel.as_array());
        let mag = Self::to_vector(sample.mag.as_array());

        let outcome = self.filter.update_with_dt(gyro, accel, mag, dt);

        self.last_sample = sample;
        self.block.write_raw_sample(&sample);
        self.block
            .write_orientation(&self.filter.euler_angles_degrees());

        Ok(outcome)
    }

    fn to_vector(axes: [i16; 3]) -> Vector3<f32> {
        Vector3::new(f32::from(axes[0]), f32::from(axes[1]), f32::from(axes[2]))
    }

    /// Current orientation in radians
    #[must_use]
    pub fn orientation(&self) -> EulerAngles {
        self.filter.euler_angles()
    }

    /// Current orientation in degrees
    #[must_use]
    pub fn orientation_degrees(&self) -> EulerAngles {
        self.filter.euler_angles_degrees()
    }

    /// Sample used by the last successful [`update`](Self::update)
    #[must_use]
    pub const fn last_sample(&self) -> &RawSample {
        &self.last_sample
    }

    /// Output block as of the last successful [`update`](Self::update)
    #[must_use]
    pub const fn register_block(&self) -> &RegisterBlock {
        &self.block
    }

    /// Orientation filter
    #[must_use]
    pub const fn filter(&self) -> &Mahony {
        &self.filter
    }

    /// Orientation filter, e.g. to seed an initial orientation
    pub fn filter_mut(&mut self) -> &mut Mahony {
        &mut self.filter
    }

    /// Accelerometer and gyroscope driver
    pub fn mpu(&mut self) -> &mut Mpu6050<'a, B, C> {
        &mut self.mpu
    }

    /// Magnetometer driver
    pub fn compass(&mut self) -> &mut Hmc5883l<'a, B, C> {
        &mut self.compass
    }
}
