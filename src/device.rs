//! MPU-6050 accelerometer and gyroscope driver
//!
//! The driver borrows a shared [`I2cRegisters`] so that the magnetometer
//! behind the MPU-6050's bypass switch can use the same bus.

use crate::calibration::{CalibrationOffsets, CalibrationTarget};
use crate::interface::I2cRegisters;
use crate::registers::mpu6050 as reg;
use crate::sensors::{AccelData, AccelFullScale, GyroData, GyroFullScale};
use crate::time::Clock;
use crate::twi::TransactionBus;
use crate::Error;

/// Self-test passes when every deviation is below this value
pub const SELF_TEST_LIMIT: f32 = 1.0;

/// Clock source selection (`PWR_MGMT_1.CLKSEL`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Internal 8 MHz oscillator
    Internal = 0,
    /// PLL with X axis gyroscope reference
    PllXGyro = 1,
    /// PLL with Y axis gyroscope reference
    PllYGyro = 2,
    /// PLL with Z axis gyroscope reference
    PllZGyro = 3,
    /// PLL with external 32.768 kHz reference
    PllExternal32k = 4,
    /// PLL with external 19.2 MHz reference
    PllExternal19M = 5,
    /// Stops the clock and keeps the timing generator in reset
    Stop = 7,
}

/// Device configuration applied by [`Mpu6050::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mpu6050Config {
    /// Clock source
    pub clock_source: ClockSource,
    /// Gyroscope full-scale range
    pub gyro_scale: GyroFullScale,
    /// Accelerometer full-scale range
    pub accel_scale: AccelFullScale,
    /// Connect the auxiliary bus (and the magnetometer on it) to the main bus
    pub i2c_bypass: bool,
}

impl Default for Mpu6050Config {
    fn default() -> Self {
        Self {
            clock_source: ClockSource::PllXGyro,
            gyro_scale: GyroFullScale::Dps500,
            accel_scale: AccelFullScale::G8,
            i2c_bypass: true,
        }
    }
}

/// One accelerometer + gyroscope sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionData {
    /// Accelerometer reading
    pub accel: AccelData,
    /// Gyroscope reading
    pub gyro: GyroData,
}

impl MotionData {
    /// Decode the 14-byte burst starting at `ACCEL_XOUT_H`; temperature bytes are skipped
    #[must_use]
    pub const fn from_burst(buffer: &[u8; reg::MOTION_BURST_LENGTH]) -> Self {
        Self {
            accel: AccelData {
                x: i16::from_be_bytes([buffer[0], buffer[1]]),
                y: i16::from_be_bytes([buffer[2], buffer[3]]),
                z: i16::from_be_bytes([buffer[4], buffer[5]]),
            },
            gyro: GyroData {
                x: i16::from_be_bytes([buffer[8], buffer[9]]),
                y: i16::from_be_bytes([buffer[10], buffer[11]]),
                z: i16::from_be_bytes([buffer[12], buffer[13]]),
            },
        }
    }

    /// All six axes, accel X/Y/Z then gyro X/Y/Z
    #[must_use]
    pub const fn axes(&self) -> [i16; 6] {
        [
            self.accel.x,
            self.accel.y,
            self.accel.z,
            self.gyro.x,
            self.gyro.y,
            self.gyro.z,
        ]
    }
}

/// Factory self-test outcome
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SelfTestReport {
    /// 5-bit self-test codes, accel X/Y/Z then gyro X/Y/Z
    pub codes: [u8; 6],
    /// Deviation from factory trim per axis, same order
    pub deviations: [f32; 6],
}

impl SelfTestReport {
    /// Grade the raw `SELF_TEST_X..=SELF_TEST_A` registers
    #[must_use]
    pub fn from_registers(raw: [u8; 4]) -> Self {
        let codes = self_test_codes(raw);
        Self {
            codes,
            deviations: self_test_deviations(codes),
        }
    }

    /// `true` if every axis is within tolerance
    #[must_use]
    pub fn passed(&self) -> bool {
        self.deviations.iter().all(|&d| d < SELF_TEST_LIMIT)
    }
}

/// Extract the six 5-bit self-test codes
#[must_use]
pub const fn self_test_codes(raw: [u8; 4]) -> [u8; 6] {
    [
        (raw[0] >> 3) | ((raw[3] & 0x30) >> 4),
        (raw[1] >> 3) | ((raw[3] & 0x0C) >> 2),
        (raw[2] >> 3) | (raw[3] & 0x03),
        raw[0] & 0x1F,
        raw[1] & 0x1F,
        raw[2] & 0x1F,
    ]
}

/// Factory trim reference for each axis
///
/// The Y gyroscope reference is negative, as programmed in the part's
/// reference formula.
#[must_use]
pub fn factory_trim(codes: [u8; 6]) -> [f32; 6] {
    let accel = |code: u8| {
        (4096.0 * 0.34) * libm::powf(0.92 / 0.34, (f32::from(code) - 1.0) / 30.0)
    };
    let gyro = |code: u8| (25.0 * 131.0) * libm::powf(1.046, f32::from(code) - 1.0);

    [
        accel(codes[0]),
        accel(codes[1]),
        accel(codes[2]),
        gyro(codes[3]),
        -gyro(codes[4]),
        gyro(codes[5]),
    ]
}

/// Percent-style deviation of each code from its factory trim
#[must_use]
pub fn self_test_deviations(codes: [u8; 6]) -> [f32; 6] {
    let trim = factory_trim(codes);
    let mut deviations = [0.0; 6];
    for ((deviation, &code), &ft) in deviations.iter_mut().zip(&codes).zip(&trim) {
        *deviation = 100.0 + 100.0 * (f32::from(code) - ft) / ft;
    }
    deviations
}

/// Main driver for the MPU-6050
pub struct Mpu6050<'a, B, C> {
    registers: &'a I2cRegisters<B, C>,
    address: u8,
    accel_scale: AccelFullScale,
    gyro_scale: GyroFullScale,
}

impl<'a, B, C> Mpu6050<'a, B, C>
where
    B: TransactionBus,
    C: Clock,
{
    /// Create a driver at the default address (0x68)
    ///
    /// This will verify the `WHO_AM_I` register but will not configure the
    /// device. Call `init()` after construction.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Communication with the device fails
    /// - The `WHO_AM_I` field contains an unexpected value
    pub fn new(registers: &'a I2cRegisters<B, C>) -> Result<Self, Error> {
        Self::with_address(registers, reg::ADDRESS)
    }

    /// Create a driver at a custom address
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_address(registers: &'a I2cRegisters<B, C>, address: u8) -> Result<Self, Error> {
        let driver = Self {
            registers,
            address,
            accel_scale: AccelFullScale::G2,
            gyro_scale: GyroFullScale::Dps250,
        };

        let who_am_i = driver.read_who_am_i()?;
        if who_am_i != reg::WHO_AM_I_VALUE {
            #[cfg(feature = "defmt")]
            defmt::warn!("MPU-6050 WHO_AM_I mismatch: {=u8:#x}", who_am_i);
            return Err(Error::InvalidDevice(who_am_i));
        }

        Ok(driver)
    }

    /// Apply a configuration and wake the device
    ///
    /// Disables the auxiliary bus master, sets the bypass switch, selects the
    /// clock source and both full-scale ranges, then clears the sleep bit.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn init(&mut self, config: Mpu6050Config) -> Result<(), Error> {
        self.set_i2c_master_mode_enabled(false)?;
        self.set_i2c_bypass_enabled(config.i2c_bypass)?;
        self.set_clock_source(config.clock_source)?;
        self.set_full_scale_gyro_range(config.gyro_scale)?;
        self.set_full_scale_accel_range(config.accel_scale)?;
        self.set_sleep_enabled(false)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("MPU-6050 initialized: {}", config);

        Ok(())
    }

    /// Device address in use
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Read the 6-bit identity field of `WHO_AM_I`
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_who_am_i(&self) -> Result<u8, Error> {
        self.registers.read_bits(reg::WHO_AM_I_ID.at(self.address))
    }

    /// Select the clock source
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_clock_source(&mut self, source: ClockSource) -> Result<(), Error> {
        self.registers
            .write_bits(reg::CLKSEL.at(self.address), source as u8)
    }

    /// Set the gyroscope full-scale range
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_full_scale_gyro_range(&mut self, scale: GyroFullScale) -> Result<(), Error> {
        self.registers
            .write_bits(reg::GYRO_FS_SEL.at(self.address), scale as u8)?;
        self.gyro_scale = scale;
        Ok(())
    }

    /// Set the accelerometer full-scale range
    ///
    /// Offsets found by calibration are only valid for the range they were
    /// computed with.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_full_scale_accel_range(&mut self, scale: AccelFullScale) -> Result<(), Error> {
        self.registers
            .write_bits(reg::ACCEL_AFS_SEL.at(self.address), scale as u8)?;
        self.accel_scale = scale;
        Ok(())
    }

    /// Read the gyroscope range back from the device
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_full_scale_gyro_range(&mut self) -> Result<GyroFullScale, Error> {
        let bits = self
            .registers
            .read_bits(reg::GYRO_FS_SEL.at(self.address))?;
        self.gyro_scale = GyroFullScale::from_bits(bits);
        Ok(self.gyro_scale)
    }

    /// Read the accelerometer range back from the device
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_full_scale_accel_range(&mut self) -> Result<AccelFullScale, Error> {
        let bits = self
            .registers
            .read_bits(reg::ACCEL_AFS_SEL.at(self.address))?;
        self.accel_scale = AccelFullScale::from_bits(bits);
        Ok(self.accel_scale)
    }

    /// Gyroscope range last written or read
    pub const fn gyro_scale(&self) -> GyroFullScale {
        self.gyro_scale
    }

    /// Accelerometer range last written or read
    pub const fn accel_scale(&self) -> AccelFullScale {
        self.accel_scale
    }

    /// Enter or leave sleep mode
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_sleep_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        self.registers
            .write_bit(reg::SLEEP.at(self.address), enabled)
    }

    /// Enable or disable the auxiliary bus master
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_i2c_master_mode_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        self.registers
            .write_bit(reg::I2C_MST_EN.at(self.address), enabled)
    }

    /// Connect or disconnect the auxiliary bus from the main bus
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_i2c_bypass_enabled(&mut self, enabled: bool) -> Result<(), Error> {
        self.registers
            .write_bit(reg::I2C_BYPASS_EN.at(self.address), enabled)
    }

    /// Read accelerometer and gyroscope in one burst
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_motion(&self) -> Result<MotionData, Error> {
        let mut buffer = [0u8; reg::MOTION_BURST_LENGTH];
        self.registers
            .read_bytes(self.address, reg::ACCEL_XOUT_H, &mut buffer)?;
        Ok(MotionData::from_burst(&buffer))
    }

    /// Read the raw temperature
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_temperature(&self) -> Result<i16, Error> {
        let raw = self.registers.read_word(self.address, reg::TEMP_OUT_H)?;
        Ok(i16::from_be_bytes(raw.to_be_bytes()))
    }

    /// Convert a raw temperature reading to degrees Celsius
    #[must_use]
    pub fn temperature_to_celsius(raw: i16) -> f32 {
        f32::from(raw) / 340.0 + 36.53
    }

    /// Read the temperature in degrees Celsius
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_temperature_celsius(&self) -> Result<f32, Error> {
        Ok(Self::temperature_to_celsius(self.read_temperature()?))
    }

    /// Write all six hardware offset registers
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_offsets(&mut self, offsets: &CalibrationOffsets) -> Result<(), Error> {
        let registers = reg::ACCEL_OFFSET_REGISTERS
            .iter()
            .chain(&reg::GYRO_OFFSET_REGISTERS);
        for (&register, &value) in registers.zip(offsets.accel.iter().chain(&offsets.gyro)) {
            self.registers
                .write_word(self.address, register, u16::from_be_bytes(value.to_be_bytes()))?;
        }
        Ok(())
    }

    /// Read all six hardware offset registers
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_offsets(&self) -> Result<CalibrationOffsets, Error> {
        let mut offsets = CalibrationOffsets::default();
        for (&register, value) in reg::ACCEL_OFFSET_REGISTERS.iter().zip(&mut offsets.accel) {
            let word = self.registers.read_word(self.address, register)?;
            *value = i16::from_be_bytes(word.to_be_bytes());
        }
        for (&register, value) in reg::GYRO_OFFSET_REGISTERS.iter().zip(&mut offsets.gyro) {
            let word = self.registers.read_word(self.address, register)?;
            *value = i16::from_be_bytes(word.to_be_bytes());
        }
        Ok(offsets)
    }

    /// Run the factory self-test
    ///
    /// Enables self-test on all axes, waits for the response, reads the
    /// self-test registers and grades each axis against its factory trim.
    /// The full-scale configuration in effect before the test is restored and
    /// self-test mode is left disabled, also when the measurement fails.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn self_test<D>(&mut self, delay: &mut D) -> Result<SelfTestReport, Error>
    where
        D: embedded_hal::delay::DelayNs,
    {
        let accel_scale = self.accel_scale;
        let gyro_scale = self.gyro_scale;

        let address = self.address;
        let registers = self.registers;
        let measured = registers
            .write_byte(address, reg::ACCEL_CONFIG, reg::ACCEL_SELF_TEST_CONFIG)
            .and_then(|()| {
                registers.write_byte(address, reg::GYRO_CONFIG, reg::GYRO_SELF_TEST_CONFIG)
            })
            .and_then(|()| {
                delay.delay_us(250);
                let mut raw = [0u8; 4];
                registers
                    .read_bytes(address, reg::SELF_TEST_X, &mut raw)
                    .map(|()| raw)
            });

        // Restore runs even when the measurement failed. Whole-register
        // writes clear the self-test enable bits.
        let accel_config = reg::ACCEL_AFS_SEL.insert(0, accel_scale as u16).to_be_bytes()[1];
        let gyro_config = reg::GYRO_FS_SEL.insert(0, gyro_scale as u16).to_be_bytes()[1];
        let accel_restored = registers.write_byte(address, reg::ACCEL_CONFIG, accel_config);
        let gyro_restored = registers.write_byte(address, reg::GYRO_CONFIG, gyro_config);

        let report = SelfTestReport::from_registers(measured?);
        accel_restored?;
        gyro_restored?;

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "MPU-6050 self-test deviations: {}, passed: {}",
            report.deviations,
            report.passed()
        );

        Ok(report)
    }

    /// Run the factory self-test and fail if any axis is out of tolerance
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfTestFailed`] if the report does not pass, or a
    /// communication error.
    pub fn verify_self_test<D>(&mut self, delay: &mut D) -> Result<SelfTestReport, Error>
    where
        D: embedded_hal::delay::DelayNs,
    {
        let report = self.self_test(delay)?;
        if report.passed() {
            Ok(report)
        } else {
            Err(Error::SelfTestFailed)
        }
    }
}

impl<B, C> CalibrationTarget for Mpu6050<'_, B, C>
where
    B: TransactionBus,
    C: Clock,
{
    fn apply_offsets(&mut self, offsets: &CalibrationOffsets) -> Result<(), Error> {
        self.set_offsets(offsets)
    }

    fn read_motion(&mut self) -> Result<MotionData, Error> {
        Mpu6050::read_motion(self)
    }

    fn one_g(&self) -> i32 {
        self.accel_scale.one_g()
    }
}
