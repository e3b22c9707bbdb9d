//! HMC5883L magnetometer driver
//!
//! With the MPU-6050 bypass switch closed the magnetometer sits directly on
//! the main bus and is reached through the same register layer.

use crate::interface::I2cRegisters;
use crate::registers::hmc5883l as reg;
use crate::sensors::{MagAveraging, MagBias, MagData, MagDataGauss, MagDataRate, MagGain, MagMode};
use crate::time::Clock;
use crate::twi::TransactionBus;
use crate::Error;

/// Magnetometer configuration applied by [`Hmc5883l::init`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompassConfig {
    /// Samples averaged per output
    pub averaging: MagAveraging,
    /// Output rate in continuous mode
    pub data_rate: MagDataRate,
    /// Measurement bias
    pub bias: MagBias,
    /// Field range and gain
    pub gain: MagGain,
    /// Operating mode
    pub mode: MagMode,
}

impl Default for CompassConfig {
    fn default() -> Self {
        Self {
            averaging: MagAveraging::Eight,
            data_rate: MagDataRate::Hz15,
            bias: MagBias::Normal,
            gain: MagGain::Ga1_3,
            mode: MagMode::Continuous,
        }
    }
}

/// HMC5883L driver
pub struct Hmc5883l<'a, B, C> {
    registers: &'a I2cRegisters<B, C>,
    gain: MagGain,
    mode: MagMode,
}

impl<'a, B, C> Hmc5883l<'a, B, C>
where
    B: TransactionBus,
    C: Clock,
{
    /// Create a driver, verifying the identification registers
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDevice`] with the first mismatching byte if
    /// the identification is not `"H43"`, or a communication error.
    pub fn new(registers: &'a I2cRegisters<B, C>) -> Result<Self, Error> {
        let driver = Self {
            registers,
            gain: MagGain::Ga1_3,
            mode: MagMode::Single,
        };

        let mut identity = [0u8; 3];
        registers.read_bytes(reg::ADDRESS, reg::ID_A, &mut identity)?;
        if let Some((&actual, _)) = identity
            .iter()
            .zip(&reg::IDENTITY)
            .find(|(actual, expected)| actual != expected)
        {
            return Err(Error::InvalidDevice(actual));
        }

        Ok(driver)
    }

    /// Configure averaging, rate, bias, gain and mode
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn init(&mut self, config: CompassConfig) -> Result<(), Error> {
        let mut config_a = reg::AVERAGING.insert(0, config.averaging as u16);
        config_a = reg::DATA_RATE.insert(config_a, config.data_rate as u16);
        config_a = reg::MEASUREMENT_BIAS.insert(config_a, config.bias as u16);
        self.registers
            .write_byte(reg::ADDRESS, reg::CONFIG_A, config_a.to_be_bytes()[1])?;

        self.set_gain(config.gain)?;
        self.set_mode(config.mode)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("HMC5883L initialized: {}", config);

        Ok(())
    }

    /// Set the number of samples averaged per output
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_sample_averaging(&mut self, averaging: MagAveraging) -> Result<(), Error> {
        self.registers.write_bits(reg::AVERAGING, averaging as u8)
    }

    /// Set the continuous-mode output rate
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_data_rate(&mut self, rate: MagDataRate) -> Result<(), Error> {
        self.registers.write_bits(reg::DATA_RATE, rate as u8)
    }

    /// Set the field range and gain
    ///
    /// The whole register is written since its other bits must stay clear.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_gain(&mut self, gain: MagGain) -> Result<(), Error> {
        let value = reg::GAIN.insert(0, gain as u16).to_be_bytes()[1];
        self.registers
            .write_byte(reg::ADDRESS, reg::CONFIG_B, value)?;
        self.gain = gain;
        Ok(())
    }

    /// Set the operating mode
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn set_mode(&mut self, mode: MagMode) -> Result<(), Error> {
        let value = reg::MODE_SELECT.insert(0, mode as u16).to_be_bytes()[1];
        self.registers.write_byte(reg::ADDRESS, reg::MODE, value)?;
        self.mode = mode;
        Ok(())
    }

    /// Gain last written
    pub const fn gain(&self) -> MagGain {
        self.gain
    }

    /// Mode last written
    pub const fn mode(&self) -> MagMode {
        self.mode
    }

    /// Read the three-axis field
    ///
    /// In single-measurement mode the next measurement is triggered after
    /// the read.
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_heading(&mut self) -> Result<MagData, Error> {
        let mut buffer = [0u8; reg::DATA_LENGTH];
        self.registers
            .read_bytes(reg::ADDRESS, reg::DATA_X_MSB, &mut buffer)?;
        if self.mode == MagMode::Single {
            self.set_mode(MagMode::Single)?;
        }
        Ok(MagData::from_registers(buffer))
    }

    /// Read the field in Gauss
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn read_heading_gauss(&mut self) -> Result<MagDataGauss, Error> {
        let raw = self.read_heading()?;
        Ok(MagDataGauss::from_raw(raw, self.gain))
    }

    /// `true` when a new measurement is available
    ///
    /// # Errors
    ///
    /// Returns an error if communication with the device fails.
    pub fn data_ready(&self) -> Result<bool, Error> {
        self.registers.read_bit(reg::STATUS_READY)
    }
}
