//! Accelerometer and gyroscope offset calibration
//!
//! [`Calibrator`] searches for hardware offset register values that make a
//! stationary, level device read zero on every axis except accelerometer Z,
//! which should read +1 g for the configured range. Each iteration writes the
//! current guess, averages a long run of samples and nudges every axis that
//! is still outside its dead-zone.

use embedded_hal::delay::DelayNs;

use crate::device::MotionData;
use crate::Error;

/// Six hardware offset register values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationOffsets {
    /// Accelerometer offsets, X/Y/Z
    pub accel: [i16; 3],
    /// Gyroscope offsets, X/Y/Z
    pub gyro: [i16; 3],
}

impl CalibrationOffsets {
    /// All offsets zero
    pub const ZERO: Self = Self {
        accel: [0; 3],
        gyro: [0; 3],
    };

    /// Build from accel X/Y/Z followed by gyro X/Y/Z
    #[must_use]
    pub const fn from_array(values: [i16; 6]) -> Self {
        Self {
            accel: [values[0], values[1], values[2]],
            gyro: [values[3], values[4], values[5]],
        }
    }

    /// Accel X/Y/Z followed by gyro X/Y/Z
    #[must_use]
    pub const fn as_array(&self) -> [i16; 6] {
        [
            self.accel[0],
            self.accel[1],
            self.accel[2],
            self.gyro[0],
            self.gyro[1],
            self.gyro[2],
        ]
    }
}

/// Device that can be calibrated
///
/// Implemented by [`Mpu6050`](crate::Mpu6050); tests provide sensor models.
pub trait CalibrationTarget {
    /// Write all six offset registers
    ///
    /// # Errors
    ///
    /// Returns an error if the offsets cannot be written.
    fn apply_offsets(&mut self, offsets: &CalibrationOffsets) -> Result<(), Error>;

    /// Read one accelerometer + gyroscope sample
    ///
    /// # Errors
    ///
    /// Returns an error if the sample cannot be read.
    fn read_motion(&mut self) -> Result<MotionData, Error>;

    /// Raw accelerometer reading corresponding to 1 g in the current range
    fn one_g(&self) -> i32;
}

/// Calibration parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationConfig {
    /// Samples averaged per mean measurement
    pub samples: u32,
    /// Samples read and discarded before averaging
    pub warmup_samples: u32,
    /// Pause after every sample, in microseconds
    pub sample_interval_us: u32,
    /// Accelerometer tolerance in raw LSB
    pub accel_deadzone: i32,
    /// Gyroscope tolerance in raw LSB
    pub gyro_deadzone: i32,
    /// Refinement iterations before giving up
    pub max_iterations: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            warmup_samples: 101,
            sample_interval_us: 10_000,
            accel_deadzone: 8,
            gyro_deadzone: 1,
            max_iterations: 64,
        }
    }
}

/// Offset calibration engine
pub struct Calibrator<D> {
    delay: D,
    config: CalibrationConfig,
}

impl<D: DelayNs> Calibrator<D> {
    /// Create a calibrator
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `samples` is zero or a dead-zone
    /// is negative.
    pub fn new(delay: D, config: CalibrationConfig) -> Result<Self, Error> {
        if config.samples == 0 || config.accel_deadzone < 0 || config.gyro_deadzone < 0 {
            return Err(Error::InvalidConfig);
        }
        Ok(Self { delay, config })
    }

    /// Active configuration
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Release the delay provider
    pub fn release(self) -> D {
        self.delay
    }

    /// Average `samples` readings after discarding the warm-up run
    ///
    /// Means are truncated toward zero. Returns accel X/Y/Z then gyro X/Y/Z.
    ///
    /// # Errors
    ///
    /// Propagates read failures from the target.
    pub fn measure_means<T: CalibrationTarget>(&mut self, target: &mut T) -> Result<[i32; 6], Error> {
        for _ in 0..self.config.warmup_samples {
            target.read_motion()?;
            self.delay.delay_us(self.config.sample_interval_us);
        }

        let mut sums = [0i64; 6];
        for _ in 0..self.config.samples {
            let sample = target.read_motion()?;
            for (sum, value) in sums.iter_mut().zip(sample.axes()) {
                *sum += i64::from(value);
            }
            self.delay.delay_us(self.config.sample_interval_us);
        }

        let count = i64::from(self.config.samples);
        let mut means = [0i32; 6];
        for (mean, sum) in means.iter_mut().zip(sums) {
            // A mean of i16 samples always fits in i32
            *mean = i32::try_from(sum / count).unwrap_or_default();
        }
        Ok(means)
    }

    /// Run the full calibration
    ///
    /// Zeroes the offset registers, measures, then refines the offsets until
    /// all six axes fall inside their dead-zones in the same iteration. The
    /// final offsets are left applied to the target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CalibrationNotConverged`] after `max_iterations`
    /// refinements without convergence, or propagates target failures.
    pub fn run<T: CalibrationTarget>(&mut self, target: &mut T) -> Result<CalibrationOffsets, Error> {
        let one_g = target.one_g();
        let accel_deadzone = self.config.accel_deadzone;
        let gyro_deadzone = self.config.gyro_deadzone;

        target.apply_offsets(&CalibrationOffsets::ZERO)?;
        let means = self.measure_means(target)?;

        let mut offsets = [
            -means[0] / 8,
            -means[1] / 8,
            (one_g - means[2]) / 8,
            -means[3] / 4,
            -means[4] / 4,
            -means[5] / 4,
        ];

        for iteration in 0..self.config.max_iterations {
            target.apply_offsets(&to_offsets(&offsets))?;
            let means = self.measure_means(target)?;

            let mut ready = 0;
            for axis in 0..3 {
                let residual = if axis == 2 {
                    one_g - means[axis]
                } else {
                    -means[axis]
                };
                if residual.abs() <= accel_deadzone {
                    ready += 1;
                } else {
                    offsets[axis] = nudge(offsets[axis], residual / accel_deadzone.max(1));
                }
            }
            for axis in 3..6 {
                if means[axis].abs() <= gyro_deadzone {
                    ready += 1;
                } else {
                    offsets[axis] = nudge(offsets[axis], -(means[axis] / (gyro_deadzone + 1)));
                }
            }

            #[cfg(feature = "defmt")]
            defmt::debug!(
                "Calibration iteration {}: means {}, {} axes settled",
                iteration,
                means,
                ready
            );

            if ready == 6 {
                let result = to_offsets(&offsets);
                #[cfg(feature = "defmt")]
                defmt::info!("Calibration converged after {} iterations: {}", iteration + 1, result);
                #[cfg(not(feature = "defmt"))]
                let _ = iteration;
                return Ok(result);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::warn!(
            "Calibration did not converge in {} iterations",
            self.config.max_iterations
        );
        Err(Error::CalibrationNotConverged)
    }
}

/// Move an offset guess by `step`, staying within the register range
fn nudge(value: i32, step: i32) -> i32 {
    value
        .saturating_add(step)
        .clamp(i32::from(i16::MIN), i32::from(i16::MAX))
}

fn to_offsets(values: &[i32; 6]) -> CalibrationOffsets {
    let mut clamped = [0i16; 6];
    for (out, &value) in clamped.iter_mut().zip(values) {
        #[allow(clippy::cast_possible_truncation)]
        let value = value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        *out = value;
    }
    CalibrationOffsets::from_array(clamped)
}
