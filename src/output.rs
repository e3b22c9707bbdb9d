//! Fixed-layout output block
//!
//! The block is what an external bus peer reads from the board:
//!
//! | Offset | Content                                   |
//! |--------|-------------------------------------------|
//! | 0x00   | roll, `f32` degrees                       |
//! | 0x04   | pitch, `f32` degrees                      |
//! | 0x08   | yaw, `f32` degrees                        |
//! | 0x0C   | accel X/Y/Z, gyro X/Y/Z, mag X/Y/Z, `i16` |
//!
//! All values are stored in native byte order.

use crate::ahrs::EulerAngles;
use crate::imu::RawSample;

/// Total size of the block
pub const REGISTER_BLOCK_LENGTH: usize = 30;

/// Offset of the roll angle
pub const ROLL_OFFSET: usize = 0x00;
/// Offset of the pitch angle
pub const PITCH_OFFSET: usize = 0x04;
/// Offset of the yaw angle
pub const YAW_OFFSET: usize = 0x08;
/// Offset of the first raw sample word
pub const RAW_SAMPLE_OFFSET: usize = 0x0C;

/// Byte buffer exposed to the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterBlock {
    bytes: [u8; REGISTER_BLOCK_LENGTH],
}

impl Default for RegisterBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBlock {
    /// Create a zeroed block
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0; REGISTER_BLOCK_LENGTH],
        }
    }

    /// Store roll, pitch and yaw (degrees)
    pub fn write_orientation(&mut self, angles: &EulerAngles) {
        self.write_f32(ROLL_OFFSET, angles.roll);
        self.write_f32(PITCH_OFFSET, angles.pitch);
        self.write_f32(YAW_OFFSET, angles.yaw);
    }

    /// Store the nine raw sensor words
    pub fn write_raw_sample(&mut self, sample: &RawSample) {
        let words = self.bytes[RAW_SAMPLE_OFFSET..].chunks_exact_mut(2);
        for (slot, value) in words.zip(sample.axes()) {
            slot.copy_from_slice(&value.to_ne_bytes());
        }
    }

    /// Read back a float at `offset`, `None` past the end of the block
    #[must_use]
    pub fn read_f32(&self, offset: usize) -> Option<f32> {
        let bytes = self.bytes.get(offset..offset + 4)?;
        Some(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read back a 16-bit word at `offset`, `None` past the end of the block
    #[must_use]
    pub fn read_i16(&self, offset: usize) -> Option<i16> {
        let bytes = self.bytes.get(offset..offset + 2)?;
        Some(i16::from_ne_bytes([bytes[0], bytes[1]]))
    }

    /// Raw block contents
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; REGISTER_BLOCK_LENGTH] {
        &self.bytes
    }

    fn write_f32(&mut self, offset: usize, value: f32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }
}
