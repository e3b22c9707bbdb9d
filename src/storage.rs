//! Persistence of calibration offsets
//!
//! Offsets are stored as a 13-byte image: six little-endian 16-bit words at
//! byte offsets 0 (accel X), 2 (accel Y), 4 (accel Z), 6 (gyro X),
//! 8 (gyro Y) and 10 (gyro Z), followed by [`OFFSET_IMAGE_MARKER`] at byte 12.
//! An image without the marker, such as an erased EEPROM, holds no offsets.

use crate::calibration::CalibrationOffsets;
use crate::Error;

/// Size of the stored offset image
pub const OFFSET_IMAGE_LENGTH: usize = 13;

/// Last byte of an image holding offsets
pub const OFFSET_IMAGE_MARKER: u8 = 0xA5;

const MARKER_INDEX: usize = OFFSET_IMAGE_LENGTH - 1;

impl CalibrationOffsets {
    /// Encode to the storage image
    #[must_use]
    pub fn to_bytes(&self) -> [u8; OFFSET_IMAGE_LENGTH] {
        let mut image = [0u8; OFFSET_IMAGE_LENGTH];
        for (slot, value) in image[..MARKER_INDEX].chunks_exact_mut(2).zip(self.as_array()) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        image[MARKER_INDEX] = OFFSET_IMAGE_MARKER;
        image
    }

    /// Decode a storage image
    ///
    /// Returns `None` if the marker byte is missing (e.g. erased memory).
    #[must_use]
    pub fn from_bytes(image: &[u8; OFFSET_IMAGE_LENGTH]) -> Option<Self> {
        if image[MARKER_INDEX] != OFFSET_IMAGE_MARKER {
            return None;
        }
        let mut values = [0i16; 6];
        for (value, bytes) in values.iter_mut().zip(image[..MARKER_INDEX].chunks_exact(2)) {
            *value = i16::from_le_bytes([bytes[0], bytes[1]]);
        }
        Some(Self::from_array(values))
    }
}

/// Storage for calibration offsets
pub trait OffsetStore {
    /// Load previously saved offsets, `None` if nothing was saved
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing store cannot be read.
    fn load_offsets(&mut self) -> Result<Option<CalibrationOffsets>, Error>;

    /// Persist offsets
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the backing store cannot be written.
    fn save_offsets(&mut self, offsets: &CalibrationOffsets) -> Result<(), Error>;
}

impl<T: OffsetStore + ?Sized> OffsetStore for &mut T {
    fn load_offsets(&mut self) -> Result<Option<CalibrationOffsets>, Error> {
        (**self).load_offsets()
    }

    fn save_offsets(&mut self, offsets: &CalibrationOffsets) -> Result<(), Error> {
        (**self).save_offsets(offsets)
    }
}

/// RAM-backed offset store holding the storage image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOffsetStore {
    image: [u8; OFFSET_IMAGE_LENGTH],
}

impl Default for MemoryOffsetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOffsetStore {
    /// Create an erased store
    #[must_use]
    pub const fn new() -> Self {
        Self {
            image: [0xFF; OFFSET_IMAGE_LENGTH],
        }
    }

    /// Create a store from an existing image (e.g. read from EEPROM at boot)
    #[must_use]
    pub const fn from_image(image: [u8; OFFSET_IMAGE_LENGTH]) -> Self {
        Self { image }
    }

    /// Current image, ready to be written to non-volatile memory
    #[must_use]
    pub const fn image(&self) -> &[u8; OFFSET_IMAGE_LENGTH] {
        &self.image
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn load_offsets(&mut self) -> Result<Option<CalibrationOffsets>, Error> {
        Ok(CalibrationOffsets::from_bytes(&self.image))
    }

    fn save_offsets(&mut self, offsets: &CalibrationOffsets) -> Result<(), Error> {
        self.image = offsets.to_bytes();
        Ok(())
    }
}
