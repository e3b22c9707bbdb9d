//! Register access over the two-wire bus
//!
//! [`I2cRegisters`] turns [`TransactionBus`] primitives into byte, word and
//! bit-field register operations. Reads are a register-address write without
//! stop followed by a repeated-start read; writes are a single transaction of
//! register address plus payload. Multi-byte values are big-endian on the wire.

use core::task::Poll;

use crate::Error;
use crate::time::Clock;
use crate::twi::{TWI_BUFFER_LENGTH, TransactionBus, TwiError};

/// Location of a register or of a bit field inside one
///
/// `bit_start` is the most significant bit of the field and the field extends
/// `length` bits downward, so `field(dev, reg, 4, 2)` covers bits 4..=3.
/// Fields up to 16 bits wide may be used with the word operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterDescriptor {
    /// 7-bit device address
    pub device: u8,
    /// Register address
    pub register: u8,
    /// Highest bit of the field
    pub bit_start: u8,
    /// Width of the field in bits
    pub length: u8,
}

impl RegisterDescriptor {
    /// Describe a bit field of `length` bits ending at `bit_start`
    ///
    /// # Panics
    ///
    /// Panics (at compile time for `const` items) if the field does not fit
    /// in 16 bits.
    #[must_use]
    pub const fn field(device: u8, register: u8, bit_start: u8, length: u8) -> Self {
        assert!(length >= 1 && bit_start < 16 && length <= bit_start + 1);
        Self {
            device,
            register,
            bit_start,
            length,
        }
    }

    /// Describe a single bit
    #[must_use]
    pub const fn bit(device: u8, register: u8, bit: u8) -> Self {
        Self::field(device, register, bit, 1)
    }

    /// Describe a whole 8-bit register
    #[must_use]
    pub const fn register(device: u8, register: u8) -> Self {
        Self::field(device, register, 7, 8)
    }

    /// Describe a whole 16-bit register pair
    #[must_use]
    pub const fn word(device: u8, register: u8) -> Self {
        Self::field(device, register, 15, 16)
    }

    /// Same field on another device address
    #[must_use]
    pub const fn at(self, device: u8) -> Self {
        Self { device, ..self }
    }

    /// Position of the field's lowest bit
    #[must_use]
    pub const fn shift(&self) -> u8 {
        self.bit_start + 1 - self.length
    }

    /// Mask of the field in register position
    #[must_use]
    pub const fn mask(&self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let mask = (((1u32 << self.length) - 1) << self.shift()) as u16;
        mask
    }

    /// Extract the field value from a raw register value
    #[must_use]
    pub const fn extract(&self, raw: u16) -> u16 {
        (raw & self.mask()) >> self.shift()
    }

    /// Replace the field inside `raw` with `value`, leaving other bits untouched
    ///
    /// Bits of `value` that do not fit in the field are dropped.
    #[must_use]
    pub const fn insert(&self, raw: u16, value: u16) -> u16 {
        let mask = self.mask();
        (raw & !mask) | ((value << self.shift()) & mask)
    }

    /// `true` if the field is confined to the low byte of a register
    #[must_use]
    pub const fn fits_byte(&self) -> bool {
        self.bit_start < 8
    }
}

/// Register access layer over a transaction bus
///
/// All methods take `&self`, so one instance can be shared by reference
/// between the drivers of every device on the bus.
pub struct I2cRegisters<B, C> {
    bus: B,
    clock: C,
    timeout_ms: Option<u32>,
}

impl<B, C> I2cRegisters<B, C>
where
    B: TransactionBus,
    C: Clock,
{
    /// Create a register layer without a timeout
    pub const fn new(bus: B, clock: C) -> Self {
        Self {
            bus,
            clock,
            timeout_ms: None,
        }
    }

    /// Bound every register operation to `timeout_ms` milliseconds
    ///
    /// On expiry the in-flight transaction is aborted and
    /// [`Error::Timeout`] is returned.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Configured timeout budget
    pub const fn timeout(&self) -> Option<u32> {
        self.timeout_ms
    }

    /// Access the underlying bus
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Access the time source
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Consume the layer and return the bus and clock
    pub fn release(self) -> (B, C) {
        (self.bus, self.clock)
    }

    fn complete(&self, buffer: &mut [u8], started: u32) -> Result<usize, Error> {
        loop {
            if let Poll::Ready(result) = self.bus.poll(buffer) {
                return result.map_err(Error::from);
            }
            if let Some(limit) = self.timeout_ms {
                if self.clock.millis().wrapping_sub(started) >= limit {
                    self.bus.abort();
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Register access timed out after {} ms", limit);
                    return Err(Error::Timeout);
                }
            }
            self.bus.wait_for_event();
        }
    }

    /// Read `buffer.len()` consecutive registers starting at `register`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] if either transaction fails and
    /// [`Error::Timeout`] if the budget runs out.
    pub fn read_bytes(&self, device: u8, register: u8, buffer: &mut [u8]) -> Result<(), Error> {
        if buffer.len() > TWI_BUFFER_LENGTH {
            return Err(Error::Bus(TwiError::BufferOverflow));
        }
        if buffer.is_empty() {
            return Ok(());
        }
        let started = self.clock.millis();

        self.bus.start_write(device, &[register], false)?;
        self.complete(&mut [], started)?;

        self.bus.start_read(device, buffer.len(), true)?;
        self.complete(buffer, started)?;
        Ok(())
    }

    /// Write consecutive registers starting at `register`
    ///
    /// The register address and payload travel in one transaction, so the
    /// payload is limited to one byte less than the transfer buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bus`] with [`TwiError::BufferOverflow`] for oversize
    /// payloads, [`Error::Bus`] for transaction failures and
    /// [`Error::Timeout`] if the budget runs out.
    pub fn write_bytes(&self, device: u8, register: u8, data: &[u8]) -> Result<(), Error> {
        if data.len() >= TWI_BUFFER_LENGTH {
            return Err(Error::Bus(TwiError::BufferOverflow));
        }
        let mut frame = [0u8; TWI_BUFFER_LENGTH];
        frame[0] = register;
        frame[1..=data.len()].copy_from_slice(data);

        let started = self.clock.millis();
        self.bus.start_write(device, &frame[..=data.len()], true)?;
        self.complete(&mut [], started)?;
        Ok(())
    }

    /// Read one register
    ///
    /// # Errors
    ///
    /// See [`read_bytes`](Self::read_bytes).
    pub fn read_byte(&self, device: u8, register: u8) -> Result<u8, Error> {
        let mut buffer = [0u8; 1];
        self.read_bytes(device, register, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Write one register
    ///
    /// # Errors
    ///
    /// See [`write_bytes`](Self::write_bytes).
    pub fn write_byte(&self, device: u8, register: u8, value: u8) -> Result<(), Error> {
        self.write_bytes(device, register, &[value])
    }

    /// Read a big-endian register pair
    ///
    /// # Errors
    ///
    /// See [`read_bytes`](Self::read_bytes).
    pub fn read_word(&self, device: u8, register: u8) -> Result<u16, Error> {
        let mut buffer = [0u8; 2];
        self.read_bytes(device, register, &mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }

    /// Write a big-endian register pair
    ///
    /// # Errors
    ///
    /// See [`write_bytes`](Self::write_bytes).
    pub fn write_word(&self, device: u8, register: u8, value: u16) -> Result<(), Error> {
        self.write_bytes(device, register, &value.to_be_bytes())
    }

    /// Read consecutive big-endian register pairs
    ///
    /// # Errors
    ///
    /// See [`read_bytes`](Self::read_bytes).
    pub fn read_words(&self, device: u8, register: u8, words: &mut [u16]) -> Result<(), Error> {
        let length = words.len() * 2;
        if length > TWI_BUFFER_LENGTH {
            return Err(Error::Bus(TwiError::BufferOverflow));
        }
        let mut buffer = [0u8; TWI_BUFFER_LENGTH];
        self.read_bytes(device, register, &mut buffer[..length])?;
        for (word, bytes) in words.iter_mut().zip(buffer.chunks_exact(2)) {
            *word = u16::from_be_bytes([bytes[0], bytes[1]]);
        }
        Ok(())
    }

    /// Write consecutive big-endian register pairs
    ///
    /// # Errors
    ///
    /// See [`write_bytes`](Self::write_bytes).
    pub fn write_words(&self, device: u8, register: u8, words: &[u16]) -> Result<(), Error> {
        let length = words.len() * 2;
        if length >= TWI_BUFFER_LENGTH {
            return Err(Error::Bus(TwiError::BufferOverflow));
        }
        let mut buffer = [0u8; TWI_BUFFER_LENGTH];
        for (bytes, word) in buffer.chunks_exact_mut(2).zip(words) {
            bytes.copy_from_slice(&word.to_be_bytes());
        }
        self.write_bytes(device, register, &buffer[..length])
    }

    /// Read a bit field of an 8-bit register
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the field extends past bit 7,
    /// otherwise see [`read_bytes`](Self::read_bytes).
    pub fn read_bits(&self, field: RegisterDescriptor) -> Result<u8, Error> {
        if !field.fits_byte() {
            return Err(Error::InvalidConfig);
        }
        let raw = self.read_byte(field.device, field.register)?;
        #[allow(clippy::cast_possible_truncation)]
        let value = field.extract(u16::from(raw)) as u8;
        Ok(value)
    }

    /// Read a single bit
    ///
    /// # Errors
    ///
    /// See [`read_bits`](Self::read_bits).
    pub fn read_bit(&self, field: RegisterDescriptor) -> Result<bool, Error> {
        Ok(self.read_bits(field)? != 0)
    }

    /// Read-modify-write a bit field of an 8-bit register
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the field extends past bit 7,
    /// otherwise see [`read_bytes`](Self::read_bytes) and
    /// [`write_bytes`](Self::write_bytes).
    pub fn write_bits(&self, field: RegisterDescriptor, value: u8) -> Result<(), Error> {
        if !field.fits_byte() {
            return Err(Error::InvalidConfig);
        }
        let raw = self.read_byte(field.device, field.register)?;
        #[allow(clippy::cast_possible_truncation)]
        let updated = field.insert(u16::from(raw), u16::from(value)) as u8;
        self.write_byte(field.device, field.register, updated)
    }

    /// Set or clear a single bit
    ///
    /// # Errors
    ///
    /// See [`write_bits`](Self::write_bits).
    pub fn write_bit(&self, field: RegisterDescriptor, value: bool) -> Result<(), Error> {
        self.write_bits(field, u8::from(value))
    }

    /// Read a bit field of a 16-bit register pair
    ///
    /// # Errors
    ///
    /// See [`read_bytes`](Self::read_bytes).
    pub fn read_bits_word(&self, field: RegisterDescriptor) -> Result<u16, Error> {
        let raw = self.read_word(field.device, field.register)?;
        Ok(field.extract(raw))
    }

    /// Read-modify-write a bit field of a 16-bit register pair
    ///
    /// # Errors
    ///
    /// See [`read_bytes`](Self::read_bytes) and [`write_bytes`](Self::write_bytes).
    pub fn write_bits_word(&self, field: RegisterDescriptor, value: u16) -> Result<(), Error> {
        let raw = self.read_word(field.device, field.register)?;
        self.write_word(field.device, field.register, field.insert(raw, value))
    }
}
