//! Interrupt-driven two-wire (I2C) bus transaction engine
//!
//! [`TwiBus`] owns a single transfer buffer and advances one master transaction
//! at a time from the bus controller interrupt. The foreground starts a
//! transaction, then either blocks in [`TwiPeripheral::wait_for_event`] or, with
//! the `async` feature, awaits a signal raised by the interrupt handler.
//!
//! The engine is meant to live in a `static`:
//!
//! ```ignore
//! static BUS: TwiBus<Twi0> = TwiBus::new(Twi0);
//!
//! #[interrupt]
//! fn TWI() {
//!     BUS.on_interrupt();
//! }
//! ```

use core::cell::RefCell;
use core::task::Poll;

use critical_section::Mutex;
use embedded_hal::i2c::Operation;
use portable_atomic::{AtomicU8, Ordering};

#[cfg(feature = "async")]
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

/// Size of the engine's transfer buffer in bytes
pub const TWI_BUFFER_LENGTH: usize = 32;

/// Default bus clock (standard mode)
pub const DEFAULT_FREQUENCY_HZ: u32 = 100_000;

const READ_BIT: u8 = 0x01;

/// Bus transaction errors
///
/// Every error is terminal for the transaction that raised it. The engine has
/// already returned to [`TwiState::Ready`] when one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// No device acknowledged the address byte
    AddressNack,
    /// The device did not acknowledge a data byte
    DataNack,
    /// Another master won arbitration; the bus was released
    ArbitrationLost,
    /// Illegal start or stop condition detected on the bus
    BusError,
    /// The request does not fit in the transfer buffer
    BufferOverflow,
    /// A transaction is already in flight
    Busy,
}

impl embedded_hal::i2c::Error for TwiError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            Self::AddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Self::DataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            Self::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Self::BusError => ErrorKind::Bus,
            Self::BufferOverflow => ErrorKind::Overrun,
            Self::Busy => ErrorKind::Other,
        }
    }
}

/// Transaction state of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TwiState {
    /// No transaction in flight
    Ready = 0,
    /// Master receiver transaction in flight
    MasterReceive = 1,
    /// Master transmitter transaction in flight
    MasterTransmit = 2,
}

impl TwiState {
    const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Self::MasterReceive,
            2 => Self::MasterTransmit,
            _ => Self::Ready,
        }
    }
}

/// Decoded bus controller status
///
/// The codes are the standard two-wire master status values with the
/// prescaler bits masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiStatus {
    /// Start condition transmitted (0x08)
    Start,
    /// Repeated start condition transmitted (0x10)
    RepeatedStart,
    /// SLA+W transmitted, ACK received (0x18)
    MtSlaAck,
    /// SLA+W transmitted, NACK received (0x20)
    MtSlaNack,
    /// Data transmitted, ACK received (0x28)
    MtDataAck,
    /// Data transmitted, NACK received (0x30)
    MtDataNack,
    /// Arbitration lost (0x38)
    ArbitrationLost,
    /// SLA+R transmitted, ACK received (0x40)
    MrSlaAck,
    /// SLA+R transmitted, NACK received (0x48)
    MrSlaNack,
    /// Data received, ACK returned (0x50)
    MrDataAck,
    /// Data received, NACK returned (0x58)
    MrDataNack,
    /// No relevant state information (0xF8)
    NoInfo,
    /// Illegal start or stop condition (0x00)
    BusError,
    /// Any other code (slave modes are not used)
    Unknown(u8),
}

impl TwiStatus {
    /// Decode a raw status register value
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code & 0xF8 {
            0x08 => Self::Start,
            0x10 => Self::RepeatedStart,
            0x18 => Self::MtSlaAck,
            0x20 => Self::MtSlaNack,
            0x28 => Self::MtDataAck,
            0x30 => Self::MtDataNack,
            0x38 => Self::ArbitrationLost,
            0x40 => Self::MrSlaAck,
            0x48 => Self::MrSlaNack,
            0x50 => Self::MrDataAck,
            0x58 => Self::MrDataNack,
            0xF8 => Self::NoInfo,
            0x00 => Self::BusError,
            other => Self::Unknown(other),
        }
    }
}

/// Bus controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwiConfig {
    /// Bus clock in Hz
    pub frequency: u32,
}

impl Default for TwiConfig {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY_HZ,
        }
    }
}

impl TwiConfig {
    /// Bit-rate register value for a controller without prescaler
    ///
    /// SCL = `cpu_hz` / (16 + 2 * divisor)
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn bit_rate_divisor(&self, cpu_hz: u32) -> u8 {
        if self.frequency == 0 {
            return u8::MAX;
        }
        let divisor = (cpu_hz / self.frequency).saturating_sub(16) / 2;
        if divisor > u8::MAX as u32 {
            u8::MAX
        } else {
            divisor as u8
        }
    }
}

/// Register-level access to a two-wire bus controller
///
/// Each method corresponds to one write of the controller's control register.
/// Methods that acknowledge the current event (`send_start`, `reply`,
/// `send_stop`, `release_bus`) must leave the controller interrupt enabled,
/// except [`hold_repeated_start`](Self::hold_repeated_start).
pub trait TwiPeripheral {
    /// Enable the controller and program the bus clock
    fn configure(&self, config: &TwiConfig);

    /// Raw status register value
    fn status(&self) -> u8;

    /// Read the data register
    fn read_data(&self) -> u8;

    /// Load the data register
    fn write_data(&self, byte: u8);

    /// Issue a start condition
    fn send_start(&self);

    /// Acknowledge the current event; `ack` selects ACK or NACK for the next received byte
    fn reply(&self, ack: bool);

    /// Issue a stop condition and wait for it to complete
    fn send_stop(&self);

    /// Issue a start condition with the interrupt masked, keeping the bus for the next transaction
    fn hold_repeated_start(&self);

    /// Release the bus without a stop condition
    fn release_bus(&self);

    /// Suspend until the next interrupt may have fired
    ///
    /// The default spins; targets should sleep here (e.g. wait-for-interrupt).
    fn wait_for_event(&self) {
        core::hint::spin_loop();
    }
}

impl<T: TwiPeripheral + ?Sized> TwiPeripheral for &T {
    fn configure(&self, config: &TwiConfig) {
        (**self).configure(config);
    }

    fn status(&self) -> u8 {
        (**self).status()
    }

    fn read_data(&self) -> u8 {
        (**self).read_data()
    }

    fn write_data(&self, byte: u8) {
        (**self).write_data(byte);
    }

    fn send_start(&self) {
        (**self).send_start();
    }

    fn reply(&self, ack: bool) {
        (**self).reply(ack);
    }

    fn send_stop(&self) {
        (**self).send_stop();
    }

    fn hold_repeated_start(&self) {
        (**self).hold_repeated_start();
    }

    fn release_bus(&self) {
        (**self).release_bus();
    }

    fn wait_for_event(&self) {
        (**self).wait_for_event();
    }
}

/// Non-blocking transaction primitives
///
/// This is the seam the register layer is written against. Implemented by
/// [`TwiBus`] and usable through shared references.
pub trait TransactionBus {
    /// Begin a write of `bytes` to the 7-bit `address`
    ///
    /// # Errors
    ///
    /// Returns [`TwiError::BufferOverflow`] for oversize requests and
    /// [`TwiError::Busy`] if a transaction is in flight. No bus activity
    /// happens in either case.
    fn start_write(&self, address: u8, bytes: &[u8], send_stop: bool) -> Result<(), TwiError>;

    /// Begin a read of `length` bytes from the 7-bit `address`
    ///
    /// # Errors
    ///
    /// Same as [`start_write`](Self::start_write).
    fn start_read(&self, address: u8, length: usize, send_stop: bool) -> Result<(), TwiError>;

    /// Check for completion
    ///
    /// Once the transaction has finished, received bytes are copied into
    /// `buffer` and the number of bytes transferred is returned.
    fn poll(&self, buffer: &mut [u8]) -> Poll<Result<usize, TwiError>>;

    /// Abandon the current transaction and return the engine to ready
    fn abort(&self);

    /// Suspend until progress may have been made
    fn wait_for_event(&self) {
        core::hint::spin_loop();
    }
}

impl<T: TransactionBus + ?Sized> TransactionBus for &T {
    fn start_write(&self, address: u8, bytes: &[u8], send_stop: bool) -> Result<(), TwiError> {
        (**self).start_write(address, bytes, send_stop)
    }

    fn start_read(&self, address: u8, length: usize, send_stop: bool) -> Result<(), TwiError> {
        (**self).start_read(address, length, send_stop)
    }

    fn poll(&self, buffer: &mut [u8]) -> Poll<Result<usize, TwiError>> {
        (**self).poll(buffer)
    }

    fn abort(&self) {
        (**self).abort();
    }

    fn wait_for_event(&self) {
        (**self).wait_for_event();
    }
}

/// State shared between the foreground and the interrupt handler
struct Transfer {
    buffer: [u8; TWI_BUFFER_LENGTH],
    index: usize,
    length: usize,
    slarw: u8,
    send_stop: bool,
    in_repeated_start: bool,
    error: Option<TwiError>,
}

impl Transfer {
    const fn new() -> Self {
        Self {
            buffer: [0; TWI_BUFFER_LENGTH],
            index: 0,
            length: 0,
            slarw: 0,
            send_stop: true,
            in_repeated_start: false,
            error: None,
        }
    }

    const fn is_read(&self) -> bool {
        self.slarw & READ_BIT != 0
    }
}

/// Interrupt-driven bus master
pub struct TwiBus<P> {
    peripheral: P,
    state: AtomicU8,
    transfer: Mutex<RefCell<Transfer>>,
    #[cfg(feature = "async")]
    done: Signal<CriticalSectionRawMutex, ()>,
}

impl<P> TwiBus<P> {
    /// Create an engine around a bus controller
    ///
    /// Call [`init`](Self::init) before the first transaction.
    pub const fn new(peripheral: P) -> Self {
        Self {
            peripheral,
            state: AtomicU8::new(TwiState::Ready as u8),
            transfer: Mutex::new(RefCell::new(Transfer::new())),
            #[cfg(feature = "async")]
            done: Signal::new(),
        }
    }

    /// Current transaction state
    pub fn state(&self) -> TwiState {
        TwiState::from_bits(self.state.load(Ordering::Acquire))
    }

    /// Access the underlying bus controller
    pub const fn peripheral(&self) -> &P {
        &self.peripheral
    }

    fn set_state(&self, state: TwiState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl<P: TwiPeripheral> TwiBus<P> {
    /// Configure the controller and reset the engine
    pub fn init(&self, config: TwiConfig) {
        critical_section::with(|cs| {
            *self.transfer.borrow_ref_mut(cs) = Transfer::new();
            self.set_state(TwiState::Ready);
            self.peripheral.configure(&config);
        });

        #[cfg(feature = "defmt")]
        defmt::debug!("TWI ready at {} Hz", config.frequency);
    }

    /// Bus controller interrupt handler
    ///
    /// Call this from the controller's interrupt vector.
    pub fn on_interrupt(&self) {
        let status = TwiStatus::from_code(self.peripheral.status());
        let finished = critical_section::with(|cs| {
            let mut transfer = self.transfer.borrow_ref_mut(cs);
            self.advance(status, &mut transfer)
        });

        #[cfg(feature = "async")]
        if finished {
            self.done.signal(());
        }
        #[cfg(not(feature = "async"))]
        let _ = finished;
    }

    /// Handle one controller event; returns `true` when the transaction ended
    fn advance(&self, status: TwiStatus, transfer: &mut Transfer) -> bool {
        match status {
            TwiStatus::Start | TwiStatus::RepeatedStart => {
                self.peripheral.write_data(transfer.slarw);
                self.peripheral.reply(true);
                false
            }
            TwiStatus::MtSlaAck | TwiStatus::MtDataAck => {
                if transfer.index < transfer.length {
                    self.peripheral.write_data(transfer.buffer[transfer.index]);
                    transfer.index += 1;
                    self.peripheral.reply(true);
                    false
                } else {
                    self.complete(transfer);
                    true
                }
            }
            TwiStatus::MtSlaNack | TwiStatus::MrSlaNack => {
                self.fail(transfer, TwiError::AddressNack);
                true
            }
            TwiStatus::MtDataNack => {
                self.fail(transfer, TwiError::DataNack);
                true
            }
            TwiStatus::ArbitrationLost => {
                transfer.error = Some(TwiError::ArbitrationLost);
                transfer.in_repeated_start = false;
                self.peripheral.release_bus();
                self.set_state(TwiState::Ready);
                true
            }
            TwiStatus::MrDataAck => {
                self.store_received(transfer);
                self.request_next(transfer);
                false
            }
            TwiStatus::MrSlaAck => {
                self.request_next(transfer);
                false
            }
            TwiStatus::MrDataNack => {
                self.store_received(transfer);
                self.complete(transfer);
                true
            }
            TwiStatus::NoInfo => false,
            TwiStatus::BusError | TwiStatus::Unknown(_) => {
                self.fail(transfer, TwiError::BusError);
                true
            }
        }
    }

    fn store_received(&self, transfer: &mut Transfer) {
        let byte = self.peripheral.read_data();
        if let Some(slot) = transfer.buffer.get_mut(transfer.index) {
            *slot = byte;
            transfer.index += 1;
        }
    }

    /// NACK is armed once the next-to-last byte has arrived so the final byte is NACKed
    fn request_next(&self, transfer: &Transfer) {
        self.peripheral.reply(transfer.index + 1 < transfer.length);
    }

    fn complete(&self, transfer: &mut Transfer) {
        if transfer.send_stop {
            self.peripheral.send_stop();
        } else {
            transfer.in_repeated_start = true;
            self.peripheral.hold_repeated_start();
        }
        self.set_state(TwiState::Ready);
    }

    fn fail(&self, transfer: &mut Transfer, error: TwiError) {
        transfer.error = Some(error);
        transfer.in_repeated_start = false;
        self.peripheral.send_stop();
        self.set_state(TwiState::Ready);
    }

    fn begin(
        &self,
        state: TwiState,
        slarw: u8,
        payload: &[u8],
        length: usize,
        send_stop: bool,
    ) -> Result<(), TwiError> {
        if length > TWI_BUFFER_LENGTH {
            return Err(TwiError::BufferOverflow);
        }

        critical_section::with(|cs| {
            if self.state() != TwiState::Ready {
                return Err(TwiError::Busy);
            }

            let mut transfer = self.transfer.borrow_ref_mut(cs);
            transfer.buffer[..payload.len()].copy_from_slice(payload);
            transfer.index = 0;
            transfer.length = length;
            transfer.slarw = slarw;
            transfer.send_stop = send_stop;
            transfer.error = None;

            #[cfg(feature = "async")]
            self.done.reset();

            self.set_state(state);

            if transfer.in_repeated_start {
                // Start condition is already on the bus; only the address is missing
                transfer.in_repeated_start = false;
                self.peripheral.write_data(slarw);
                self.peripheral.reply(true);
            } else {
                self.peripheral.send_start();
            }
            Ok(())
        })
    }

    fn wait_blocking(&self, buffer: &mut [u8]) -> Result<usize, TwiError> {
        loop {
            if let Poll::Ready(result) = TransactionBus::poll(self, buffer) {
                return result;
            }
            self.peripheral.wait_for_event();
        }
    }

    /// Write `bytes` to `address`, blocking until the transaction ends
    ///
    /// With `send_stop == false` the bus is kept with a pending repeated start
    /// and the next transaction reuses it.
    ///
    /// # Errors
    ///
    /// Returns the [`TwiError`] that terminated the transaction.
    pub fn write(&self, address: u8, bytes: &[u8], send_stop: bool) -> Result<(), TwiError> {
        self.start_write(address, bytes, send_stop)?;
        self.wait_blocking(&mut []).map(|_| ())
    }

    /// Read into `buffer` from `address`, blocking until the transaction ends
    ///
    /// Returns the number of bytes received. An empty buffer completes
    /// immediately without touching the bus.
    ///
    /// # Errors
    ///
    /// Returns the [`TwiError`] that terminated the transaction.
    pub fn read(&self, address: u8, buffer: &mut [u8], send_stop: bool) -> Result<usize, TwiError> {
        if buffer.is_empty() {
            return Ok(0);
        }
        self.start_read(address, buffer.len(), send_stop)?;
        self.wait_blocking(buffer)
    }
}

impl<P: TwiPeripheral> TransactionBus for TwiBus<P> {
    fn start_write(&self, address: u8, bytes: &[u8], send_stop: bool) -> Result<(), TwiError> {
        self.begin(
            TwiState::MasterTransmit,
            address << 1,
            bytes,
            bytes.len(),
            send_stop,
        )
    }

    fn start_read(&self, address: u8, length: usize, send_stop: bool) -> Result<(), TwiError> {
        if length == 0 {
            return critical_section::with(|cs| {
                if self.state() != TwiState::Ready {
                    return Err(TwiError::Busy);
                }
                let mut transfer = self.transfer.borrow_ref_mut(cs);
                transfer.index = 0;
                transfer.length = 0;
                transfer.slarw = (address << 1) | READ_BIT;
                transfer.error = None;
                Ok(())
            });
        }
        self.begin(
            TwiState::MasterReceive,
            (address << 1) | READ_BIT,
            &[],
            length,
            send_stop,
        )
    }

    fn poll(&self, buffer: &mut [u8]) -> Poll<Result<usize, TwiError>> {
        if self.state() != TwiState::Ready {
            return Poll::Pending;
        }

        critical_section::with(|cs| {
            let transfer = self.transfer.borrow_ref(cs);
            if let Some(error) = transfer.error {
                return Poll::Ready(Err(error));
            }
            if transfer.is_read() {
                let count = transfer.index.min(buffer.len());
                buffer[..count].copy_from_slice(&transfer.buffer[..count]);
            }
            Poll::Ready(Ok(transfer.index))
        })
    }

    fn abort(&self) {
        critical_section::with(|cs| {
            let mut transfer = self.transfer.borrow_ref_mut(cs);
            if self.state() != TwiState::Ready || transfer.in_repeated_start {
                self.peripheral.send_stop();
            }
            transfer.in_repeated_start = false;
            transfer.error = None;
            self.set_state(TwiState::Ready);
        });

        #[cfg(feature = "defmt")]
        defmt::warn!("TWI transaction aborted");
    }

    fn wait_for_event(&self) {
        self.peripheral.wait_for_event();
    }
}

impl<P: TwiPeripheral> embedded_hal::i2c::ErrorType for TwiBus<P> {
    type Error = TwiError;
}

impl<P: TwiPeripheral> embedded_hal::i2c::ErrorType for &TwiBus<P> {
    type Error = TwiError;
}

/// End of the run of operations of the same kind starting at `start`
///
/// Adjacent operations of one kind share a single address phase on the bus.
fn run_end(operations: &[Operation<'_>], start: usize) -> usize {
    let is_read = matches!(operations[start], Operation::Read(_));
    operations[start..]
        .iter()
        .position(|operation| matches!(operation, Operation::Read(_)) != is_read)
        .map_or(operations.len(), |offset| start + offset)
}

/// Concatenate a run of writes into `frame`, returning the frame length
fn gather_writes(
    operations: &[Operation<'_>],
    frame: &mut [u8; TWI_BUFFER_LENGTH],
) -> Result<usize, TwiError> {
    let mut length = 0;
    for operation in operations {
        if let Operation::Write(bytes) = operation {
            let end = length + bytes.len();
            frame
                .get_mut(length..end)
                .ok_or(TwiError::BufferOverflow)?
                .copy_from_slice(bytes);
            length = end;
        }
    }
    Ok(length)
}

/// Total length of a run of reads
fn read_length(operations: &[Operation<'_>]) -> Result<usize, TwiError> {
    let length: usize = operations
        .iter()
        .map(|operation| match operation {
            Operation::Read(buffer) => buffer.len(),
            Operation::Write(_) => 0,
        })
        .sum();
    if length > TWI_BUFFER_LENGTH {
        Err(TwiError::BufferOverflow)
    } else {
        Ok(length)
    }
}

/// Distribute bytes received for a run of reads over its buffers
fn scatter_reads(operations: &mut [Operation<'_>], received: &[u8]) {
    let mut offset = 0;
    for operation in operations {
        if let Operation::Read(buffer) = operation {
            let end = offset + buffer.len();
            if let Some(bytes) = received.get(offset..end) {
                buffer.copy_from_slice(bytes);
            }
            offset = end;
        }
    }
}

fn run_transaction<P: TwiPeripheral>(
    bus: &TwiBus<P>,
    address: u8,
    operations: &mut [Operation<'_>],
) -> Result<(), TwiError> {
    let mut frame = [0u8; TWI_BUFFER_LENGTH];
    let mut start = 0;
    while start < operations.len() {
        let end = run_end(operations, start);
        let send_stop = end == operations.len();
        let run = &mut operations[start..end];

        if matches!(run[0], Operation::Read(_)) {
            let length = read_length(run)?;
            bus.read(address, &mut frame[..length], send_stop)?;
            scatter_reads(run, &frame[..length]);
        } else {
            let length = gather_writes(run, &mut frame)?;
            bus.write(address, &frame[..length], send_stop)?;
        }
        start = end;
    }
    Ok(())
}

impl<P: TwiPeripheral> embedded_hal::i2c::I2c for TwiBus<P> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        run_transaction(self, address, operations)
    }
}

impl<P: TwiPeripheral> embedded_hal::i2c::I2c for &TwiBus<P> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        run_transaction(*self, address, operations)
    }
}

#[cfg(feature = "async")]
impl<P: TwiPeripheral> TwiBus<P> {
    async fn wait_signal(&self, buffer: &mut [u8]) -> Result<usize, TwiError> {
        loop {
            if let Poll::Ready(result) = TransactionBus::poll(self, buffer) {
                return result;
            }
            self.done.wait().await;
        }
    }

    /// Write `bytes` to `address`, awaiting the interrupt handler's completion signal
    ///
    /// # Errors
    ///
    /// Returns the [`TwiError`] that terminated the transaction.
    pub async fn write_async(
        &self,
        address: u8,
        bytes: &[u8],
        send_stop: bool,
    ) -> Result<(), TwiError> {
        self.start_write(address, bytes, send_stop)?;
        self.wait_signal(&mut []).await.map(|_| ())
    }

    /// Read into `buffer` from `address`, awaiting the interrupt handler's completion signal
    ///
    /// # Errors
    ///
    /// Returns the [`TwiError`] that terminated the transaction.
    pub async fn read_async(
        &self,
        address: u8,
        buffer: &mut [u8],
        send_stop: bool,
    ) -> Result<usize, TwiError> {
        if buffer.is_empty() {
            return Ok(0);
        }
        self.start_read(address, buffer.len(), send_stop)?;
        self.wait_signal(buffer).await
    }

    async fn run_transaction_async(
        &self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), TwiError> {
        let mut frame = [0u8; TWI_BUFFER_LENGTH];
        let mut start = 0;
        while start < operations.len() {
            let end = run_end(operations, start);
            let send_stop = end == operations.len();
            let run = &mut operations[start..end];

            if matches!(run[0], Operation::Read(_)) {
                let length = read_length(run)?;
                self.read_async(address, &mut frame[..length], send_stop)
                    .await?;
                scatter_reads(run, &frame[..length]);
            } else {
                let length = gather_writes(run, &mut frame)?;
                self.write_async(address, &frame[..length], send_stop)
                    .await?;
            }
            start = end;
        }
        Ok(())
    }
}

#[cfg(feature = "async")]
impl<P: TwiPeripheral> embedded_hal_async::i2c::I2c for TwiBus<P> {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run_transaction_async(address, operations).await
    }
}

#[cfg(feature = "async")]
impl<P: TwiPeripheral> embedded_hal_async::i2c::I2c for &TwiBus<P> {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.run_transaction_async(address, operations).await
    }
}
