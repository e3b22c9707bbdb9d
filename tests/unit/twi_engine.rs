//! Unit tests for the interrupt-driven bus engine

use embedded_hal::i2c::{I2c, Operation};
use icaro_imu::{TWI_BUFFER_LENGTH, TransactionBus, TwiError, TwiState};

use crate::common::{Fault, MPU6050, Transaction, sim_bus};

#[test]
fn test_init_configures_controller() {
    let bus = sim_bus();
    assert_eq!(bus.peripheral().frequency(), Some(100_000));
    assert_eq!(bus.state(), TwiState::Ready);
}

#[test]
fn test_write_with_stop() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);

    bus.write(MPU6050, &[0x6B, 0x01], true).unwrap();

    assert_eq!(
        bus.peripheral().transactions(),
        vec![Transaction::Write {
            address: MPU6050,
            bytes: vec![0x6B, 0x01],
        }]
    );
    assert_eq!(bus.peripheral().register(MPU6050, 0x6B), 0x01);
    assert_eq!(bus.peripheral().starts(), 1);
    assert_eq!(bus.peripheral().stops(), 1);
    assert_eq!(bus.state(), TwiState::Ready);
}

#[test]
fn test_read_reuses_repeated_start() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().set_registers(MPU6050, 0x3B, &[1, 2, 3, 4]);

    bus.write(MPU6050, &[0x3B], false).unwrap();
    let mut buffer = [0u8; 4];
    let count = bus.read(MPU6050, &mut buffer, true).unwrap();

    assert_eq!(count, 4);
    assert_eq!(buffer, [1, 2, 3, 4]);
    // One start for the pair; the read rides on the held repeated start
    assert_eq!(bus.peripheral().starts(), 1);
    assert_eq!(bus.peripheral().repeated_starts(), 1);
    assert_eq!(bus.peripheral().stops(), 1);
}

#[test]
fn test_last_received_byte_is_nacked() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);

    let mut buffer = [0u8; 4];
    bus.read(MPU6050, &mut buffer, true).unwrap();
    assert_eq!(bus.peripheral().read_acks(), vec![true, true, true, false]);

    bus.peripheral().clear_log();
    let mut single = [0u8; 1];
    bus.read(MPU6050, &mut single, true).unwrap();
    assert_eq!(bus.peripheral().read_acks(), vec![false]);
}

#[test]
fn test_address_nack() {
    let bus = sim_bus();

    let result = bus.write(0x42, &[0x00], true);

    assert_eq!(result, Err(TwiError::AddressNack));
    assert_eq!(bus.peripheral().stops(), 1);
    assert_eq!(bus.state(), TwiState::Ready);

    let mut buffer = [0u8; 2];
    assert_eq!(bus.read(0x42, &mut buffer, true), Err(TwiError::AddressNack));
}

#[test]
fn test_data_nack() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().inject(Fault::DataNack);

    let result = bus.write(MPU6050, &[0x6B, 0x00], true);

    assert_eq!(result, Err(TwiError::DataNack));
    assert_eq!(bus.peripheral().stops(), 1);
    assert_eq!(bus.state(), TwiState::Ready);
}

#[test]
fn test_arbitration_lost_releases_bus() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().inject(Fault::ArbitrationLost);

    let result = bus.write(MPU6050, &[0x6B, 0x00], true);

    assert_eq!(result, Err(TwiError::ArbitrationLost));
    assert_eq!(bus.peripheral().releases(), 1);
    assert_eq!(bus.peripheral().stops(), 0);
    assert_eq!(bus.state(), TwiState::Ready);
}

#[test]
fn test_bus_error() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().inject(Fault::BusError);

    assert_eq!(bus.write(MPU6050, &[0x00], true), Err(TwiError::BusError));
    assert_eq!(bus.state(), TwiState::Ready);
}

#[test]
fn test_error_clears_repeated_start() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);

    bus.write(MPU6050, &[0x3B], false).unwrap();
    bus.peripheral().inject(Fault::AddressNack);
    let mut buffer = [0u8; 2];
    assert_eq!(bus.read(MPU6050, &mut buffer, true), Err(TwiError::AddressNack));

    // Next transaction starts from scratch
    bus.write(MPU6050, &[0x6B, 0x00], true).unwrap();
    assert_eq!(bus.peripheral().starts(), 2);
}

#[test]
fn test_recovers_after_error() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().inject(Fault::DataNack);

    assert!(bus.write(MPU6050, &[0x10, 0xAA], true).is_err());
    bus.write(MPU6050, &[0x10, 0xAA], true).unwrap();

    assert_eq!(bus.peripheral().register(MPU6050, 0x10), 0xAA);
}

#[test]
fn test_oversize_request_rejected_before_bus_activity() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);

    let mut buffer = [0u8; TWI_BUFFER_LENGTH + 1];
    assert_eq!(
        bus.read(MPU6050, &mut buffer, true),
        Err(TwiError::BufferOverflow)
    );
    assert_eq!(
        bus.write(MPU6050, &buffer, true),
        Err(TwiError::BufferOverflow)
    );
    assert_eq!(bus.peripheral().starts(), 0);
    assert_eq!(bus.state(), TwiState::Ready);
}

#[test]
fn test_full_buffer_transfer() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    let pattern: Vec<u8> = (0..TWI_BUFFER_LENGTH as u8).collect();
    bus.peripheral().set_registers(MPU6050, 0x40, &pattern);

    bus.write(MPU6050, &[0x40], false).unwrap();
    let mut buffer = [0u8; TWI_BUFFER_LENGTH];
    assert_eq!(bus.read(MPU6050, &mut buffer, true), Ok(TWI_BUFFER_LENGTH));
    assert_eq!(buffer.to_vec(), pattern);
}

#[test]
fn test_zero_length_read_completes_immediately() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);

    assert_eq!(bus.read(MPU6050, &mut [], true), Ok(0));

    bus.start_read(MPU6050, 0, true).unwrap();
    assert_eq!(TransactionBus::poll(&bus, &mut []), core::task::Poll::Ready(Ok(0)));
    assert_eq!(bus.peripheral().starts(), 0);
}

#[test]
fn test_busy_while_in_flight_then_abort() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().set_silent(true);

    bus.start_write(MPU6050, &[0x00], true).unwrap();
    assert_eq!(bus.state(), TwiState::MasterTransmit);
    assert_eq!(
        bus.start_write(MPU6050, &[0x01], true),
        Err(TwiError::Busy)
    );
    assert!(TransactionBus::poll(&bus, &mut []).is_pending());

    bus.abort();
    assert_eq!(bus.state(), TwiState::Ready);
    assert_eq!(bus.peripheral().stops(), 1);

    bus.peripheral().set_silent(false);
    bus.write(MPU6050, &[0x01, 0x02], true).unwrap();
}

#[test]
fn test_abort_releases_held_repeated_start() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);

    bus.write(MPU6050, &[0x3B], false).unwrap();
    bus.abort();
    assert_eq!(bus.peripheral().stops(), 1);

    bus.write(MPU6050, &[0x6B, 0x00], true).unwrap();
    assert_eq!(bus.peripheral().starts(), 2);
}

#[test]
fn test_embedded_hal_write_read() {
    let bus = sim_bus();
    bus.peripheral().add_mpu6050();

    let mut handle = bus;
    let mut who_am_i = [0u8; 1];
    I2c::write_read(&mut handle, MPU6050, &[0x75], &mut who_am_i).unwrap();

    assert_eq!(who_am_i, [0x68]);
    assert_eq!(bus.peripheral().repeated_starts(), 1);
    assert_eq!(bus.peripheral().stops(), 1);
}

#[test]
fn test_embedded_hal_merges_adjacent_writes() {
    let bus = sim_bus();
    bus.peripheral().add_mpu6050();
    bus.peripheral().clear_log();

    let mut handle = bus;
    handle
        .transaction(
            MPU6050,
            &mut [Operation::Write(&[0x6B]), Operation::Write(&[0x01])],
        )
        .unwrap();

    // Register address and value share one address frame
    assert_eq!(
        bus.peripheral().transactions(),
        vec![Transaction::Write {
            address: MPU6050,
            bytes: vec![0x6B, 0x01],
        }]
    );
    assert_eq!(bus.peripheral().register(MPU6050, 0x6B), 0x01);
    assert_eq!(bus.peripheral().starts(), 1);
}

#[test]
fn test_embedded_hal_merges_adjacent_reads() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().set_registers(MPU6050, 0x3B, &[1, 2, 3, 4, 5]);

    let mut handle = bus;
    let mut head = [0u8; 2];
    let mut tail = [0u8; 3];
    handle
        .transaction(
            MPU6050,
            &mut [
                Operation::Write(&[0x3B]),
                Operation::Read(&mut head),
                Operation::Read(&mut tail),
            ],
        )
        .unwrap();

    assert_eq!(head, [1, 2]);
    assert_eq!(tail, [3, 4, 5]);
    assert_eq!(bus.peripheral().transactions().len(), 2);
    assert_eq!(bus.peripheral().repeated_starts(), 1);
    assert_eq!(bus.peripheral().read_acks(), vec![true, true, true, true, false]);
}

#[test]
fn test_embedded_hal_merged_writes_must_fit_buffer() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);

    let mut handle = bus;
    let result = handle.transaction(
        MPU6050,
        &mut [Operation::Write(&[0; 20]), Operation::Write(&[0; 20])],
    );

    assert_eq!(result, Err(TwiError::BufferOverflow));
    assert_eq!(bus.peripheral().starts(), 0);
}

#[test]
fn test_embedded_hal_error_kind() {
    use embedded_hal::i2c::{Error as _, ErrorKind, NoAcknowledgeSource};

    let bus = sim_bus();
    let mut handle = bus;
    let error = I2c::write(&mut handle, 0x33, &[0x00]).unwrap_err();

    assert_eq!(
        error.kind(),
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    );
}
