//! Unit tests for the register access layer

use icaro_imu::{Error, I2cRegisters, RegisterDescriptor, TwiError, TwiState};

use crate::common::{Fault, MPU6050, MockClock, Transaction, registers, sim_bus};

#[test]
fn test_read_byte_uses_pointer_write_then_read() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().set_register(MPU6050, 0x75, 0x68);
    let regs = registers(bus);

    assert_eq!(regs.read_byte(MPU6050, 0x75), Ok(0x68));
    assert_eq!(
        bus.peripheral().transactions(),
        vec![
            Transaction::Write {
                address: MPU6050,
                bytes: vec![0x75],
            },
            Transaction::Read {
                address: MPU6050,
                bytes: vec![0x68],
            },
        ]
    );
    assert_eq!(bus.peripheral().starts(), 1);
    assert_eq!(bus.peripheral().stops(), 1);
}

#[test]
fn test_write_bytes_single_transaction() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    let regs = registers(bus);

    regs.write_bytes(MPU6050, 0x13, &[0x12, 0x34, 0x56]).unwrap();

    assert_eq!(
        bus.peripheral().transactions(),
        vec![Transaction::Write {
            address: MPU6050,
            bytes: vec![0x13, 0x12, 0x34, 0x56],
        }]
    );
    assert_eq!(bus.peripheral().register(MPU6050, 0x14), 0x34);
}

#[test]
fn test_words_are_big_endian() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    let regs = registers(bus);

    regs.write_word(MPU6050, 0x06, 0xABCD).unwrap();
    assert_eq!(bus.peripheral().register(MPU6050, 0x06), 0xAB);
    assert_eq!(bus.peripheral().register(MPU6050, 0x07), 0xCD);
    assert_eq!(regs.read_word(MPU6050, 0x06), Ok(0xABCD));

    regs.write_words(MPU6050, 0x20, &[0x0102, 0x0304, 0xFFFE]).unwrap();
    let mut words = [0u16; 3];
    regs.read_words(MPU6050, 0x20, &mut words).unwrap();
    assert_eq!(words, [0x0102, 0x0304, 0xFFFE]);
    assert_eq!(bus.peripheral().register(MPU6050, 0x25), 0xFE);
}

#[test]
fn test_write_bits_preserves_other_bits() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().set_register(MPU6050, 0x1B, 0b1110_0111);
    let regs = registers(bus);

    let fs_sel = RegisterDescriptor::field(MPU6050, 0x1B, 4, 2);
    regs.write_bits(fs_sel, 0b10).unwrap();

    assert_eq!(bus.peripheral().register(MPU6050, 0x1B), 0b1111_0111);
    assert_eq!(regs.read_bits(fs_sel), Ok(0b10));
}

#[test]
fn test_single_bits() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().set_register(MPU6050, 0x6B, 0x41);
    let regs = registers(bus);

    let sleep = RegisterDescriptor::bit(MPU6050, 0x6B, 6);
    assert_eq!(regs.read_bit(sleep), Ok(true));

    regs.write_bit(sleep, false).unwrap();
    assert_eq!(bus.peripheral().register(MPU6050, 0x6B), 0x01);
    assert_eq!(regs.read_bit(sleep), Ok(false));
}

#[test]
fn test_word_bit_fields() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().set_registers(MPU6050, 0x30, &[0x80, 0x01]);
    let regs = registers(bus);

    let field = RegisterDescriptor::field(MPU6050, 0x30, 11, 8);
    regs.write_bits_word(field, 0xA5).unwrap();

    assert_eq!(regs.read_word(MPU6050, 0x30), Ok(0x8A51));
    assert_eq!(regs.read_bits_word(field), Ok(0xA5));
}

#[test]
fn test_byte_ops_reject_wide_fields() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    let regs = registers(bus);

    let wide = RegisterDescriptor::word(MPU6050, 0x06);
    assert_eq!(regs.read_bits(wide), Err(Error::InvalidConfig));
    assert_eq!(regs.write_bits(wide, 1), Err(Error::InvalidConfig));
    assert!(bus.peripheral().transactions().is_empty());
}

#[test]
fn test_oversize_requests() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    let regs = registers(bus);

    let mut buffer = [0u8; 33];
    assert_eq!(
        regs.read_bytes(MPU6050, 0x00, &mut buffer),
        Err(Error::Bus(TwiError::BufferOverflow))
    );
    // Register address takes one slot of the frame
    assert_eq!(
        regs.write_bytes(MPU6050, 0x00, &[0u8; 32]),
        Err(Error::Bus(TwiError::BufferOverflow))
    );
    regs.write_bytes(MPU6050, 0x00, &[0u8; 31]).unwrap();
    assert_eq!(bus.peripheral().starts(), 1);
}

#[test]
fn test_empty_read_touches_nothing() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    let regs = registers(bus);

    regs.read_bytes(MPU6050, 0x3B, &mut []).unwrap();
    assert_eq!(bus.peripheral().starts(), 0);
}

#[test]
fn test_errors_propagate_unchanged() {
    let bus = sim_bus();
    let regs = registers(bus);

    assert_eq!(
        regs.read_byte(0x50, 0x00),
        Err(Error::Bus(TwiError::AddressNack))
    );

    bus.peripheral().add_device(MPU6050);
    bus.peripheral().inject(Fault::DataNack);
    assert_eq!(
        regs.write_byte(MPU6050, 0x6B, 0x00),
        Err(Error::Bus(TwiError::DataNack))
    );
    // Single attempt, no retry
    assert_eq!(bus.peripheral().starts(), 2);
}

#[test]
fn test_timeout_aborts_transaction() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    bus.peripheral().set_silent(true);
    let regs = I2cRegisters::new(bus, MockClock::ticking(1)).with_timeout(5);
    assert_eq!(regs.timeout(), Some(5));

    assert_eq!(regs.read_byte(MPU6050, 0x75), Err(Error::Timeout));
    assert_eq!(bus.state(), TwiState::Ready);
    assert_eq!(bus.peripheral().stops(), 1);

    bus.peripheral().set_silent(false);
    bus.peripheral().set_register(MPU6050, 0x75, 0x68);
    assert_eq!(regs.read_byte(MPU6050, 0x75), Ok(0x68));
}

#[test]
fn test_no_timeout_without_budget() {
    let bus = sim_bus();
    bus.peripheral().add_device(MPU6050);
    let clock = MockClock::frozen();
    let regs = I2cRegisters::new(bus, clock.clone());
    assert_eq!(regs.timeout(), None);

    clock.advance(1_000_000);
    regs.write_byte(MPU6050, 0x6B, 0x00).unwrap();
}
