//! Integration tests for the complete attitude pipeline over the simulated bus

use icaro_imu::imu::MAX_UPDATE_GAP_MS;
use icaro_imu::output::{PITCH_OFFSET, RAW_SAMPLE_OFFSET, ROLL_OFFSET, YAW_OFFSET};
use icaro_imu::{
    CalibrationConfig, CalibrationOffsets, Calibrator, Error, I2cRegisters, Imu, ImuConfig,
    MemoryOffsetStore, OffsetStore, TwiError, UpdateOutcome,
};

use crate::common::{
    Fault, HMC5883L, MPU6050, MockClock, MockDelay, MotionModel, assert_float_eq, registers,
    sim_bus_with_sensors,
};

#[test]
fn test_setup_configures_both_sensors() {
    let bus = sim_bus_with_sensors();
    let regs = registers(bus);

    let _imu = Imu::new(&regs, ImuConfig::default()).unwrap();

    let sim = bus.peripheral();
    assert_eq!(sim.register(MPU6050, 0x6B), 0x01);
    assert_eq!(sim.register(MPU6050, 0x37) & 0x02, 0x02);
    assert_eq!(sim.register(HMC5883L, 0x00), 0x70);
    assert_eq!(sim.register(HMC5883L, 0x02), 0x00);
}

#[test]
fn test_setup_fails_without_magnetometer() {
    let bus = sim_bus_with_sensors();
    bus.peripheral().remove_device(HMC5883L);
    let regs = registers(bus);

    assert_eq!(
        Imu::new(&regs, ImuConfig::default()).err(),
        Some(Error::Bus(TwiError::AddressNack))
    );
}

#[test]
fn test_restore_offsets_from_store() {
    let bus = sim_bus_with_sensors();
    let regs = registers(bus);
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();

    let mut empty = MemoryOffsetStore::new();
    bus.peripheral().clear_log();
    assert_eq!(imu.restore_offsets(&mut empty), Ok(None));
    assert!(bus.peripheral().transactions().is_empty());

    let saved = CalibrationOffsets::from_array([-850, 120, 1630, 42, -17, 3]);
    let mut store = MemoryOffsetStore::from_image(saved.to_bytes());
    assert_eq!(imu.restore_offsets(&mut store), Ok(Some(saved)));
    assert_eq!(bus.peripheral().register_word(MPU6050, 0x0A), 1630);
    assert_eq!(bus.peripheral().register_word(MPU6050, 0x15), -17);
}

#[test]
fn test_calibrate_saves_and_applies() {
    let bus = sim_bus_with_sensors();
    bus.peripheral().set_motion_model(MotionModel {
        bias: [120, -80, 3900, 17, -9, 5],
        gain: [8, 8, 8, 2, 2, 2],
    });
    let regs = registers(bus);
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();
    let config = CalibrationConfig {
        samples: 10,
        warmup_samples: 2,
        sample_interval_us: 0,
        ..CalibrationConfig::default()
    };
    let mut calibrator = Calibrator::new(MockDelay::default(), config).unwrap();
    let mut store = MemoryOffsetStore::new();

    let offsets = imu.calibrate(&mut calibrator, &mut store).unwrap();

    assert_eq!(offsets, CalibrationOffsets::from_array([-15, 10, 24, -8, 4, -2]));
    assert_eq!(store.load_offsets(), Ok(Some(offsets)));
    assert_eq!(imu.mpu().read_offsets(), Ok(offsets));

    // The calibrated outputs sit inside the dead-zones around {0, 0, 1 g}
    let sample = imu.read_raw().unwrap();
    let [ax, ay, az, gx, gy, gz] = sample.motion.axes();
    assert!(ax.abs() <= 8 && ay.abs() <= 8);
    assert!((i32::from(az) - 4096).abs() <= 8);
    assert!(gx.abs() <= 1 && gy.abs() <= 1 && gz.abs() <= 1);
}

#[test]
fn test_calibration_failure_leaves_store_untouched() {
    let bus = sim_bus_with_sensors();
    bus.peripheral().set_motion_model(MotionModel {
        bias: [400, 0, 4096, 0, 0, 0],
        gain: [0; 6],
    });
    let regs = registers(bus);
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();
    let config = CalibrationConfig {
        samples: 4,
        warmup_samples: 0,
        sample_interval_us: 0,
        max_iterations: 3,
        ..CalibrationConfig::default()
    };
    let mut calibrator = Calibrator::new(MockDelay::default(), config).unwrap();
    let mut store = MemoryOffsetStore::new();

    assert_eq!(
        imu.calibrate(&mut calibrator, &mut store),
        Err(Error::CalibrationNotConverged)
    );
    assert_eq!(store.image(), &[0xFF; 13]);
}

#[test]
fn test_update_fills_register_block() {
    let bus = sim_bus_with_sensors();
    bus.peripheral().set_motion([0, 0, 4096], [0, 0, 0]);
    bus.peripheral().set_heading(300, 0, 200);
    let regs = registers(bus);
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();

    for _ in 0..10 {
        assert_eq!(imu.update(), Ok(UpdateOutcome::Full));
    }

    let angles = imu.orientation_degrees();
    assert_float_eq(angles.roll, 0.0, 1e-3);
    assert_float_eq(angles.pitch, 0.0, 1e-3);
    assert_float_eq(angles.yaw, 0.0, 1e-3);

    let block = imu.register_block();
    assert_eq!(block.read_f32(ROLL_OFFSET), Some(angles.roll));
    assert_eq!(block.read_f32(PITCH_OFFSET), Some(angles.pitch));
    assert_eq!(block.read_f32(YAW_OFFSET), Some(angles.yaw));
    assert_eq!(block.read_i16(RAW_SAMPLE_OFFSET + 4), Some(4096));
    assert_eq!(block.read_i16(RAW_SAMPLE_OFFSET + 12), Some(300));
    assert_eq!(block.read_i16(RAW_SAMPLE_OFFSET + 16), Some(200));
    assert_eq!(imu.last_sample().mag.as_array(), [300, 0, 200]);
}

#[test]
fn test_update_converges_on_tilted_board() {
    let bus = sim_bus_with_sensors();
    // Rolled 30 degrees: gravity splits between Y and Z
    bus.peripheral().set_motion([0, 2048, 3547], [0, 0, 0]);
    bus.peripheral().set_heading(300, 0, 0);
    let regs = I2cRegisters::new(bus, MockClock::ticking(10));
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();

    for _ in 0..1500 {
        imu.update().unwrap();
    }

    let roll = imu.register_block().read_f32(ROLL_OFFSET).unwrap();
    assert_float_eq(roll, 30.0, 0.5);
}

#[test]
fn test_gyro_rate_is_scaled_to_radians() {
    let bus = sim_bus_with_sensors();
    // 65.5 LSB per °/s at ±500 °/s: 90 °/s about Z
    bus.peripheral().set_motion([0, 0, 4096], [0, 0, 5895]);
    bus.peripheral().set_heading(0, 0, 0);
    let clock = MockClock::frozen();
    let regs = I2cRegisters::new(bus, clock.clone());
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();

    // 100 steps of 10 ms
    imu.update().unwrap();
    for _ in 0..99 {
        clock.advance(10);
        assert_eq!(imu.update(), Ok(UpdateOutcome::GravityOnly));
    }

    // First step used the nominal period, then 99 × 10 ms
    let expected = 90.0 * (1.0 / 512.0 + 0.99);
    assert_float_eq(imu.orientation_degrees().yaw, expected, 0.5);
}

#[test]
fn test_stalled_update_uses_nominal_period() {
    let bus = sim_bus_with_sensors();
    bus.peripheral().set_motion([0, 0, 4096], [0, 0, 5895]);
    bus.peripheral().set_heading(0, 0, 0);
    let clock = MockClock::frozen();
    let regs = I2cRegisters::new(bus, clock.clone());
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();

    imu.update().unwrap();
    clock.advance(MAX_UPDATE_GAP_MS + 4900);
    imu.update().unwrap();

    // Two nominal steps at 90 °/s, not five seconds of rotation
    let expected = 90.0 * 2.0 / 512.0;
    assert_float_eq(imu.orientation_degrees().yaw, expected, 0.05);
}

#[test]
fn test_failed_update_keeps_previous_output() {
    let bus = sim_bus_with_sensors();
    bus.peripheral().set_motion([0, 0, 4096], [0, 0, 0]);
    bus.peripheral().set_heading(300, 0, 200);
    let regs = registers(bus);
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();
    imu.update().unwrap();
    let before = *imu.register_block();

    bus.peripheral().set_motion([100, 100, 4000], [50, 50, 50]);
    bus.peripheral().inject(Fault::AddressNack);

    assert_eq!(imu.update(), Err(Error::Bus(TwiError::AddressNack)));
    assert_eq!(imu.register_block(), &before);
}

#[test]
fn test_self_test_through_pipeline() {
    let bus = sim_bus_with_sensors();
    bus.peripheral()
        .set_registers(MPU6050, 0x0D, &[0x8A, 0x53, 0xF7, 0x6D]);
    let regs = registers(bus);
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();

    let report = imu.self_test(&mut MockDelay::default()).unwrap();
    assert!(report.passed());
    assert_eq!(bus.peripheral().register(MPU6050, 0x1C), 0x10);
}

#[test]
fn test_bus_timeout_surfaces_from_pipeline() {
    let bus = sim_bus_with_sensors();
    let regs = I2cRegisters::new(bus, MockClock::ticking(1)).with_timeout(100);
    let mut imu = Imu::new(&regs, ImuConfig::default()).unwrap();

    bus.peripheral().set_silent(true);
    assert_eq!(imu.update(), Err(Error::Timeout));

    bus.peripheral().set_silent(false);
    assert!(imu.update().is_ok());
}
