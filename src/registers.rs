//! Register maps
//!
//! Addresses and bit-field descriptors for the MPU-6050 and the HMC5883L.
//! Descriptors carry the default device address; drivers configured for
//! another address re-target them with [`RegisterDescriptor::at`].

/// MPU-6050 accelerometer and gyroscope
pub mod mpu6050 {
    use crate::interface::RegisterDescriptor as R;

    /// Device address with AD0 low
    pub const ADDRESS: u8 = 0x68;
    /// Device address with AD0 high
    pub const ADDRESS_AD0_HIGH: u8 = 0x69;
    /// Expected identity in `WHO_AM_I` bits 6..1
    pub const WHO_AM_I_VALUE: u8 = 0x34;

    /// Accelerometer X offset, high byte
    pub const XA_OFFS_H: u8 = 0x06;
    /// Accelerometer Y offset, high byte
    pub const YA_OFFS_H: u8 = 0x08;
    /// Accelerometer Z offset, high byte
    pub const ZA_OFFS_H: u8 = 0x0A;
    /// Self-test codes, X
    pub const SELF_TEST_X: u8 = 0x0D;
    /// Self-test codes, Y
    pub const SELF_TEST_Y: u8 = 0x0E;
    /// Self-test codes, Z
    pub const SELF_TEST_Z: u8 = 0x0F;
    /// Self-test codes, accelerometer low bits
    pub const SELF_TEST_A: u8 = 0x10;
    /// Gyroscope X offset, high byte
    pub const XG_OFFS_USRH: u8 = 0x13;
    /// Gyroscope Y offset, high byte
    pub const YG_OFFS_USRH: u8 = 0x15;
    /// Gyroscope Z offset, high byte
    pub const ZG_OFFS_USRH: u8 = 0x17;
    /// Gyroscope configuration
    pub const GYRO_CONFIG: u8 = 0x1B;
    /// Accelerometer configuration
    pub const ACCEL_CONFIG: u8 = 0x1C;
    /// Interrupt pin and bypass configuration
    pub const INT_PIN_CFG: u8 = 0x37;
    /// First accelerometer output register
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    /// Temperature output, high byte
    pub const TEMP_OUT_H: u8 = 0x41;
    /// First gyroscope output register
    pub const GYRO_XOUT_H: u8 = 0x43;
    /// User control
    pub const USER_CTRL: u8 = 0x6A;
    /// Power management 1
    pub const PWR_MGMT_1: u8 = 0x6B;
    /// Identity register
    pub const WHO_AM_I: u8 = 0x75;

    /// Accelerometer offset registers, X/Y/Z
    pub const ACCEL_OFFSET_REGISTERS: [u8; 3] = [XA_OFFS_H, YA_OFFS_H, ZA_OFFS_H];
    /// Gyroscope offset registers, X/Y/Z
    pub const GYRO_OFFSET_REGISTERS: [u8; 3] = [XG_OFFS_USRH, YG_OFFS_USRH, ZG_OFFS_USRH];

    /// Length of the accel + temperature + gyro burst starting at `ACCEL_XOUT_H`
    pub const MOTION_BURST_LENGTH: usize = 14;

    /// Value written to `ACCEL_CONFIG` during self-test (all axes, ±8 g)
    pub const ACCEL_SELF_TEST_CONFIG: u8 = 0xF0;
    /// Value written to `GYRO_CONFIG` during self-test (all axes, ±250 °/s)
    pub const GYRO_SELF_TEST_CONFIG: u8 = 0xE0;

    /// Gyroscope full-scale select
    pub const GYRO_FS_SEL: R = R::field(ADDRESS, GYRO_CONFIG, 4, 2);
    /// Accelerometer full-scale select
    pub const ACCEL_AFS_SEL: R = R::field(ADDRESS, ACCEL_CONFIG, 4, 2);
    /// Auxiliary bus bypass switch
    pub const I2C_BYPASS_EN: R = R::bit(ADDRESS, INT_PIN_CFG, 1);
    /// Auxiliary bus master enable
    pub const I2C_MST_EN: R = R::bit(ADDRESS, USER_CTRL, 5);
    /// Reset all registers to defaults
    pub const DEVICE_RESET: R = R::bit(ADDRESS, PWR_MGMT_1, 7);
    /// Sleep mode
    pub const SLEEP: R = R::bit(ADDRESS, PWR_MGMT_1, 6);
    /// Clock source select
    pub const CLKSEL: R = R::field(ADDRESS, PWR_MGMT_1, 2, 3);
    /// Identity field
    pub const WHO_AM_I_ID: R = R::field(ADDRESS, WHO_AM_I, 6, 6);
}

/// HMC5883L magnetometer
pub mod hmc5883l {
    use crate::interface::RegisterDescriptor as R;

    /// Device address
    pub const ADDRESS: u8 = 0x1E;
    /// Expected contents of `ID_A..=ID_C`
    pub const IDENTITY: [u8; 3] = *b"H43";

    /// Configuration register A
    pub const CONFIG_A: u8 = 0x00;
    /// Configuration register B
    pub const CONFIG_B: u8 = 0x01;
    /// Mode register
    pub const MODE: u8 = 0x02;
    /// First data output register
    pub const DATA_X_MSB: u8 = 0x03;
    /// Status register
    pub const STATUS: u8 = 0x09;
    /// First identification register
    pub const ID_A: u8 = 0x0A;

    /// Length of the X/Z/Y output burst
    pub const DATA_LENGTH: usize = 6;

    /// Samples averaged per output
    pub const AVERAGING: R = R::field(ADDRESS, CONFIG_A, 6, 2);
    /// Continuous-mode output rate
    pub const DATA_RATE: R = R::field(ADDRESS, CONFIG_A, 4, 3);
    /// Measurement bias
    pub const MEASUREMENT_BIAS: R = R::field(ADDRESS, CONFIG_A, 1, 2);
    /// Gain
    pub const GAIN: R = R::field(ADDRESS, CONFIG_B, 7, 3);
    /// Operating mode
    pub const MODE_SELECT: R = R::field(ADDRESS, MODE, 1, 2);
    /// Output registers locked
    pub const STATUS_LOCK: R = R::bit(ADDRESS, STATUS, 1);
    /// New data ready
    pub const STATUS_READY: R = R::bit(ADDRESS, STATUS, 0);
}
