//! Common test utilities and the simulated bus
#![allow(dead_code)]


#[allow(unused_imports)]
pub use sim_twi::{Fault, MotionModel, SimTwi, Transaction, HMC5883L, MPU6050};
#[allow(unused_imports)]
pub use test_utils::{
    MockClock, MockDelay, SimBus, SimRegisters, assert_float_eq, registers, sim_bus,
    sim_bus_with_sensors,
};
