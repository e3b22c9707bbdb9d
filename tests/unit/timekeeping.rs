//! Unit tests for the millisecond tick counter

use icaro_imu::{Clock, TickCounter, TwiConfig};

static TICKS: TickCounter = TickCounter::from_cpu_hz(16_000_000);

#[test]
fn test_fraction_carries_into_millis() {
    let counter = TickCounter::from_cpu_hz(16_000_000);
    assert_eq!(counter.millis(), 0);

    // 1.024 ms per overflow
    for _ in 0..125 {
        counter.on_overflow();
    }
    assert_eq!(counter.millis(), 128);
    assert_eq!(counter.overflow_count(), 125);

    for _ in 0..1000 {
        counter.on_overflow();
    }
    assert_eq!(counter.millis(), 1152);
}

#[test]
fn test_slower_cpu() {
    let counter = TickCounter::from_cpu_hz(8_000_000);

    // 2.048 ms per overflow
    for _ in 0..125 {
        counter.on_overflow();
    }
    assert_eq!(counter.millis(), 256);
}

#[test]
fn test_static_counter_through_trait_object() {
    TICKS.on_overflow();
    let clock: &dyn Clock = &TICKS;
    assert!(clock.millis() >= 1);
    assert!((&TICKS).millis() >= 1);
}

#[test]
fn test_bus_clock_divisor() {
    assert_eq!(TwiConfig::default().bit_rate_divisor(16_000_000), 72);
    let fast = TwiConfig { frequency: 400_000 };
    assert_eq!(fast.bit_rate_divisor(16_000_000), 12);
    let crawl = TwiConfig { frequency: 1_000 };
    assert_eq!(crawl.bit_rate_divisor(16_000_000), 255);
}
