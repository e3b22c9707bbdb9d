//! Millisecond timekeeping
//!
//! [`Clock`] is the time source used for transaction timeouts and for the
//! filter's integration step. [`TickCounter`] is an implementation driven by
//! the overflow interrupt of an 8-bit timer running at `cpu_hz / 64`.

use core::cell::Cell;

use critical_section::Mutex;

/// Timer prescaler assumed by [`TickCounter`]
pub const TIMER_PRESCALER: u32 = 64;

/// Monotonic millisecond time source
pub trait Clock {
    /// Milliseconds since start-up, wrapping at `u32::MAX`
    fn millis(&self) -> u32;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn millis(&self) -> u32 {
        (**self).millis()
    }
}

#[derive(Clone, Copy)]
struct Ticks {
    millis: u32,
    fract: u8,
    overflows: u32,
}

/// Millisecond counter advanced from a timer overflow interrupt
///
/// Each overflow adds a whole number of milliseconds plus a fractional part
/// counted in units of 8 µs; the fraction carries into the millisecond count
/// once it reaches one millisecond.
pub struct TickCounter {
    millis_inc: u32,
    fract_inc: u8,
    ticks: Mutex<Cell<Ticks>>,
}

impl TickCounter {
    /// Fractional units per millisecond (1000 µs / 8)
    pub const FRACT_MAX: u8 = 125;

    /// Create a counter for a CPU clocked at `cpu_hz`
    #[must_use]
    pub const fn from_cpu_hz(cpu_hz: u32) -> Self {
        let mhz = if cpu_hz < 1_000_000 {
            1
        } else {
            cpu_hz / 1_000_000
        };
        let micros_per_overflow = (TIMER_PRESCALER * 256) / mhz;
        #[allow(clippy::cast_possible_truncation)]
        let fract_inc = ((micros_per_overflow % 1000) >> 3) as u8;
        Self {
            millis_inc: micros_per_overflow / 1000,
            fract_inc,
            ticks: Mutex::new(Cell::new(Ticks {
                millis: 0,
                fract: 0,
                overflows: 0,
            })),
        }
    }

    /// Timer overflow interrupt handler
    pub fn on_overflow(&self) {
        critical_section::with(|cs| {
            let cell = self.ticks.borrow(cs);
            let mut ticks = cell.get();
            ticks.millis = ticks.millis.wrapping_add(self.millis_inc);
            ticks.fract += self.fract_inc;
            if ticks.fract >= Self::FRACT_MAX {
                ticks.fract -= Self::FRACT_MAX;
                ticks.millis = ticks.millis.wrapping_add(1);
            }
            ticks.overflows = ticks.overflows.wrapping_add(1);
            cell.set(ticks);
        });
    }

    /// Number of timer overflows seen so far
    pub fn overflow_count(&self) -> u32 {
        critical_section::with(|cs| self.ticks.borrow(cs).get().overflows)
    }

    /// Whole milliseconds added per overflow
    #[must_use]
    pub const fn millis_increment(&self) -> u32 {
        self.millis_inc
    }

    /// Fractional units (8 µs) added per overflow
    #[must_use]
    pub const fn fract_increment(&self) -> u8 {
        self.fract_inc
    }
}

impl Clock for TickCounter {
    fn millis(&self) -> u32 {
        critical_section::with(|cs| self.ticks.borrow(cs).get().millis)
    }
}
