//!
//! Millisecond and microsecond clocks for microcontrollers, driven by a compare-match timer
//! interrupt on a free-running, wrapping counter
//!
//! # Supported hardware
//!
//! * Anything that implements [`CompareTimer`], for example a MIPS core timer
//! * STM32F412 and STM32F413 using TIM2 (features `stm32f412` and `stm32f413`)
//!
//! # How it works
//!
//! The compare interrupt fires once per tick (normally one millisecond). On each interrupt,
//! [`TimeKeeper::handle_interrupt`] measures how many whole ticks actually passed since the
//! previous one, so interrupts that were delayed or merged do not lose time, adds that many
//! ticks to the millisecond count, and moves the compare register forward by the same
//! amount.
//!
//! [`TimeKeeper::now_micros`] reads the counter directly and converts it to microseconds.
//! Both the interrupt and `now_micros` fold counter wraps into the microsecond total, and
//! they coordinate with a busy flag so the interrupt never sees a half-updated total.
//!
//! # Requirements for correct behavior
//!
//! The application must define a handler for the timer interrupt that calls
//! `handle_interrupt()`, and call `start()` once before relying on the clock.
//!
//! The timer interrupt handler must have higher priority than any other interrupt or task that
//! calls `now_micros()` or `now_millis()`. Only one execution context should call
//! `now_micros()`.
//!
//! The timer interrupt must be allowed to execute at least once per full wrap of the counter
//! (about 107 seconds for a 32-bit counter at 40 MHz). Interrupts may not be disabled for
//! that long, and no interrupt or task that has a higher priority than the timer interrupt
//! may run continuously for that long.
//!
//! Violating these constraints will not cause undefined behavior, but it may cause the clocks
//! to fall behind.
//!
//! # Configuration
//!
//! All constants come from a [`ClockConfig`]. Evaluate it in a `const` item so that an
//! invalid configuration fails the build.
//!

#![cfg_attr(not(test), no_std)]

mod config;
mod error;
mod hook;
mod hw;
mod keeper;
mod reconcile;

#[cfg(feature = "stm32")]
pub mod stm32;

pub use crate::config::{ClockConfig, DEFAULT_PRIORITY};
pub use crate::error::Error;
pub use crate::hook::RateHook;
pub use crate::hw::CompareTimer;
pub use crate::keeper::TimeKeeper;

use embedded_time::clock;
use embedded_time::duration::Fraction;
use embedded_time::{Clock, Instant};

/// The microsecond count of a [`TimeKeeper`] as an embedded-time clock
pub struct MicrosecondClock<'a, T> {
    keeper: &'a TimeKeeper<T>,
}

impl<'a, T: CompareTimer> MicrosecondClock<'a, T> {
    pub fn new(keeper: &'a TimeKeeper<T>) -> Self {
        MicrosecondClock { keeper }
    }
}

// embedded-time compatibility
impl<T: CompareTimer> Clock for MicrosecondClock<'_, T> {
    type T = u64;
    const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

    fn try_now(&self) -> Result<Instant<Self>, clock::Error> {
        running(self.keeper)
            .map(|keeper| Instant::new(keeper.now_micros()))
            .map_err(|_| clock::Error::NotRunning)
    }
}

/// The millisecond count of a [`TimeKeeper`] as an embedded-time clock
pub struct MillisecondClock<'a, T> {
    keeper: &'a TimeKeeper<T>,
}

impl<'a, T> MillisecondClock<'a, T> {
    pub fn new(keeper: &'a TimeKeeper<T>) -> Self {
        MillisecondClock { keeper }
    }
}

impl<T> Clock for MillisecondClock<'_, T> {
    type T = u64;
    const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000);

    fn try_now(&self) -> Result<Instant<Self>, clock::Error> {
        running(self.keeper)
            .map(|keeper| Instant::new(keeper.now_millis()))
            .map_err(|_| clock::Error::NotRunning)
    }
}

fn running<T>(keeper: &TimeKeeper<T>) -> Result<&TimeKeeper<T>, Error> {
    if keeper.is_running() {
        Ok(keeper)
    } else {
        Err(Error::NotRunning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    struct Counter(AtomicU32);

    impl CompareTimer for Counter {
        fn counter(&self) -> u32 {
            self.0.load(Ordering::SeqCst)
        }
        fn set_compare(&self, _target: u32) {}
        fn advance_compare(&self, _cycles: u32) {}
        fn clear_interrupt(&self) {}
        fn enable_interrupt(&self, _priority: u8) {}
    }

    #[test]
    fn clocks_not_running_before_start() {
        let keeper = TimeKeeper::new(Counter(AtomicU32::new(0)), ClockConfig::new(1_000_000, 1_000));
        assert!(MicrosecondClock::new(&keeper).try_now().is_err());
        assert!(MillisecondClock::new(&keeper).try_now().is_err());
    }

    #[test]
    fn microsecond_clock_reads_keeper() {
        let keeper = TimeKeeper::new(Counter(AtomicU32::new(100)), ClockConfig::new(1_000_000, 1_000));
        keeper.start();
        keeper.timer().0.store(350, Ordering::SeqCst);
        let clock = MicrosecondClock::new(&keeper);
        let now = clock.try_now().unwrap();
        assert_eq!(*now.duration_since_epoch().integer(), 250);
    }
}
