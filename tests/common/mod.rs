//! A simulated compare timer for driving the clock from tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use coretimer_clock::{ClockConfig, CompareTimer, RateHook};

/// A counter that wraps at `mask`, backed by an absolute cycle count that never wraps
///
/// The compare register is tracked as an absolute value too, so tests can tell whether the
/// next interrupt is due without reasoning about the ring.
pub struct SimTimer {
    mask: u32,
    cycles: AtomicU64,
    /// Cycles added after every counter read, to model time passing while code runs
    cycles_per_read: AtomicU64,
    compare: AtomicU64,
    acks: AtomicU32,
    priority: AtomicU8,
}

impl SimTimer {
    pub fn new(config: &ClockConfig, start: u64) -> Self {
        SimTimer {
            mask: config.mask(),
            cycles: AtomicU64::new(start),
            cycles_per_read: AtomicU64::new(0),
            compare: AtomicU64::new(0),
            acks: AtomicU32::new(0),
            priority: AtomicU8::new(0),
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn set_cycles(&self, cycles: u64) {
        self.cycles.store(cycles, Ordering::SeqCst);
    }

    pub fn advance(&self, cycles: u64) {
        self.cycles.fetch_add(cycles, Ordering::SeqCst);
    }

    pub fn set_cycles_per_read(&self, cycles: u64) {
        self.cycles_per_read.store(cycles, Ordering::SeqCst);
    }

    /// Absolute cycle count at which the next compare match happens
    pub fn compare(&self) -> u64 {
        self.compare.load(Ordering::SeqCst)
    }

    /// Moves the counter to the next compare match plus `latency` cycles
    pub fn advance_to_compare(&self, latency: u64) {
        self.set_cycles(self.compare() + latency);
    }

    pub fn is_due(&self) -> bool {
        self.cycles() >= self.compare()
    }

    pub fn acks(&self) -> u32 {
        self.acks.load(Ordering::SeqCst)
    }

    pub fn priority(&self) -> u8 {
        self.priority.load(Ordering::SeqCst)
    }
}

impl CompareTimer for SimTimer {
    fn counter(&self) -> u32 {
        let step = self.cycles_per_read.load(Ordering::SeqCst);
        let cycles = self.cycles.fetch_add(step, Ordering::SeqCst);
        (cycles & u64::from(self.mask)) as u32
    }

    fn set_compare(&self, target: u32) {
        // Place the target at the first matching absolute value after the current count
        let now = self.cycles();
        let modulus = u64::from(self.mask) + 1;
        let ring_now = now % modulus;
        let target = u64::from(target);
        let ahead = (target + modulus - ring_now) % modulus;
        self.compare.store(now + ahead, Ordering::SeqCst);
    }

    fn advance_compare(&self, cycles: u32) {
        self.compare.fetch_add(u64::from(cycles), Ordering::SeqCst);
    }

    fn clear_interrupt(&self) {
        self.acks.fetch_add(1, Ordering::SeqCst);
    }

    fn enable_interrupt(&self, priority: u8) {
        self.priority.store(priority, Ordering::SeqCst);
    }
}

/// A rate hook that owns the compare register, like a software PWM driver: it moves the
/// compare target forward by `step` on every interrupt and lets the clock's bookkeeping run
/// on every `every`th one
pub struct SelfSchedulingHook {
    timer: &'static SimTimer,
    step: u32,
    every: u32,
    calls: AtomicU32,
}

impl SelfSchedulingHook {
    pub fn leak(timer: &'static SimTimer, step: u32, every: u32) -> &'static SelfSchedulingHook {
        Box::leak(Box::new(SelfSchedulingHook {
            timer,
            step,
            every,
            calls: AtomicU32::new(0),
        }))
    }
}

impl RateHook for SelfSchedulingHook {
    fn poll_ready(&self) -> bool {
        self.timer.advance_compare(self.step);
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        calls % self.every == 0
    }
}
