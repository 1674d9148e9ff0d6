//! The clock state and the operations that touch it

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::config::ClockConfig;
use crate::error::Error;
use crate::hook::{RateHook, RateSource};
use crate::hw::CompareTimer;
use crate::reconcile::Reconciliation;

/// Millisecond bookkeeping, written only by the timer interrupt
#[derive(Debug, Clone, Copy, Default)]
struct Ticks {
    /// Counter value the next tick delta is measured from. Advances in whole ticks, in phase
    /// with the compare register.
    anchor: u32,
    millis: u64,
}

/// Millisecond and microsecond clocks driven by a compare-match timer interrupt
///
/// A `TimeKeeper` is normally a `static`, so that both the timer interrupt and the rest of
/// the application can reach it:
///
/// ```ignore
/// static CLOCK: TimeKeeper<Tim2Counter> =
///     TimeKeeper::new(Tim2Counter::new(), ClockConfig::new(1_000_000, 1_000));
///
/// #[interrupt]
/// fn TIM2() {
///     CLOCK.handle_interrupt();
/// }
/// ```
pub struct TimeKeeper<T> {
    timer: T,
    config: ClockConfig,
    running: AtomicBool,
    ticks: Mutex<Cell<Ticks>>,
    reconciliation: Mutex<Cell<Reconciliation>>,
    /// Set while the microsecond sampler is between reading the counter and publishing its
    /// result. The interrupt leaves `reconciliation` alone while this is set.
    micros_in_progress: AtomicBool,
    rate_source: Mutex<Cell<RateSource>>,
}

impl<T> TimeKeeper<T> {
    /// Creates a stopped clock
    pub const fn new(timer: T, config: ClockConfig) -> Self {
        TimeKeeper {
            timer,
            config,
            running: AtomicBool::new(false),
            ticks: Mutex::new(Cell::new(Ticks { anchor: 0, millis: 0 })),
            reconciliation: Mutex::new(Cell::new(Reconciliation {
                last: 0,
                baseline: 0,
                total_micros: 0,
                epoch_start_micros: 0,
            })),
            micros_in_progress: AtomicBool::new(false),
            rate_source: Mutex::new(Cell::new(RateSource::Internal)),
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Returns the timer this clock runs on
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Returns true if `start()` has been called
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Hands the per-interrupt bookkeeping decision to `hook`
    ///
    /// This must happen before `start()`. Once the interrupt is enabled, this returns
    /// `Error::AlreadyRunning` and the hook is not installed.
    pub fn install_rate_hook(&self, hook: &'static (dyn RateHook + Sync)) -> Result<(), Error> {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }
        critical_section::with(|cs| {
            self.rate_source.borrow(cs).set(RateSource::External(hook));
        });
        #[cfg(feature = "defmt")]
        defmt::debug!("rate hook installed");
        Ok(())
    }

    /// Returns the number of milliseconds since the clock was started
    pub fn now_millis(&self) -> u64 {
        // Wider than a machine word on 32-bit cores, so read with the interrupt masked
        critical_section::with(|cs| self.ticks.borrow(cs).get().millis)
    }

    /// Waits until at least `ms` milliseconds have passed
    ///
    /// This spins. The timer interrupt must be able to run while it waits.
    pub fn delay_millis(&self, ms: u64) {
        let start = self.now_millis();
        while self.now_millis().wrapping_sub(start) < ms {
            core::hint::spin_loop();
        }
    }

    fn published_micros(&self) -> u64 {
        critical_section::with(|cs| self.reconciliation.borrow(cs).get().total_micros)
    }
}

impl<T: CompareTimer> TimeKeeper<T> {
    /// Starts the clock
    ///
    /// Both clocks read zero at the current counter value. The first interrupt is scheduled
    /// one tick ahead, then the compare interrupt is enabled at the configured priority.
    pub fn start(&self) {
        let now = self.read_counter();
        critical_section::with(|cs| {
            self.ticks.borrow(cs).set(Ticks {
                anchor: now,
                millis: 0,
            });
            self.reconciliation
                .borrow(cs)
                .set(Reconciliation::starting_at(now));
        });
        self.timer
            .set_compare(now.wrapping_add(self.config.tick_cycles()) & self.config.mask());
        self.timer.clear_interrupt();
        self.running.store(true, Ordering::Release);
        self.timer.enable_interrupt(self.config.priority());

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "clock started at counter {=u32}, {=u32} cycles per tick",
            now,
            self.config.tick_cycles()
        );
    }

    /// Handles a compare-match interrupt from the timer
    ///
    /// Call this from the timer interrupt handler and nowhere else. The interrupt must have a
    /// higher priority than any code that reads the clock.
    pub fn handle_interrupt(&self) {
        if !self.is_running() {
            self.timer.clear_interrupt();
            return;
        }
        let now = self.read_counter();
        let rate_source = critical_section::with(|cs| self.rate_source.borrow(cs).get());

        let anchor = critical_section::with(|cs| self.ticks.borrow(cs).get().anchor);
        let mut elapsed = now.wrapping_sub(anchor) & self.config.mask();
        if elapsed > self.config.mask() / 2 {
            // The anchor is ahead of the counter after an early interrupt
            elapsed = 0;
        }
        // If the interrupt arrived early relative to the anchor, still make progress
        let tick_delta = (elapsed / self.config.tick_cycles()).max(1);

        if rate_source.poll_ready() {
            let in_progress = self.micros_in_progress.load(Ordering::Acquire);
            critical_section::with(|cs| {
                if !in_progress {
                    let cell = self.reconciliation.borrow(cs);
                    let mut reconciliation = cell.get();
                    reconciliation.observe(now, &self.config);
                    cell.set(reconciliation);
                }
                let cell = self.ticks.borrow(cs);
                let mut ticks = cell.get();
                ticks.millis += u64::from(tick_delta) * self.config.millis_per_tick();
                ticks.anchor = ticks
                    .anchor
                    .wrapping_add(tick_delta * self.config.tick_cycles())
                    & self.config.mask();
                cell.set(ticks);
            });
            // An installed hook schedules the compare register itself
            if let RateSource::Internal = rate_source {
                self.timer
                    .advance_compare(tick_delta * self.config.tick_cycles());
            }
        }

        self.timer.clear_interrupt();
    }

    /// Returns the number of microseconds since the clock was started
    ///
    /// The count is only accurate if the counter wraps at most once between two observations,
    /// by either this function or the timer interrupt. The interrupt observes the counter on
    /// every tick, so this holds as long as the interrupt is not held off for a full counter
    /// period.
    ///
    /// Only one execution context (plus the timer interrupt) should call this. If it is
    /// called from an interrupt that preempted another call, it returns the most recently
    /// published count without updating it.
    pub fn now_micros(&self) -> u64 {
        match self.begin_sample() {
            Some(sample) => sample.finish(),
            None => self.published_micros(),
        }
    }

    /// Waits until at least `us` microseconds have passed
    ///
    /// This spins. The wait is unreliable if it spans a wrap of the 64-bit microsecond count.
    pub fn delay_micros(&self, us: u32) {
        let start = self.now_micros();
        while self.now_micros().wrapping_sub(start) < u64::from(us) {
            core::hint::spin_loop();
        }
    }

    /// Marks the sampler busy and reads the counter
    ///
    /// Returns None if another sample is already in progress.
    pub(crate) fn begin_sample(&self) -> Option<MicrosSample<'_, T>> {
        if self.micros_in_progress.load(Ordering::Acquire) {
            return None;
        }
        self.micros_in_progress.store(true, Ordering::Release);
        let now = self.read_counter();
        Some(MicrosSample { keeper: self, now })
    }

    fn read_counter(&self) -> u32 {
        self.timer.counter() & self.config.mask()
    }
}

/// A microsecond sample that has read the counter but not yet published its result
///
/// While one of these exists, the timer interrupt does not reconcile. Dropping it clears the
/// busy flag.
pub(crate) struct MicrosSample<'a, T> {
    keeper: &'a TimeKeeper<T>,
    now: u32,
}

impl<T> MicrosSample<'_, T> {
    pub(crate) fn finish(self) -> u64 {
        let keeper = self.keeper;
        let mut reconciliation = critical_section::with(|cs| keeper.reconciliation.borrow(cs).get());
        let micros = reconciliation.observe(self.now, &keeper.config);
        critical_section::with(|cs| keeper.reconciliation.borrow(cs).set(reconciliation));
        micros
    }
}

impl<T> Drop for MicrosSample<'_, T> {
    fn drop(&mut self) {
        self.keeper
            .micros_in_progress
            .store(false, Ordering::Release);
    }
}
