//! Folding hardware counter progress into the microsecond total

use crate::config::ClockConfig;

/// Microsecond bookkeeping shared by the timer interrupt and the microsecond sampler
///
/// The counter wraps, so time is tracked in epochs. An epoch starts at `baseline` (a counter
/// value) and `epoch_start_micros` is the total at that point. Within an epoch the total is
/// recomputed from the baseline instead of accumulated, so frequent observations do not
/// accumulate rounding error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Reconciliation {
    /// Counter value at the most recent observation
    pub last: u32,
    /// Counter value at the start of the current epoch
    pub baseline: u32,
    /// Microseconds accumulated up to `last`
    pub total_micros: u64,
    /// Microseconds accumulated up to `baseline`
    pub epoch_start_micros: u64,
}

impl Reconciliation {
    /// Starts tracking from counter value `now`, with zero elapsed time
    pub fn starting_at(now: u32) -> Self {
        Reconciliation {
            last: now,
            baseline: now,
            total_micros: 0,
            epoch_start_micros: 0,
        }
    }

    /// Records a new counter reading
    ///
    /// A reading below the previous one means the counter wrapped. That starts a new epoch at
    /// `now`. Readings must be less than one full wrap apart; progress beyond that is lost.
    pub fn observe(&mut self, now: u32, config: &ClockConfig) -> u64 {
        if now >= self.last {
            let since_baseline = u64::from(now - self.baseline);
            self.total_micros = self.epoch_start_micros + config.cycles_to_micros(since_baseline);
        } else {
            let wrapped = config.modulus() - u64::from(self.last) + u64::from(now);
            self.total_micros += config.cycles_to_micros(wrapped);
            self.baseline = now;
            self.epoch_start_micros = self.total_micros;
        }
        self.last = now;
        self.total_micros
    }
}
