//! Sharing the tick interrupt with a faster periodic consumer
//!
//! A software PWM or servo driver may want the timer interrupt more often than once per
//! tick. It does that by installing a [`RateHook`]: the hook runs first on every interrupt,
//! takes over scheduling of the compare register, and tells the clock whether the regular
//! tick bookkeeping is due on this interrupt. Time that passes while the bookkeeping is not
//! due is not lost; it is counted the next time the hook reports that it is due.

/// A per-interrupt consumer that shares the clock's timer
pub trait RateHook {
    /// Runs once per timer interrupt, before the tick bookkeeping
    ///
    /// Returns true if the tick bookkeeping should run on this interrupt. While a hook is
    /// installed the clock never touches the compare register, so the hook must schedule the
    /// next interrupt itself.
    fn poll_ready(&self) -> bool;
}

impl RateHook for fn() -> bool {
    fn poll_ready(&self) -> bool {
        self()
    }
}

/// Who decides when the tick bookkeeping runs
#[derive(Clone, Copy)]
pub(crate) enum RateSource {
    /// Bookkeeping runs on every interrupt and the clock schedules the compare register
    Internal,
    /// Bookkeeping runs when the hook says so and the hook schedules the compare register
    External(&'static (dyn RateHook + Sync)),
}

impl RateSource {
    pub(crate) fn poll_ready(&self) -> bool {
        match self {
            RateSource::Internal => true,
            RateSource::External(hook) => hook.poll_ready(),
        }
    }
}

impl core::fmt::Debug for RateSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RateSource::Internal => f.write_str("Internal"),
            RateSource::External(_) => f.write_str("External"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never() -> bool {
        false
    }

    static NEVER: fn() -> bool = never;

    #[test]
    fn internal_is_always_ready() {
        assert!(RateSource::Internal.poll_ready());
    }

    #[test]
    fn function_hook() {
        let source = RateSource::External(&NEVER);
        assert!(!source.poll_ready());
    }
}
