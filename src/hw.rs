//! The hardware the clock runs on
//!
//! The clock needs a free-running counter that wraps around at a fixed width, and a compare
//! register on the same counter that raises an interrupt when the counter reaches it. On
//! MIPS cores this is the core timer (`Count`/`Compare`); on STM32 parts any general-purpose
//! timer with an output-compare channel works (see the `stm32` module).

/// A free-running counter with a compare-match interrupt
///
/// Implementations are register accessors only. They take `&self` because they are called
/// both from the timer interrupt and from normal code.
pub trait CompareTimer {
    /// Reads the free-running counter
    ///
    /// Bits above the configured counter width are ignored by the clock.
    fn counter(&self) -> u32;

    /// Sets the compare register to an absolute counter value
    fn set_compare(&self, target: u32);

    /// Moves the compare register forward by `cycles` from its current target (not from the
    /// current counter value), keeping interrupts in phase
    fn advance_compare(&self, cycles: u32);

    /// Acknowledges a compare-match interrupt
    fn clear_interrupt(&self);

    /// Unmasks the compare-match interrupt at the given priority
    fn enable_interrupt(&self, priority: u8);
}

impl<T: CompareTimer + ?Sized> CompareTimer for &T {
    fn counter(&self) -> u32 {
        (**self).counter()
    }
    fn set_compare(&self, target: u32) {
        (**self).set_compare(target)
    }
    fn advance_compare(&self, cycles: u32) {
        (**self).advance_compare(cycles)
    }
    fn clear_interrupt(&self) {
        (**self).clear_interrupt()
    }
    fn enable_interrupt(&self, priority: u8) {
        (**self).enable_interrupt(priority)
    }
}
