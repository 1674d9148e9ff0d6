//! Build-time clock configuration
//!
//! A [`ClockConfig`] fixes every constant the clock derives its conversions from. It is meant
//! to be evaluated in a `const` item, so that configuration mistakes (a zero tick rate, a
//! tick that is not a whole number of milliseconds, ...) stop the build instead of showing
//! up as a division by zero in the timer interrupt:
//!
//! ```
//! use coretimer_clock::ClockConfig;
//!
//! // PIC32-style core timer: counts at half the 80 MHz CPU clock, one tick per millisecond
//! const CONFIG: ClockConfig = ClockConfig::core_timer(80_000_000);
//! assert_eq!(CONFIG.tick_cycles(), 40_000);
//! ```

use crate::error::Error;

const MICROS_PER_SECOND: u64 = 1_000_000;
const MILLIS_PER_SECOND: u64 = 1_000;

/// Interrupt priority used unless the configuration overrides it
pub const DEFAULT_PRIORITY: u8 = 2;

/// Constants describing the hardware counter and the tick period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    counter_hz: u32,
    tick_cycles: u32,
    counter_bits: u32,
    priority: u8,
}

impl ClockConfig {
    /// Creates a configuration for a 32-bit counter running at `counter_hz` that interrupts
    /// every `tick_cycles` counts
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid. In a `const` item, this is a compile error.
    pub const fn new(counter_hz: u32, tick_cycles: u32) -> Self {
        match Self::try_new(counter_hz, tick_cycles) {
            Ok(config) => config,
            Err(error) => panic_on(error),
        }
    }

    /// Creates a configuration, returning an error instead of panicking if it is invalid
    pub const fn try_new(counter_hz: u32, tick_cycles: u32) -> Result<Self, Error> {
        Self {
            counter_hz,
            tick_cycles,
            counter_bits: 32,
            priority: DEFAULT_PRIORITY,
        }
        .validate()
    }

    /// Creates a configuration for a counter clocked at `cpu_hz / divider`, with one tick
    /// every `tick_ms` milliseconds
    pub const fn from_cpu_clock(cpu_hz: u32, divider: u32, tick_ms: u32) -> Self {
        if divider == 0 {
            panic_on(Error::ZeroCounterFrequency);
        }
        let counter_hz = cpu_hz / divider;
        let tick_cycles = counter_hz as u64 * tick_ms as u64 / MILLIS_PER_SECOND;
        if tick_cycles > u32::MAX as u64 {
            panic_on(Error::TickExceedsRing);
        }
        Self::new(counter_hz, tick_cycles as u32)
    }

    /// The MIPS core timer layout: the counter runs at half the CPU clock and the interrupt
    /// fires once per millisecond
    pub const fn core_timer(cpu_hz: u32) -> Self {
        Self::from_cpu_clock(cpu_hz, 2, 1)
    }

    /// Returns a copy of this configuration for a counter that wraps after `bits` bits
    ///
    /// # Panics
    ///
    /// Panics if `bits` is not in `1..=32` or the tick no longer fits in the ring.
    pub const fn with_counter_bits(self, bits: u32) -> Self {
        let candidate = Self {
            counter_bits: bits,
            ..self
        };
        match candidate.validate() {
            Ok(config) => config,
            Err(error) => panic_on(error),
        }
    }

    /// Returns a copy of this configuration with a different interrupt priority
    pub const fn with_priority(self, priority: u8) -> Self {
        Self { priority, ..self }
    }

    const fn validate(self) -> Result<Self, Error> {
        if self.counter_hz == 0 {
            return Err(Error::ZeroCounterFrequency);
        }
        if self.tick_cycles == 0 {
            return Err(Error::ZeroTickRate);
        }
        if self.counter_bits == 0 || self.counter_bits > 32 {
            return Err(Error::InvalidCounterWidth);
        }
        if self.tick_cycles > self.mask() {
            return Err(Error::TickExceedsRing);
        }
        let tick_millicycles = self.tick_cycles as u64 * MILLIS_PER_SECOND;
        if tick_millicycles % self.counter_hz as u64 != 0 {
            return Err(Error::FractionalTick);
        }
        Ok(self)
    }

    pub const fn counter_hz(&self) -> u32 {
        self.counter_hz
    }

    /// Counter cycles between two scheduled interrupts
    pub const fn tick_cycles(&self) -> u32 {
        self.tick_cycles
    }

    pub const fn counter_bits(&self) -> u32 {
        self.counter_bits
    }

    pub const fn priority(&self) -> u8 {
        self.priority
    }

    /// The largest value the counter reaches before wrapping to zero
    pub const fn mask(&self) -> u32 {
        u32::MAX >> (32 - self.counter_bits)
    }

    /// The number of distinct counter values, `mask() + 1`
    pub const fn modulus(&self) -> u64 {
        self.mask() as u64 + 1
    }

    /// Whole milliseconds represented by one tick
    pub const fn millis_per_tick(&self) -> u64 {
        self.tick_cycles as u64 * MILLIS_PER_SECOND / self.counter_hz as u64
    }

    /// Converts a number of counter cycles into whole microseconds, rounding down
    pub const fn cycles_to_micros(&self, cycles: u64) -> u64 {
        cycles * MICROS_PER_SECOND / self.counter_hz as u64
    }
}

const fn panic_on(error: Error) -> ! {
    match error {
        Error::ZeroCounterFrequency => panic!("counter frequency must not be zero"),
        Error::ZeroTickRate => panic!("tick rate must not be zero"),
        Error::InvalidCounterWidth => panic!("counter width must be between 1 and 32 bits"),
        Error::TickExceedsRing => panic!("tick period does not fit in the counter"),
        Error::FractionalTick => panic!("tick period must be a whole number of milliseconds"),
        Error::AlreadyRunning | Error::NotRunning => panic!("invalid clock configuration"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_timer_preset() {
        let config = ClockConfig::core_timer(80_000_000);
        assert_eq!(config.counter_hz(), 40_000_000);
        assert_eq!(config.tick_cycles(), 40_000);
        assert_eq!(config.millis_per_tick(), 1);
        assert_eq!(config.mask(), u32::MAX);
        assert_eq!(config.modulus(), 1 << 32);
        assert_eq!(config.priority(), DEFAULT_PRIORITY);
        // 40 cycles per microsecond
        assert_eq!(config.cycles_to_micros(40), 1);
        assert_eq!(config.cycles_to_micros(79), 1);
    }

    #[test]
    fn multi_millisecond_tick() {
        // 64 cycles per microsecond, 4000 microseconds per tick
        let config = ClockConfig::new(64_000_000, 256_000);
        assert_eq!(config.millis_per_tick(), 4);
        assert_eq!(config.cycles_to_micros(256_000), 4_000);
    }

    #[test]
    fn narrow_counter() {
        let config = ClockConfig::new(1_000_000, 1_000).with_counter_bits(16);
        assert_eq!(config.mask(), 0xFFFF);
        assert_eq!(config.modulus(), 0x1_0000);
    }

    #[test]
    fn rejects_misconfiguration() {
        assert_eq!(ClockConfig::try_new(0, 1), Err(Error::ZeroCounterFrequency));
        assert_eq!(ClockConfig::try_new(1_000_000, 0), Err(Error::ZeroTickRate));
        assert_eq!(ClockConfig::try_new(1_000_000, 1_500), Err(Error::FractionalTick));
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn tick_must_fit_in_ring() {
        let _ = ClockConfig::new(1_000_000, 100_000).with_counter_bits(16);
    }

    #[test]
    #[should_panic(expected = "between 1 and 32")]
    fn counter_width_is_checked() {
        let _ = ClockConfig::new(1_000_000, 1_000).with_counter_bits(33);
    }

    #[test]
    fn priority_override() {
        let config = ClockConfig::core_timer(80_000_000).with_priority(5);
        assert_eq!(config.priority(), 5);
        assert_eq!(config.tick_cycles(), 40_000);
    }
}
