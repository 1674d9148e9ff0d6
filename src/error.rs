use thiserror_no_std::Error;

/// Errors reported while configuring or wiring up the clock
///
/// The timer interrupt and the time queries never fail; every variant here describes a
/// mistake made before the clock starts running.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("counter frequency must not be zero")]
    ZeroCounterFrequency,
    #[error("tick rate must not be zero")]
    ZeroTickRate,
    #[error("counter width must be between 1 and 32 bits")]
    InvalidCounterWidth,
    /// One tick is longer than a full wrap of the counter
    #[error("tick period does not fit in the counter")]
    TickExceedsRing,
    /// The tick period is not a whole number of milliseconds
    #[error("tick period must be a whole number of milliseconds")]
    FractionalTick,
    /// The operation is only allowed before the timer interrupt is enabled
    #[error("clock is already running")]
    AlreadyRunning,
    /// The clock has not been started
    #[error("clock is not running")]
    NotRunning,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::ZeroCounterFrequency => defmt::write!(fmt, "zero counter frequency"),
            Self::ZeroTickRate => defmt::write!(fmt, "zero tick rate"),
            Self::InvalidCounterWidth => defmt::write!(fmt, "invalid counter width"),
            Self::TickExceedsRing => defmt::write!(fmt, "tick exceeds counter ring"),
            Self::FractionalTick => defmt::write!(fmt, "fractional millisecond tick"),
            Self::AlreadyRunning => defmt::write!(fmt, "already running"),
            Self::NotRunning => defmt::write!(fmt, "not running"),
        }
    }
}
