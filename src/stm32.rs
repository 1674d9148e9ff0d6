//! TIM2 as the clock's compare timer
//!
//! TIM2 is a 32-bit timer. It is set up to count freely from 0 to `u32::MAX` at the
//! configured counter frequency, and capture/compare channel 1 provides the tick interrupt.
//!
//! ```ignore
//! const CONFIG: ClockConfig = ClockConfig::new(1_000_000, 1_000);
//! static CLOCK: TimeKeeper<Tim2Counter> = TimeKeeper::new(Tim2Counter::new(), CONFIG);
//!
//! Tim2Counter::configure(dp.TIM2, clocks, &CONFIG);
//! CLOCK.start();
//! ```

use cortex_m::peripheral::NVIC;
use stm32f4xx_hal::pac::{Interrupt, TIM2};
use stm32f4xx_hal::rcc::Clocks;

use crate::config::ClockConfig;
use crate::hw::CompareTimer;

/// Number of priority bits implemented by the NVIC on STM32F4 parts
const NVIC_PRIO_BITS: u8 = 4;

/// Capture/compare 1 interrupt flag in TIMx_SR
const SR_CC1IF: u32 = 1 << 1;

/// Register access to TIM2
///
/// This handle can be created in a `const` context, but it does nothing useful until
/// [`Tim2Counter::configure`] has been given the TIM2 peripheral.
pub struct Tim2Counter(());

impl Tim2Counter {
    pub const fn new() -> Self {
        Tim2Counter(())
    }

    /// Enables and starts TIM2 so that it counts at `config.counter_hz()`
    ///
    /// Taking the peripheral by value makes sure no other code uses the timer.
    ///
    /// # Panics
    ///
    /// Panics if the timer input clock is not an integer multiple of the configured counter
    /// frequency, or is more than 65536 times faster.
    pub fn configure(timer: TIM2, clocks: Clocks, config: &ClockConfig) {
        assert_eq!(
            config.counter_bits(),
            32,
            "TIM2 is a 32-bit counter"
        );
        let frequency_in = enable_timer_clock(clocks);
        let counter_hz = config.counter_hz();

        assert!(
            frequency_in % counter_hz == 0,
            "Timer 2 input clock is not a multiple of the counter frequency"
        );
        let prescaler = frequency_in / counter_hz;
        assert!(prescaler > 0, "Clock input to timer 2 is too slow");
        let prescaler_bits: u16 = (prescaler - 1)
            .try_into()
            .expect("Clock input to timer 2 is too fast");
        timer.psc.write(|w| w.psc().bits(prescaler_bits));

        // Count through the whole 32-bit range
        timer.arr.write(|w| unsafe { w.bits(u32::MAX) });

        // Trigger update event to load the registers
        timer.cr1.modify(|_, w| w.urs().set_bit());
        timer.egr.write(|w| w.ug().set_bit());
        timer.cr1.modify(|_, w| w.urs().clear_bit());

        timer.cnt.write(|w| unsafe { w.bits(0) });
        timer.cr1.modify(|_, w| w.cen().set_bit());

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "TIM2 running at {=u32} Hz, prescaler {=u32}",
            counter_hz,
            prescaler
        );
    }

    fn registers(&self) -> &'static stm32f4xx_hal::pac::tim2::RegisterBlock {
        // Safety explanation:
        // configure() took ownership of TIM2, so no other code can access the timer. The clock
        // uses CNT, CCR1, SR.CC1IF and DIER.CC1IE; CNT and CCR1 are read from normal code and
        // written only from the interrupt or before it is enabled.
        unsafe { &*TIM2::ptr() }
    }
}

impl CompareTimer for Tim2Counter {
    fn counter(&self) -> u32 {
        self.registers().cnt.read().bits()
    }

    fn set_compare(&self, target: u32) {
        self.registers().ccr1.write(|w| unsafe { w.bits(target) });
    }

    fn advance_compare(&self, cycles: u32) {
        let ccr1 = &self.registers().ccr1;
        let target = ccr1.read().bits().wrapping_add(cycles);
        ccr1.write(|w| unsafe { w.bits(target) });
    }

    fn clear_interrupt(&self) {
        // SR flags are cleared by writing 0 and unaffected by writing 1
        self.registers()
            .sr
            .write(|w| unsafe { w.bits(0xFFFF & !SR_CC1IF) });
    }

    fn enable_interrupt(&self, priority: u8) {
        self.registers().dier.modify(|_, w| w.cc1ie().set_bit());
        unsafe {
            let mut peripherals = cortex_m::Peripherals::steal();
            peripherals
                .NVIC
                .set_priority(Interrupt::TIM2, priority << (8 - NVIC_PRIO_BITS));
            NVIC::unmask(Interrupt::TIM2);
        }
    }
}

/// Enables the clock for the timer and returns its frequency in Hertz
fn enable_timer_clock(clocks: Clocks) -> u32 {
    unsafe {
        use stm32f4xx_hal::bb;
        use stm32f4xx_hal::pac::RCC;
        let rcc = &*RCC::ptr();
        bb::set(&rcc.apb1enr, 0);
        cortex_m::asm::dsb();
        bb::set(&rcc.apb1rstr, 0);
        bb::clear(&rcc.apb1rstr, 0);
    }
    let pclk_mul = if clocks.ppre1() == 1 { 1 } else { 2 };
    clocks.pclk1().raw() * pclk_mul
}
