#![no_std]
#![no_main]

extern crate coretimer_clock;
extern crate cortex_m;
extern crate cortex_m_rt;
extern crate panic_rtt_target;
extern crate rtt_target;
extern crate stm32f4xx_hal;

use coretimer_clock::stm32::Tim2Counter;
use coretimer_clock::{ClockConfig, TimeKeeper};
use cortex_m_rt::entry;
use stm32f4xx_hal::interrupt;
use stm32f4xx_hal::rcc::RccExt;

/// 1 MHz counter, one tick per millisecond
const CONFIG: ClockConfig = ClockConfig::new(1_000_000, 1_000);

static CLOCK: TimeKeeper<Tim2Counter> = TimeKeeper::new(Tim2Counter::new(), CONFIG);

#[entry]
fn main() -> ! {
    rtt_target::rtt_init_print!();
    let dp = stm32f4xx_hal::pac::Peripherals::take().unwrap();

    let clocks = dp.RCC.constrain().cfgr.freeze();

    Tim2Counter::configure(dp.TIM2, clocks, &CONFIG);
    CLOCK.start();

    loop {
        CLOCK.delay_millis(1000);
        rtt_target::rprintln!(
            "Current time: {} ms, {} microseconds",
            CLOCK.now_millis(),
            CLOCK.now_micros()
        );
    }
}

// Reminder: As explained in the library documentation, if you use any other interrupts that
// read CLOCK, they must have lower priority than this timer interrupt.
#[interrupt]
fn TIM2() {
    CLOCK.handle_interrupt();
}
