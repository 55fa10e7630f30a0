//! Busy-wait delays calibrated for a 16MHz CPU clock.

use embedded_hal::delay::DelayNs;

/// Spins on `nop`s. Interrupts stretch the delay; nothing here enables them.
pub struct BusyDelay;

impl DelayNs for BusyDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_us(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        // ~1us at 16MHz: 16 cycles / 4 cycles per loop iteration
        for _ in 0..us {
            for _ in 0..4u8 {
                unsafe { core::arch::asm!("nop") };
            }
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        // ~1ms at 16MHz: 16000 cycles / 4 cycles per loop iteration
        for _ in 0..ms {
            for _ in 0..4000u16 {
                unsafe { core::arch::asm!("nop") };
            }
        }
    }
}
