//! Keypad firmware for ATmega328PB.
//!
//! A 4x4 keypad is wired to port 1 of a PCA9555 on TWI0. The main loop:
//! - scans the keypad with a 20ms debounce window
//! - reports each newly pressed key once over USART0
//! - shows the key's row and column one-hot on the PORTB LEDs

#![no_std]
#![no_main]
#![feature(asm_experimental_arch)]

mod delay;
mod serial;
mod twi;

use avr_device::atmega328pb::Peripherals;
use keypad_core::keymap;
use keypad_core::{Pca9555, Scanner, TwiConfig, TwiMaster};
use ufmt::uwriteln;

use delay::BusyDelay;
use serial::Serial;
use twi::Twi0;

const CPU_HZ: u32 = 16_000_000;
const SCL_HZ: u32 = 100_000;
const BAUD: u32 = 9_600;

/// Nothing to report to on a panic, so park the CPU.
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

/// Main entry point.
#[no_mangle]
pub extern "C" fn main() -> ! {
    let dp = unsafe { Peripherals::steal() };

    // PORTB drives the key LEDs
    dp.PORTB.ddrb.write(|w| unsafe { w.bits(0xFF) });
    dp.PORTB.portb.write(|w| unsafe { w.bits(0x00) });
    let portb = dp.PORTB;

    let mut serial = Serial::new(dp.USART0, CPU_HZ, BAUD);

    let mut bus = TwiMaster::new(Twi0::new(dp.TWI0));
    match bus.init(&TwiConfig::new(CPU_HZ, SCL_HZ)) {
        Ok(bit_rate) => {
            uwriteln!(&mut serial, "twi: TWBR={} TWPS={}\r", bit_rate.twbr, bit_rate.prescaler as u8).ok();
        }
        Err(_) => {
            uwriteln!(&mut serial, "twi: SCL out of range\r").ok();
        }
    }

    let mut scanner = Scanner::new(Pca9555::new(bus), BusyDelay);
    if scanner.init().is_err() {
        // Keep going: scans of an unconfigured expander read as released.
        uwriteln!(&mut serial, "pca9555: configuration failed\r").ok();
    }
    uwriteln!(&mut serial, "keypad ready\r").ok();

    loop {
        let edges = scanner.scan_keypad_rising_edge();
        if edges == keypad_core::keypad::RELEASED {
            continue;
        }

        match (keymap::translate(edges), keymap::position(edges)) {
            (Some(key), Some((row, col))) => {
                portb.portb.write(|w| unsafe { w.bits((1 << row) | (1 << (4 + col))) });
                let mut buf = [0u8; 4];
                let label: &str = key.encode_utf8(&mut buf);
                uwriteln!(&mut serial, "key {}\r", label).ok();
            }
            _ => {
                // Several keys in the same window.
                uwriteln!(&mut serial, "keys {}\r", edges.count_zeros()).ok();
            }
        }
    }
}
