//! TWI0 register access for the keypad driver.
//!
//! The bus protocol itself lives in `keypad_core::twi`; this is only the
//! mapping onto the ATmega328PB TWCR0/TWSR0/TWDR0/TWBR0 registers.

use avr_device::atmega328pb::TWI0;
use keypad_core::twi::{Prescaler, TwiRegisters};

pub struct Twi0 {
    twi: TWI0,
}

impl Twi0 {
    pub fn new(twi: TWI0) -> Self {
        Self { twi }
    }
}

impl TwiRegisters for Twi0 {
    fn read_control(&self) -> u8 {
        self.twi.twcr.read().bits()
    }

    fn write_control(&mut self, bits: u8) {
        self.twi.twcr.write(|w| unsafe { w.bits(bits) });
    }

    fn read_status(&self) -> u8 {
        self.twi.twsr.read().bits()
    }

    fn read_data(&self) -> u8 {
        self.twi.twdr.read().bits()
    }

    fn write_data(&mut self, byte: u8) {
        self.twi.twdr.write(|w| unsafe { w.bits(byte) });
    }

    fn write_bit_rate(&mut self, twbr: u8, prescaler: Prescaler) {
        self.twi.twbr.write(|w| unsafe { w.bits(twbr) });
        // TWPS occupies the low two bits; the status bits are read-only.
        self.twi.twsr.write(|w| unsafe { w.bits(prescaler as u8) });
    }
}
