//! Transmit-only USART0 used for diagnostics.

use core::convert::Infallible;

use avr_device::atmega328pb::USART0;

/// UCSR0A: data register empty.
const UDRE0: u8 = 1 << 5;
/// UCSR0B: transmitter enable.
const TXEN0: u8 = 1 << 3;
/// UCSR0C: asynchronous, no parity, 1 stop bit, 8 data bits.
const FRAME_8N1: u8 = 0b0000_0110;

pub struct Serial {
    usart: USART0,
}

impl Serial {
    /// Baud rate = CPU_FREQ / (16 * (UBRR + 1))
    pub fn new(usart: USART0, cpu_hz: u32, baud: u32) -> Self {
        let ubrr = (cpu_hz / (16 * baud)).saturating_sub(1) as u16;
        usart.ubrr0.write(|w| unsafe { w.bits(ubrr) });
        usart.ucsr0b.write(|w| unsafe { w.bits(TXEN0) });
        usart.ucsr0c.write(|w| unsafe { w.bits(FRAME_8N1) });
        Self { usart }
    }

    pub fn write_byte(&mut self, byte: u8) {
        while self.usart.ucsr0a.read().bits() & UDRE0 == 0 {}
        self.usart.udr0.write(|w| unsafe { w.bits(byte) });
    }
}

impl ufmt::uWrite for Serial {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}
