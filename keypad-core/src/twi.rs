//! Blocking TWI (I2C) master driver.
//!
//! Every operation writes the control register and then spins on TWINT until
//! the peripheral reports completion. There are no interrupts and no
//! timeouts: a peripheral that never answers hangs the caller, which is left
//! to the watchdog.

use core::fmt;

/// TWCR: interrupt flag, set by hardware when the current operation is done.
pub const TWINT: u8 = 1 << 7;
/// TWCR: acknowledge the next received byte.
pub const TWEA: u8 = 1 << 6;
/// TWCR: generate a start condition.
pub const TWSTA: u8 = 1 << 5;
/// TWCR: generate a stop condition, cleared by hardware once released.
pub const TWSTO: u8 = 1 << 4;
/// TWCR: peripheral enable.
pub const TWEN: u8 = 1 << 2;

/// TWSR status codes for master transmitter / receiver mode, prescaler bits
/// masked off.
pub mod status {
    pub const START: u8 = 0x08;
    pub const REP_START: u8 = 0x10;
    pub const MT_SLA_ACK: u8 = 0x18;
    pub const MT_SLA_NACK: u8 = 0x20;
    pub const MT_DATA_ACK: u8 = 0x28;
    pub const MT_DATA_NACK: u8 = 0x30;
    pub const ARB_LOST: u8 = 0x38;
    pub const MR_SLA_ACK: u8 = 0x40;
    pub const MR_SLA_NACK: u8 = 0x48;
    pub const MR_DATA_ACK: u8 = 0x50;
    pub const MR_DATA_NACK: u8 = 0x58;
    /// No relevant state information, TWINT = 0.
    pub const NO_INFO: u8 = 0xF8;
}

const STATUS_MASK: u8 = 0xF8;

/// Transfer direction carried in the R/W bit of the address byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// TWSR prescaler field (TWPS1:0).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Prescaler {
    Div1 = 0,
    Div4 = 1,
    Div16 = 2,
    Div64 = 3,
}

impl Prescaler {
    pub const ALL: [Prescaler; 4] = [Self::Div1, Self::Div4, Self::Div16, Self::Div64];

    pub const fn factor(self) -> u32 {
        match self {
            Self::Div1 => 1,
            Self::Div4 => 4,
            Self::Div16 => 16,
            Self::Div64 => 64,
        }
    }
}

/// Register-level access to a TWI peripheral.
///
/// Implemented over the real TWCR/TWSR/TWDR/TWBR registers in the firmware
/// and by [`crate::sim::SimTwi`] on the host.
pub trait TwiRegisters {
    /// Read TWCR.
    fn read_control(&self) -> u8;
    /// Write TWCR. Writing a one to TWINT clears the flag and starts the
    /// operation selected by the other bits.
    fn write_control(&mut self, bits: u8);
    /// Read TWSR, prescaler bits included.
    fn read_status(&self) -> u8;
    /// Read TWDR.
    fn read_data(&self) -> u8;
    /// Write TWDR.
    fn write_data(&mut self, byte: u8);
    /// Program TWBR and the TWSR prescaler bits.
    fn write_bit_rate(&mut self, twbr: u8, prescaler: Prescaler);
}

/// Bus-level failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// The start condition or the address phase did not succeed. The
    /// peripheral is busy or the bus is contended; retrying from a fresh
    /// start condition is expected to succeed eventually.
    Busy(u8),
    /// A data byte was not acknowledged.
    DataNack(u8),
}

impl fmt::Display for TwiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy(status) => write!(f, "bus busy (status 0x{:02X})", status),
            Self::DataNack(status) => write!(f, "data byte not acknowledged (status 0x{:02X})", status),
        }
    }
}

/// SCL clock configuration.
///
/// SCL freq = CPU_FREQ / (16 + 2 * TWBR * prescaler)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TwiConfig {
    pub cpu_hz: u32,
    pub scl_hz: u32,
}

impl Default for TwiConfig {
    /// 100kHz SCL from a 16MHz CPU clock.
    fn default() -> Self {
        Self::new(16_000_000, 100_000)
    }
}

/// TWBR value and prescaler for a requested SCL frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitRate {
    pub twbr: u8,
    pub prescaler: Prescaler,
}

impl BitRate {
    /// The SCL frequency this setting actually produces.
    pub fn scl_hz(&self, cpu_hz: u32) -> u32 {
        cpu_hz / (16 + 2 * u32::from(self.twbr) * self.prescaler.factor())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitRateError {
    ZeroFrequency,
    /// SCL is above CPU_FREQ / 16.
    TooFast,
    /// TWBR overflows even with the largest prescaler.
    TooSlow,
}

impl fmt::Display for BitRateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroFrequency => f.write_str("clock frequencies must be non-zero"),
            Self::TooFast => f.write_str("SCL frequency above CPU_FREQ / 16"),
            Self::TooSlow => f.write_str("SCL frequency too low for TWBR with prescaler 64"),
        }
    }
}

impl TwiConfig {
    pub const fn new(cpu_hz: u32, scl_hz: u32) -> Self {
        Self { cpu_hz, scl_hz }
    }

    /// Pick the smallest prescaler whose TWBR value fits in a byte.
    pub fn bit_rate(&self) -> Result<BitRate, BitRateError> {
        if self.cpu_hz == 0 || self.scl_hz == 0 {
            return Err(BitRateError::ZeroFrequency);
        }
        let ratio = self.cpu_hz / self.scl_hz;
        if ratio < 16 {
            return Err(BitRateError::TooFast);
        }
        let scaled = (ratio - 16) / 2;

        Prescaler::ALL
            .into_iter()
            .find_map(|prescaler| {
                let twbr = scaled / prescaler.factor();
                u8::try_from(twbr).ok().map(|twbr| BitRate { twbr, prescaler })
            })
            .ok_or(BitRateError::TooSlow)
    }
}

/// Master-mode TWI driver.
pub struct TwiMaster<R> {
    regs: R,
}

impl<R: TwiRegisters> TwiMaster<R> {
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Program the bit rate and prescaler.
    pub fn init(&mut self, config: &TwiConfig) -> Result<BitRate, BitRateError> {
        let bit_rate = config.bit_rate()?;
        self.regs.write_bit_rate(bit_rate.twbr, bit_rate.prescaler);
        Ok(bit_rate)
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn release(self) -> R {
        self.regs
    }

    /// Issue a start condition and send the 7-bit `address` with `direction`.
    pub fn start(&mut self, address: u8, direction: Direction) -> Result<(), TwiError> {
        self.regs.write_control(TWINT | TWSTA | TWEN);
        self.wait_twint();
        let code = self.status();
        if code != status::START && code != status::REP_START {
            return Err(TwiError::Busy(code));
        }

        self.regs.write_data((address << 1) | direction as u8);
        self.regs.write_control(TWINT | TWEN);
        self.wait_twint();
        match self.status() {
            status::MT_SLA_ACK | status::MR_SLA_ACK => Ok(()),
            other => Err(TwiError::Busy(other)),
        }
    }

    /// ACK polling: repeat [`start`](Self::start) until the peripheral answers,
    /// releasing the bus between attempts. Returns the number of attempts.
    pub fn start_with_retry(&mut self, address: u8, direction: Direction) -> u32 {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.wrapping_add(1);
            match self.start(address, direction) {
                Ok(()) => return attempts,
                Err(_err) => {
                    trace!("twi: start attempt {} failed: {}", attempts, _err);
                    self.stop();
                }
            }
        }
    }

    /// Same as [`start`](Self::start) but without releasing the bus first.
    pub fn repeated_start(&mut self, address: u8, direction: Direction) -> Result<(), TwiError> {
        self.start(address, direction)
    }

    /// Send one byte to the addressed peripheral.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), TwiError> {
        self.regs.write_data(byte);
        self.regs.write_control(TWINT | TWEN);
        self.wait_twint();
        match self.status() {
            status::MT_DATA_ACK => Ok(()),
            other => Err(TwiError::DataNack(other)),
        }
    }

    /// Read one byte. `send_ack` asks the peripheral for more; the last byte
    /// of a read is not acknowledged.
    pub fn read_byte(&mut self, send_ack: bool) -> u8 {
        let ack = if send_ack { TWEA } else { 0 };
        self.regs.write_control(TWINT | TWEN | ack);
        self.wait_twint();
        self.regs.read_data()
    }

    /// Issue a stop condition and wait until the bus is released.
    pub fn stop(&mut self) {
        self.regs.write_control(TWINT | TWEN | TWSTO);
        while self.regs.read_control() & TWSTO != 0 {
            core::hint::spin_loop();
        }
    }

    fn status(&self) -> u8 {
        self.regs.read_status() & STATUS_MASK
    }

    fn wait_twint(&self) {
        while self.regs.read_control() & TWINT == 0 {
            core::hint::spin_loop();
        }
    }
}
