//! Software model of the TWI peripheral with a PCA9555 on the bus.
//!
//! Operations complete as soon as they are started, so TWINT is already set
//! when the driver first polls it. The model can be told to NACK address
//! phases (busy peripheral), lose arbitration on a start condition, or NACK
//! data bytes.
//!
//! Two wirings are available. [`SimTwi::new`] treats all eight registers as
//! plain storage. [`SimTwi::with_keypad`] models the keypad on port 1: input
//! registers reflect pin levels, and a column pin reads low when its key is
//! held in a row line that is configured as an output and driven low.
//!
//! Keypad frames use the scan packing: bit `4 * line + column`, 0 = held,
//! where `line` is the expander pin IO1_line driving that row. The physical
//! top row (1 2 3 A) is on line 3. Each frame covers one full scan, i.e. four
//! reads of `Input1`; the last frame is held once the list runs out.

use embedded_hal::delay::DelayNs;

use crate::pca9555::Register;
use crate::twi::{status, Prescaler, TwiRegisters, TWEA, TWEN, TWINT, TWSTA, TWSTO};

/// PCA9555 power-on register values.
const POWER_ON: [u8; 8] = [0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF];

/// Counters for everything that happened on the simulated bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusStats {
    pub starts: u32,
    /// Start conditions issued while the bus was still held.
    pub repeated_starts: u32,
    pub stops: u32,
    pub address_nacks: u32,
    pub data_nacks: u32,
    pub bytes_written: u32,
    pub bytes_read: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    AddressNacked,
    Transmit,
    Receive,
}

#[derive(Clone, Copy, Debug)]
enum Wiring<'a> {
    RegisterFile,
    Keypad { frames: &'a [u16], column_reads: usize },
}

pub struct SimTwi<'a> {
    address: u8,
    control: u8,
    status: u8,
    data: u8,
    phase: Phase,
    pointer: u8,
    pointer_pending: bool,
    registers: [u8; 8],
    wiring: Wiring<'a>,
    busy: u32,
    collisions: u32,
    data_nacks: u32,
    bit_rate: Option<(u8, Prescaler)>,
    last_read_acked: Option<bool>,
    stats: BusStats,
}

impl<'a> SimTwi<'a> {
    /// Expander whose registers are plain storage.
    pub fn new(address: u8) -> Self {
        Self::with_wiring(address, Wiring::RegisterFile)
    }

    /// Expander with the keypad wired to port 1.
    pub fn with_keypad(address: u8, frames: &'a [u16]) -> Self {
        Self::with_wiring(
            address,
            Wiring::Keypad {
                frames,
                column_reads: 0,
            },
        )
    }

    fn with_wiring(address: u8, wiring: Wiring<'a>) -> Self {
        Self {
            address,
            control: 0,
            status: status::NO_INFO,
            data: 0,
            phase: Phase::Idle,
            pointer: 0,
            pointer_pending: false,
            registers: POWER_ON,
            wiring,
            busy: 0,
            collisions: 0,
            data_nacks: 0,
            bit_rate: None,
            last_read_acked: None,
            stats: BusStats::default(),
        }
    }

    /// NACK the next `count` address phases aimed at the expander.
    pub fn set_busy(&mut self, count: u32) {
        self.busy = count;
    }

    /// Lose arbitration on the next `count` start conditions.
    pub fn set_collisions(&mut self, count: u32) {
        self.collisions = count;
    }

    /// NACK the next `count` data bytes written by the master.
    pub fn set_data_nacks(&mut self, count: u32) {
        self.data_nacks = count;
    }

    pub fn stats(&self) -> BusStats {
        self.stats
    }

    pub fn bit_rate(&self) -> Option<(u8, Prescaler)> {
        self.bit_rate
    }

    /// Whether the master acknowledged the most recently read byte.
    pub fn last_read_acked(&self) -> Option<bool> {
        self.last_read_acked
    }

    /// No transaction in progress.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Stored register contents, bypassing the pin model.
    pub fn register(&self, register: Register) -> u8 {
        self.registers[usize::from(register.id())]
    }

    /// Completed keypad scans (four column reads each).
    pub fn scans(&self) -> usize {
        match self.wiring {
            Wiring::Keypad { column_reads, .. } => column_reads / 4,
            Wiring::RegisterFile => 0,
        }
    }

    fn current_frame(&self) -> u16 {
        match self.wiring {
            Wiring::Keypad {
                frames,
                column_reads,
            } => frames
                .get(column_reads / 4)
                .or(frames.last())
                .copied()
                .unwrap_or(u16::MAX),
            Wiring::RegisterFile => u16::MAX,
        }
    }

    /// Pin levels of `port` as seen by the input register.
    fn pins(&self, port: usize) -> u8 {
        let output = self.registers[Register::Output0.id() as usize + port];
        let config = self.registers[Register::Configuration0.id() as usize + port];
        // Outputs drive their latch, inputs are pulled high.
        let mut pins = (output & !config) | config;

        if port == 1 {
            let frame = self.current_frame();
            for line in 0..4 {
                let driven_low = config & (1 << line) == 0 && output & (1 << line) == 0;
                if !driven_low {
                    continue;
                }
                let held = !(frame >> (4 * line)) & 0x0F;
                for column in 0..4 {
                    let pin = 1u8 << (4 + column);
                    if held & (1 << column) != 0 && config & pin != 0 {
                        pins &= !pin;
                    }
                }
            }
        }

        pins ^ self.registers[Register::PolarityInversion0.id() as usize + port]
    }

    fn load(&mut self, pointer: u8) -> u8 {
        let index = usize::from(pointer);
        match self.wiring {
            Wiring::Keypad { .. } if index < 2 => {
                let value = self.pins(index);
                if let Wiring::Keypad { column_reads, .. } = &mut self.wiring {
                    if index == 1 {
                        *column_reads += 1;
                    }
                }
                value
            }
            _ => self.registers[index],
        }
    }

    fn store(&mut self, pointer: u8, value: u8) {
        let index = usize::from(pointer);
        if matches!(self.wiring, Wiring::Keypad { .. }) && index < 2 {
            return;
        }
        self.registers[index] = value;
    }

    fn start_condition(&mut self) {
        if self.phase != Phase::Idle {
            self.stats.repeated_starts += 1;
        }
        self.stats.starts += 1;

        if self.collisions > 0 {
            self.collisions -= 1;
            self.status = status::ARB_LOST;
            self.phase = Phase::Idle;
        } else {
            self.status = if self.phase == Phase::Idle {
                status::START
            } else {
                status::REP_START
            };
            self.phase = Phase::Started;
        }
    }

    fn step(&mut self, ack: bool) {
        match self.phase {
            Phase::Started => {
                let read = self.data & 1 != 0;
                let addressed = self.data >> 1 == self.address;
                if addressed && self.busy == 0 {
                    self.status = if read {
                        status::MR_SLA_ACK
                    } else {
                        status::MT_SLA_ACK
                    };
                    self.phase = if read { Phase::Receive } else { Phase::Transmit };
                    self.pointer_pending = !read;
                } else {
                    if addressed {
                        self.busy -= 1;
                    }
                    self.stats.address_nacks += 1;
                    self.status = if read {
                        status::MR_SLA_NACK
                    } else {
                        status::MT_SLA_NACK
                    };
                    self.phase = Phase::AddressNacked;
                }
            }
            Phase::Transmit => {
                self.stats.bytes_written += 1;
                if self.data_nacks > 0 {
                    self.data_nacks -= 1;
                    self.stats.data_nacks += 1;
                    self.status = status::MT_DATA_NACK;
                } else if self.pointer_pending {
                    self.pointer = self.data & 0x07;
                    self.pointer_pending = false;
                    self.status = status::MT_DATA_ACK;
                } else {
                    self.store(self.pointer, self.data);
                    // Consecutive bytes alternate within a register pair.
                    self.pointer ^= 1;
                    self.status = status::MT_DATA_ACK;
                }
            }
            Phase::Receive => {
                self.data = self.load(self.pointer);
                self.pointer ^= 1;
                self.stats.bytes_read += 1;
                self.last_read_acked = Some(ack);
                self.status = if ack {
                    status::MR_DATA_ACK
                } else {
                    status::MR_DATA_NACK
                };
            }
            Phase::Idle | Phase::AddressNacked => {
                self.status = status::NO_INFO;
            }
        }
    }
}

impl TwiRegisters for SimTwi<'_> {
    fn read_control(&self) -> u8 {
        self.control
    }

    fn write_control(&mut self, bits: u8) {
        self.control = bits & !TWINT;
        if bits & TWEN == 0 || bits & TWINT == 0 {
            return;
        }

        if bits & TWSTO != 0 {
            self.stats.stops += 1;
            self.phase = Phase::Idle;
            self.status = status::NO_INFO;
            // Released immediately; TWINT stays clear after a stop.
            self.control &= !TWSTO;
            return;
        }

        if bits & TWSTA != 0 {
            self.start_condition();
        } else {
            self.step(bits & TWEA != 0);
        }
        self.control |= TWINT;
    }

    fn read_status(&self) -> u8 {
        let prescaler = self.bit_rate.map_or(0, |(_, prescaler)| prescaler as u8);
        self.status | prescaler
    }

    fn read_data(&self) -> u8 {
        self.data
    }

    fn write_data(&mut self, byte: u8) {
        self.data = byte;
    }

    fn write_bit_rate(&mut self, twbr: u8, prescaler: Prescaler) {
        self.bit_rate = Some((twbr, prescaler));
    }
}

/// Delay that only advances a virtual clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct VirtualClock {
    elapsed_ns: u64,
    calls: u32,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }

    /// Number of delay requests made.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    fn advance(&mut self, ns: u64) {
        self.elapsed_ns += ns;
        self.calls += 1;
    }
}

impl DelayNs for VirtualClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms) * 1_000_000);
    }
}
