//! PCA9555 register access.
//!
//! Each call is one complete bus transaction: the register index is written
//! first, then either the value (write) or a repeated start and a single
//! non-acknowledged read (read). The stop condition is always issued, so a
//! failed byte never leaves the bus held.

use crate::twi::{Direction, TwiError, TwiMaster, TwiRegisters};

/// PCA9555 I2C address (A0 = A1 = A2 = 0).
pub const PCA9555_ADDRESS: u8 = 0x20;

/// PCA9555 command bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    Input0 = 0,
    Input1 = 1,
    Output0 = 2,
    Output1 = 3,
    PolarityInversion0 = 4,
    PolarityInversion1 = 5,
    Configuration0 = 6,
    Configuration1 = 7,
}

impl Register {
    pub const ALL: [Register; 8] = [
        Self::Input0,
        Self::Input1,
        Self::Output0,
        Self::Output1,
        Self::PolarityInversion0,
        Self::PolarityInversion1,
        Self::Configuration0,
        Self::Configuration1,
    ];

    pub const fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Input registers ignore writes.
    pub const fn is_input(self) -> bool {
        matches!(self, Self::Input0 | Self::Input1)
    }
}

pub struct Pca9555<R> {
    bus: TwiMaster<R>,
    address: u8,
}

impl<R: TwiRegisters> Pca9555<R> {
    pub const fn new(bus: TwiMaster<R>) -> Self {
        Self::with_address(bus, PCA9555_ADDRESS)
    }

    pub const fn with_address(bus: TwiMaster<R>, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn bus(&self) -> &TwiMaster<R> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut TwiMaster<R> {
        &mut self.bus
    }

    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), TwiError> {
        self.bus.start_with_retry(self.address, Direction::Write);
        let result = self
            .bus
            .write_byte(register.id())
            .and_then(|()| self.bus.write_byte(value));
        self.bus.stop();
        result
    }

    pub fn read_register(&mut self, register: Register) -> Result<u8, TwiError> {
        self.bus.start_with_retry(self.address, Direction::Write);
        let result = self.bus.write_byte(register.id()).and_then(|()| {
            // Switch to reading without giving up the bus.
            self.bus.repeated_start(self.address, Direction::Read)?;
            Ok(self.bus.read_byte(false))
        });
        self.bus.stop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTwi;

    fn expander<'a>(sim: SimTwi<'a>) -> Pca9555<SimTwi<'a>> {
        Pca9555::new(TwiMaster::new(sim))
    }

    #[test]
    fn test_register_ids() {
        for (id, register) in Register::ALL.iter().enumerate() {
            assert_eq!(usize::from(register.id()), id);
            assert_eq!(Register::from_id(id as u8), Some(*register));
        }
        assert_eq!(Register::from_id(8), None);
    }

    #[test]
    fn test_roundtrip_every_register_and_value() {
        let mut pca = expander(SimTwi::new(PCA9555_ADDRESS));
        for register in Register::ALL {
            for value in 0..=u8::MAX {
                pca.write_register(register, value).unwrap();
                assert_eq!(pca.read_register(register), Ok(value));
            }
        }
        assert!(pca.bus().registers().is_idle());
    }

    #[test]
    fn test_write_transaction_shape() {
        let mut pca = expander(SimTwi::new(PCA9555_ADDRESS));
        pca.write_register(Register::Configuration1, 0xF0).unwrap();

        let sim = pca.bus().registers();
        assert_eq!(sim.register(Register::Configuration1), 0xF0);
        assert_eq!(sim.register(Register::Configuration0), 0xFF);
        let stats = sim.stats();
        assert_eq!(stats.starts, 1);
        assert_eq!(stats.stops, 1);
        assert_eq!(stats.bytes_written, 2);
        assert!(sim.is_idle());
    }

    #[test]
    fn test_read_uses_repeated_start() {
        let mut pca = expander(SimTwi::new(PCA9555_ADDRESS));
        assert_eq!(pca.read_register(Register::PolarityInversion0), Ok(0x00));

        let sim = pca.bus().registers();
        let stats = sim.stats();
        assert_eq!(stats.starts, 2);
        assert_eq!(stats.repeated_starts, 1);
        assert_eq!(stats.stops, 1);
        assert_eq!(stats.bytes_read, 1);
        assert_eq!(sim.last_read_acked(), Some(false));
    }

    #[test]
    fn test_busy_peripheral_is_retried() {
        let mut sim = SimTwi::new(PCA9555_ADDRESS);
        sim.set_busy(2);
        let mut pca = expander(sim);

        pca.write_register(Register::Output0, 0x5A).unwrap();
        assert_eq!(pca.read_register(Register::Output0), Ok(0x5A));
        assert_eq!(pca.bus().registers().stats().address_nacks, 2);
    }

    #[test]
    fn test_data_nack_releases_bus() {
        let mut sim = SimTwi::new(PCA9555_ADDRESS);
        sim.set_data_nacks(1);
        let mut pca = expander(sim);

        assert!(matches!(
            pca.write_register(Register::Output0, 0x12),
            Err(TwiError::DataNack(_))
        ));
        assert!(pca.bus().registers().is_idle());
        // The value byte was never sent.
        assert_eq!(pca.bus().registers().register(Register::Output0), 0xFF);

        pca.bus_mut().registers_mut().set_data_nacks(1);
        assert!(pca.read_register(Register::Output0).is_err());
        assert!(pca.bus().registers().is_idle());
        assert_eq!(pca.bus().registers().stats().bytes_read, 0);

        pca.write_register(Register::Output0, 0x12).unwrap();
        assert_eq!(pca.read_register(Register::Output0), Ok(0x12));
    }

    #[test]
    fn test_input_registers_are_read_only_on_keypad_wiring() {
        let frames = [0xFFFF];
        let mut pca = expander(SimTwi::with_keypad(PCA9555_ADDRESS, &frames));
        pca.write_register(Register::Input1, 0x00).unwrap();
        assert_eq!(pca.read_register(Register::Input1), Ok(0xFF));
        assert!(Register::Input1.is_input());
        assert!(!Register::Output1.is_input());
    }
}
