//! Keypad scanning for a 4x4 matrix wired to a PCA9555 I/O expander.
//!
//! The expander sits on the AVR TWI bus. Rows are driven from IO1_0..IO1_3,
//! columns are read back on IO1_4..IO1_7 (pulled high, low on contact).
//!
//! This crate is `no_std`-compatible so it can be used by both the AVR
//! firmware and the native bench tool.

#![cfg_attr(not(test), no_std)]

/// Forwards to `defmt` when the `defmt` feature is enabled, otherwise expands
/// to nothing.
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt")]
        defmt::trace!($($arg)*);
    };
}

pub mod keymap;
pub mod keypad;
pub mod pca9555;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod twi;

pub use keymap::translate;
pub use keypad::Scanner;
pub use pca9555::{Pca9555, Register};
pub use twi::{Direction, TwiConfig, TwiError, TwiMaster, TwiRegisters};
