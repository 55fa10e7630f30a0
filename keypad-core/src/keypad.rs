//! Matrix scanning and rising-edge detection.
//!
//! A row is selected by driving its expander line low; held keys in that row
//! pull their column lines low. A full scan visits lines 3, 2, 1, 0 and packs
//! each 4-bit column reading below the previous one, so line 3 ends up in the
//! top nibble. All masks are active low: 0 = held, 1 = released.

use embedded_hal::delay::DelayNs;

use crate::keymap;
use crate::pca9555::{Pca9555, Register};
use crate::twi::{TwiError, TwiRegisters};

/// Time between the two samples of a debounced scan.
pub const DEBOUNCE_MS: u32 = 20;

/// Scan mask with nothing held.
pub const RELEASED: u16 = 0xFFFF;

const ROWS: u8 = 4;

/// Port 1 direction: IO1_0..IO1_3 (rows) outputs, IO1_4..IO1_7 (columns) inputs.
const PORT1_DIRECTION: u8 = 0b1111_0000;

/// No row selected.
const ROWS_IDLE: u8 = 0xFF;

pub struct Scanner<R, D> {
    expander: Pca9555<R>,
    delay: D,
    /// Last debounced scan; only [`Scanner::scan_keypad_rising_edge`] writes it.
    pressed: u16,
}

impl<R: TwiRegisters, D: DelayNs> Scanner<R, D> {
    pub const fn new(expander: Pca9555<R>, delay: D) -> Self {
        Self {
            expander,
            delay,
            pressed: RELEASED,
        }
    }

    /// Configure port 1 for the keypad and deselect every row.
    pub fn init(&mut self) -> Result<(), TwiError> {
        self.expander
            .write_register(Register::Configuration1, PORT1_DIRECTION)?;
        self.expander.write_register(Register::Output1, ROWS_IDLE)
    }

    /// Column reading (4 bits, active low) for expander row line `row`.
    ///
    /// Bus failures are not fatal: a row that could not be selected or read
    /// reads as released.
    pub fn scan_row(&mut self, row: u8) -> u8 {
        debug_assert!(row < ROWS);
        let _ = self.expander.write_register(Register::Output1, !(1 << row));
        let columns = self
            .expander
            .read_register(Register::Input1)
            .map_or(0x0F, |pins| pins >> 4);
        let _ = self.expander.write_register(Register::Output1, ROWS_IDLE);
        columns
    }

    /// Current state of the whole keypad.
    pub fn scan_keypad(&mut self) -> u16 {
        (0..ROWS)
            .rev()
            .fold(0, |keys, row| (keys << 4) | u16::from(self.scan_row(row)))
    }

    /// Keys that went from released to held since the previous call.
    ///
    /// The keypad is sampled twice, [`DEBOUNCE_MS`] apart, and a key counts
    /// as held only if both samples agree. The result has a 0 for each newly
    /// held key, so it can be fed to [`keymap::translate`] like a raw scan.
    pub fn scan_keypad_rising_edge(&mut self) -> u16 {
        let first = self.scan_keypad();
        self.delay.delay_ms(DEBOUNCE_MS);
        let second = self.scan_keypad();

        let debounced = first | second;
        let just_pressed = !debounced & self.pressed;
        self.pressed = debounced;

        if just_pressed != 0 {
            trace!("keypad: new keys {=u16:#x}", just_pressed);
        }
        !just_pressed
    }

    /// Label of the single newly held key, if any.
    pub fn read_key(&mut self) -> Option<char> {
        keymap::translate(self.scan_keypad_rising_edge())
    }

    /// Block until no key is held.
    pub fn wait_release(&mut self) {
        while self.scan_keypad() != RELEASED {}
    }

    /// The debounced state recorded by the last rising-edge scan.
    pub fn pressed(&self) -> u16 {
        self.pressed
    }

    pub fn expander(&self) -> &Pca9555<R> {
        &self.expander
    }

    pub fn expander_mut(&mut self) -> &mut Pca9555<R> {
        &mut self.expander
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }

    pub fn release(self) -> (Pca9555<R>, D) {
        (self.expander, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{bit_for, mask_for, LAYOUT};
    use crate::pca9555::PCA9555_ADDRESS;
    use crate::sim::{SimTwi, VirtualClock};
    use crate::twi::TwiMaster;

    fn scanner(frames: &[u16]) -> Scanner<SimTwi<'_>, VirtualClock> {
        let sim = SimTwi::with_keypad(PCA9555_ADDRESS, frames);
        let mut scanner = Scanner::new(Pca9555::new(TwiMaster::new(sim)), VirtualClock::new());
        scanner.init().unwrap();
        scanner
    }

    fn sim<'s, 'a>(scanner: &'s Scanner<SimTwi<'a>, VirtualClock>) -> &'s SimTwi<'a> {
        scanner.expander().bus().registers()
    }

    fn held(labels: &[char]) -> u16 {
        labels
            .iter()
            .map(|&label| mask_for(label).unwrap())
            .fold(RELEASED, |mask, key| mask & key)
    }

    #[test]
    fn test_init_configures_port1() {
        let scanner = scanner(&[]);
        assert_eq!(sim(&scanner).register(Register::Configuration1), 0xF0);
        assert_eq!(sim(&scanner).register(Register::Output1), 0xFF);
        assert_eq!(scanner.pressed(), RELEASED);
    }

    #[test]
    fn test_scan_row_selects_one_line() {
        // '6' is on line 2, column 2.
        let frames = [held(&['6'])];
        let mut scanner = scanner(&frames);

        assert_eq!(scanner.scan_row(2), 0b1011);
        assert_eq!(scanner.scan_row(1), 0b1111);
        assert_eq!(scanner.scan_row(3), 0b1111);
        // Rows are deselected between scans.
        assert_eq!(sim(&scanner).register(Register::Output1), ROWS_IDLE);
        let stats = sim(&scanner).stats();
        assert_eq!(stats.bytes_read, 3);
        assert!(sim(&scanner).is_idle());
    }

    #[test]
    fn test_scan_bit_packing() {
        for row in 0..4 {
            for col in 0..4 {
                let line = 3 - row;
                let frames = [!(1u16 << (4 * line + col))];
                let mut scanner = scanner(&frames);

                let mask = scanner.scan_keypad();
                assert_eq!(mask, !(1u16 << (4 * (3 - row) + col)), "row {} col {}", row, col);
                assert_eq!(u32::from(mask.trailing_ones()), bit_for(row, col));
                assert_eq!(keymap::translate(mask), Some(LAYOUT[row][col]));
            }
        }
    }

    #[test]
    fn test_scan_without_init_sees_nothing() {
        let frames = [held(&['5'])];
        let sim = SimTwi::with_keypad(PCA9555_ADDRESS, &frames);
        let mut scanner = Scanner::new(Pca9555::new(TwiMaster::new(sim)), VirtualClock::new());
        assert_eq!(scanner.scan_keypad(), RELEASED);
    }

    #[test]
    fn test_multiple_keys_in_one_scan() {
        let frames = [held(&['1', 'D', '5'])];
        let mut scanner = scanner(&frames);
        let mask = scanner.scan_keypad();
        assert_eq!(mask.count_zeros(), 3);
        assert_eq!(mask, held(&['1', 'D', '5']));
        assert_eq!(keymap::translate(mask), None);
    }

    #[test]
    fn test_rising_edge_reports_new_key() {
        let frames = [held(&['8']), held(&['8'])];
        let mut scanner = scanner(&frames);

        let edges = scanner.scan_keypad_rising_edge();
        assert_eq!(keymap::translate(edges), Some('8'));
        assert_eq!(scanner.pressed(), held(&['8']));
        assert_eq!(sim(&scanner).scans(), 2);
    }

    #[test]
    fn test_debounce_window_is_waited() {
        let mut scanner = scanner(&[]);
        scanner.scan_keypad_rising_edge();
        assert_eq!(scanner.delay().elapsed_ns(), 20_000_000);
        assert_eq!(scanner.delay().calls(), 1);

        scanner.scan_keypad();
        assert_eq!(scanner.delay().calls(), 1);
    }

    #[test]
    fn test_no_change_reports_nothing() {
        let frames = [held(&['3']); 4];
        let mut scanner = scanner(&frames);

        assert_ne!(scanner.scan_keypad_rising_edge(), RELEASED);
        assert_eq!(scanner.scan_keypad_rising_edge(), RELEASED);
    }

    #[test]
    fn test_held_key_reported_once() {
        let frames = [held(&['#']); 6];
        let mut scanner = scanner(&frames);

        assert_eq!(scanner.read_key(), Some('#'));
        assert_eq!(scanner.scan_keypad_rising_edge(), RELEASED);
        assert_eq!(scanner.scan_keypad_rising_edge(), RELEASED);
        assert_eq!(scanner.pressed(), held(&['#']));
    }

    #[test]
    fn test_bounce_is_rejected() {
        let frames = [held(&['0']), RELEASED, held(&['0']), held(&['0'])];
        let mut scanner = scanner(&frames);

        assert_eq!(scanner.scan_keypad_rising_edge(), RELEASED);
        assert_eq!(scanner.pressed(), RELEASED);
        // Stable on the next call, so it is reported then.
        assert_eq!(scanner.read_key(), Some('0'));
    }

    #[test]
    fn test_release_then_press_again() {
        let frames = [
            held(&['C']),
            held(&['C']),
            RELEASED,
            RELEASED,
            held(&['C']),
            held(&['C']),
        ];
        let mut scanner = scanner(&frames);

        assert_eq!(scanner.read_key(), Some('C'));
        assert_eq!(scanner.scan_keypad_rising_edge(), RELEASED);
        assert_eq!(scanner.pressed(), RELEASED);
        assert_eq!(scanner.read_key(), Some('C'));
    }

    #[test]
    fn test_simultaneous_presses_reported_together() {
        let frames = [held(&['2', '9']); 2];
        let mut scanner = scanner(&frames);

        let edges = scanner.scan_keypad_rising_edge();
        assert_eq!(edges, held(&['2', '9']));
        assert_eq!(keymap::translate(edges), None);
    }

    #[test]
    fn test_second_key_while_first_held() {
        let frames = [
            held(&['4']),
            held(&['4']),
            held(&['4', 'B']),
            held(&['4', 'B']),
        ];
        let mut scanner = scanner(&frames);

        assert_eq!(scanner.read_key(), Some('4'));
        assert_eq!(scanner.read_key(), Some('B'));
    }

    #[test]
    fn test_plain_scans_leave_debounce_state() {
        let frames = [held(&['7']); 3];
        let mut scanner = scanner(&frames);

        scanner.scan_keypad();
        assert_eq!(scanner.pressed(), RELEASED);
        assert_eq!(scanner.read_key(), Some('7'));
    }

    #[test]
    fn test_bus_failures_read_as_released() {
        let frames = [held(&['1'])];
        let mut scanner = scanner(&frames);
        scanner
            .expander_mut()
            .bus_mut()
            .registers_mut()
            .set_data_nacks(u32::MAX);

        assert_eq!(scanner.scan_keypad(), RELEASED);
        assert!(sim(&scanner).is_idle());
    }

    #[test]
    fn test_wait_release() {
        let frames = [held(&['A']), held(&['A']), RELEASED];
        let mut scanner = scanner(&frames);

        scanner.wait_release();
        assert_eq!(sim(&scanner).scans(), 3);
    }
}
