//! Key labels for the 4x4 membrane keypad.
//!
//! Scan masks are active low: bit `4 * line + column` is 0 while that key is
//! held. Expander line 3 drives the physical top row, so the top row ends up
//! in the most significant nibble.

/// Label of each bit in a scan mask, bit 0 first.
pub const KEYMAP: [char; 16] = [
    '*', '0', '#', 'D', //
    '7', '8', '9', 'C', //
    '4', '5', '6', 'B', //
    '1', '2', '3', 'A',
];

/// Physical layout, top row first.
pub const LAYOUT: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Mask bit of the key at physical `row` (0 = top) and `col` (0 = left).
pub const fn bit_for(row: usize, col: usize) -> u32 {
    (4 * (3 - row) + col) as u32
}

/// Index of the single held key, if exactly one key is held.
fn single_bit(mask: u16) -> Option<usize> {
    if mask.count_zeros() != 1 {
        return None;
    }
    Some((!mask).trailing_zeros() as usize)
}

/// Label of the only held key in `mask`. `None` when no key or more than one
/// key is held.
pub fn translate(mask: u16) -> Option<char> {
    single_bit(mask).map(|bit| KEYMAP[bit])
}

/// Physical (row, col) of the only held key in `mask`.
pub fn position(mask: u16) -> Option<(usize, usize)> {
    single_bit(mask).map(|bit| (3 - bit / 4, bit % 4))
}

/// Scan mask with only `label` held.
pub fn mask_for(label: char) -> Option<u16> {
    let label = label.to_ascii_uppercase();
    KEYMAP
        .iter()
        .position(|&key| key == label)
        .map(|bit| !(1u16 << bit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_only_singletons() {
        for mask in 0..=u16::MAX {
            assert_eq!(
                translate(mask).is_some(),
                mask.count_zeros() == 1,
                "mask {:#06X}",
                mask
            );
        }
    }

    #[test]
    fn test_translate_labels() {
        assert_eq!(translate(0b1111_1111_1111_1110), Some('*'));
        assert_eq!(translate(0b1111_1111_1111_0111), Some('D'));
        assert_eq!(translate(0b1111_1111_1110_1111), Some('7'));
        assert_eq!(translate(0b1111_1101_1111_1111), Some('5'));
        assert_eq!(translate(0b1110_1111_1111_1111), Some('1'));
        assert_eq!(translate(0b0111_1111_1111_1111), Some('A'));
        assert_eq!(translate(0xFFFF), None);
        assert_eq!(translate(0x0000), None);
        assert_eq!(translate(0b1111_1111_1111_1100), None);
    }

    #[test]
    fn test_layout_matches_bits() {
        for (row, keys) in LAYOUT.iter().enumerate() {
            for (col, &label) in keys.iter().enumerate() {
                let mask = !(1u16 << bit_for(row, col));
                assert_eq!(translate(mask), Some(label));
                assert_eq!(position(mask), Some((row, col)));
                assert_eq!(mask_for(label), Some(mask));
            }
        }
    }

    #[test]
    fn test_mask_for_unknown() {
        assert_eq!(mask_for('a'), mask_for('A'));
        assert_eq!(mask_for('E'), None);
        assert_eq!(mask_for(' '), None);
    }
}
