//! 48-key matrix keyboard (§4.9).
//!
//! The matrix is scanned by driving a row-select line low on the address
//! bus and reading back the active-low column bits. Row/column assignment
//! is fixed in hardware; Shift and Ctrl are synthesized onto two matrix
//! positions so punctuation keys that require a modifier can be delivered
//! as a single logical key-down.

use std::collections::BTreeSet;

/// How a logical key maps onto the physical Shift/Ctrl matrix positions.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Modifier {
    None,
    Ctrl,
    Shift,
    CtrlShift,
    /// Toggle Shift on press rather than holding it for the duration of the key.
    ShiftSwap,
}

/// Matrix position of the synthetic Shift/Ctrl lines, `row * 12 + col`.
const KEY_SHIFT: u8 = 36;
const KEY_CTRL: u8 = 24;

pub struct Keyboard {
    keys: BTreeSet<u8>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self { keys: BTreeSet::new() }
    }

    pub fn key_down(&mut self, row: u8, col: u8, modifier: Modifier) {
        match modifier {
            Modifier::None => {}
            Modifier::Shift => {
                self.keys.insert(KEY_SHIFT);
                self.keys.remove(&KEY_CTRL);
            }
            Modifier::Ctrl => {
                self.keys.remove(&KEY_SHIFT);
                self.keys.insert(KEY_CTRL);
            }
            Modifier::CtrlShift => {
                self.keys.insert(KEY_SHIFT);
                self.keys.insert(KEY_CTRL);
            }
            Modifier::ShiftSwap => {
                if self.keys.contains(&KEY_SHIFT) {
                    self.keys.remove(&KEY_SHIFT);
                } else {
                    self.keys.insert(KEY_SHIFT);
                }
            }
        }
        self.keys.insert(row * 12 + col);
    }

    pub fn key_up(&mut self, row: u8, col: u8, modifier: Modifier) {
        if modifier != Modifier::None {
            self.keys.remove(&KEY_SHIFT);
            self.keys.remove(&KEY_CTRL);
        }
        self.keys.remove(&(row * 12 + col));
    }

    /// Scan the matrix with `port` (the IO address bus, row-select lines on
    /// bits 8-15) and return the active-low column readback in the low 6 bits.
    pub fn read(&self, port: u16) -> u8 {
        let mut result: u8 = 0x3F;
        for &key in &self.keys {
            let row = key / 12;
            let col = key % 12;
            if col >= 6 {
                if (port >> (row as u16 + 12)) & 0x01 == 0 {
                    result &= !(0x01 << (col - 6));
                }
            } else if (port >> (11 - row as u16)) & 0x01 == 0 {
                result &= !(0x20 >> col);
            }
        }
        result
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_matrix_reads_all_high() {
        let kb = Keyboard::new();
        assert_eq!(kb.read(0xFFFF), 0x3F);
    }

    #[test]
    fn left_side_key_pulls_its_column_bit_low() {
        let mut kb = Keyboard::new();
        kb.key_down(0, 1, Modifier::None); // '1', row 0 col 1
        let port = !(1u16 << 11); // select row 0 (bit 11-0=11)
        let result = kb.read(port);
        assert_eq!(result & 0x10, 0); // 0x20 >> col(1) == 0x10
    }

    #[test]
    fn right_side_key_pulls_its_column_bit_low() {
        let mut kb = Keyboard::new();
        kb.key_down(0, 11, Modifier::None); // Del, row 0 col 11 -> right side col-6=5
        let port = !(1u16 << 12); // select row 0 on right side (row+12=12)
        let result = kb.read(port);
        assert_eq!(result & (0x01 << 5), 0);
    }

    #[test]
    fn shift_modifier_sets_synthetic_shift_position() {
        let mut kb = Keyboard::new();
        kb.key_down(1, 11, Modifier::Shift); // ';' synthesized as shift+row1col11
        assert!(kb.keys.contains(&KEY_SHIFT));
        assert!(kb.keys.contains(&(1 * 12 + 11)));
    }

    #[test]
    fn key_up_clears_modifier_and_matrix_position() {
        let mut kb = Keyboard::new();
        kb.key_down(2, 7, Modifier::Ctrl); // '<' synthesized as ctrl+row2col7
        kb.key_up(2, 7, Modifier::Ctrl);
        assert!(!kb.keys.contains(&KEY_CTRL));
        assert!(!kb.keys.contains(&(2 * 12 + 7)));
    }

    #[test]
    fn shift_swap_toggles_rather_than_sets() {
        let mut kb = Keyboard::new();
        kb.key_down(0, 0, Modifier::ShiftSwap);
        assert!(kb.keys.contains(&KEY_SHIFT));
        kb.key_down(0, 0, Modifier::ShiftSwap);
        assert!(!kb.keys.contains(&KEY_SHIFT));
    }
}
