use std::collections::HashMap;

use sdl2::keyboard::Scancode;

/// Maps SDL scancodes onto matrix positions (`row * 12 + col`, per
/// [`beastem::keyboard`]) the way the physical Beast keyboard overlay is
/// silk-screened: top-to-bottom QWERTY rows, Ctrl and Shift on the home
/// row, arrows and Space on the bottom row.
pub struct KeyMap {
    map: HashMap<Scancode, u8>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn bind(&mut self, scancode: Scancode, matrix_position: u8) {
        self.map.insert(scancode, matrix_position);
    }

    pub fn get(&self, scancode: Scancode) -> Option<u8> {
        self.map.get(&scancode).copied()
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new()
    }
}

/// `(scancode, row, col)` for every directly-bound key on the Beast's
/// 12-column, 4-row matrix.
const KEY_BINDINGS: &[(Scancode, u8, u8)] = &[
    (Scancode::Up, 0, 0),
    (Scancode::Num1, 0, 1),
    (Scancode::Num2, 0, 2),
    (Scancode::Num3, 0, 3),
    (Scancode::Num4, 0, 4),
    (Scancode::Num5, 0, 5),
    (Scancode::Num6, 0, 6),
    (Scancode::Num7, 0, 7),
    (Scancode::Num8, 0, 8),
    (Scancode::Num9, 0, 9),
    (Scancode::Num0, 0, 10),
    (Scancode::Backspace, 0, 11),
    (Scancode::Down, 1, 0),
    (Scancode::Q, 1, 1),
    (Scancode::W, 1, 2),
    (Scancode::E, 1, 3),
    (Scancode::R, 1, 4),
    (Scancode::T, 1, 5),
    (Scancode::Y, 1, 6),
    (Scancode::U, 1, 7),
    (Scancode::I, 1, 8),
    (Scancode::O, 1, 9),
    (Scancode::P, 1, 10),
    (Scancode::Semicolon, 1, 11),
    (Scancode::LCtrl, 2, 0),
    (Scancode::A, 2, 1),
    (Scancode::S, 2, 2),
    (Scancode::D, 2, 3),
    (Scancode::F, 2, 4),
    (Scancode::G, 2, 5),
    (Scancode::H, 2, 6),
    (Scancode::J, 2, 7),
    (Scancode::K, 2, 8),
    (Scancode::L, 2, 9),
    (Scancode::Period, 2, 10),
    (Scancode::Return, 2, 11),
    (Scancode::LShift, 3, 1),
    (Scancode::Z, 3, 2),
    (Scancode::X, 3, 3),
    (Scancode::C, 3, 4),
    (Scancode::V, 3, 5),
    (Scancode::B, 3, 6),
    (Scancode::N, 3, 7),
    (Scancode::M, 3, 8),
    (Scancode::Space, 3, 9),
    (Scancode::Left, 3, 10),
    (Scancode::Right, 3, 11),
];

/// Build the default key map. `Machine::set_input` only takes a single
/// button id per call, so matrix position (`row*12+col`) doubles as the
/// button id used by [`crate::emulator`]'s event loop.
pub fn default_key_map() -> KeyMap {
    let mut km = KeyMap::new();
    for &(scancode, row, col) in KEY_BINDINGS {
        km.bind(scancode, row * 12 + col);
    }
    km
}
