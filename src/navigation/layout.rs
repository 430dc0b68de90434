//! Static on-screen keyboard layout
//!
//! Built once at startup into an immutable sequence. Columns advance by the
//! span of the previous key on the same row, so wide keys push their right
//! neighbours further out in grid space.

use evdev::Key;

/// One focusable key of the on-screen keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusElement {
    /// Unique identifier used for lookups and UI requests
    pub id: String,
    /// Text shown on the key
    pub label: String,
    pub row: i32,
    pub col: i32,
    pub span: i32,
    /// Key code typed when the element is invoked
    pub key: Key,
}

impl FocusElement {
    pub fn is_modifier(&self) -> bool {
        matches!(
            self.key,
            Key::KEY_LEFTSHIFT
                | Key::KEY_RIGHTSHIFT
                | Key::KEY_LEFTCTRL
                | Key::KEY_RIGHTCTRL
                | Key::KEY_LEFTALT
                | Key::KEY_RIGHTALT
                | Key::KEY_LEFTMETA
                | Key::KEY_RIGHTMETA
        )
    }
}

// (id, label, key, span)
type KeyDef = (&'static str, &'static str, Key, i32);

const ROW_FUNCTION: &[KeyDef] = &[
    ("ESC", "ESC", Key::KEY_ESC, 1),
    ("F1", "F1", Key::KEY_F1, 1),
    ("F2", "F2", Key::KEY_F2, 1),
    ("F3", "F3", Key::KEY_F3, 1),
    ("F4", "F4", Key::KEY_F4, 1),
    ("F5", "F5", Key::KEY_F5, 1),
    ("F6", "F6", Key::KEY_F6, 1),
    ("F7", "F7", Key::KEY_F7, 1),
    ("F8", "F8", Key::KEY_F8, 1),
    ("F9", "F9", Key::KEY_F9, 1),
    ("F10", "F10", Key::KEY_F10, 1),
    ("F11", "F11", Key::KEY_F11, 1),
    ("F12", "F12", Key::KEY_F12, 1),
];

const ROW_NUMBER: &[KeyDef] = &[
    ("`", "`", Key::KEY_GRAVE, 1),
    ("1", "1", Key::KEY_1, 1),
    ("2", "2", Key::KEY_2, 1),
    ("3", "3", Key::KEY_3, 1),
    ("4", "4", Key::KEY_4, 1),
    ("5", "5", Key::KEY_5, 1),
    ("6", "6", Key::KEY_6, 1),
    ("7", "7", Key::KEY_7, 1),
    ("8", "8", Key::KEY_8, 1),
    ("9", "9", Key::KEY_9, 1),
    ("0", "0", Key::KEY_0, 1),
    ("-", "-", Key::KEY_MINUS, 1),
    ("=", "=", Key::KEY_EQUAL, 1),
    ("BACKSPACE", "BACKSPACE", Key::KEY_BACKSPACE, 2),
];

const ROW_TOP: &[KeyDef] = &[
    ("TAB", "TAB", Key::KEY_TAB, 2),
    ("Q", "Q", Key::KEY_Q, 1),
    ("W", "W", Key::KEY_W, 1),
    ("E", "E", Key::KEY_E, 1),
    ("R", "R", Key::KEY_R, 1),
    ("T", "T", Key::KEY_T, 1),
    ("Y", "Y", Key::KEY_Y, 1),
    ("U", "U", Key::KEY_U, 1),
    ("I", "I", Key::KEY_I, 1),
    ("O", "O", Key::KEY_O, 1),
    ("P", "P", Key::KEY_P, 1),
    ("[", "[", Key::KEY_LEFTBRACE, 1),
    ("]", "]", Key::KEY_RIGHTBRACE, 1),
    ("\\", "\\", Key::KEY_BACKSLASH, 1),
];

const ROW_HOME: &[KeyDef] = &[
    ("CAPS", "CAPS", Key::KEY_CAPSLOCK, 2),
    ("A", "A", Key::KEY_A, 1),
    ("S", "S", Key::KEY_S, 1),
    ("D", "D", Key::KEY_D, 1),
    ("F", "F", Key::KEY_F, 1),
    ("G", "G", Key::KEY_G, 1),
    ("H", "H", Key::KEY_H, 1),
    ("J", "J", Key::KEY_J, 1),
    ("K", "K", Key::KEY_K, 1),
    ("L", "L", Key::KEY_L, 1),
    (";", ";", Key::KEY_SEMICOLON, 1),
    ("'", "'", Key::KEY_APOSTROPHE, 1),
    ("ENTER", "ENTER", Key::KEY_ENTER, 2),
];

const ROW_BOTTOM: &[KeyDef] = &[
    ("SHIFT", "SHIFT", Key::KEY_LEFTSHIFT, 2),
    ("Z", "Z", Key::KEY_Z, 1),
    ("X", "X", Key::KEY_X, 1),
    ("C", "C", Key::KEY_C, 1),
    ("V", "V", Key::KEY_V, 1),
    ("B", "B", Key::KEY_B, 1),
    ("N", "N", Key::KEY_N, 1),
    ("M", "M", Key::KEY_M, 1),
    (",", ",", Key::KEY_COMMA, 1),
    (".", ".", Key::KEY_DOT, 1),
    ("/", "/", Key::KEY_SLASH, 1),
    ("RSHIFT", "SHIFT", Key::KEY_RIGHTSHIFT, 2),
];

const ROW_SPACE: &[KeyDef] = &[
    ("CTRL", "CTRL", Key::KEY_LEFTCTRL, 1),
    ("WIN", "WIN", Key::KEY_LEFTMETA, 1),
    ("ALT", "ALT", Key::KEY_LEFTALT, 1),
    ("SPACE", "SPACE", Key::KEY_SPACE, 6),
    ("RALT", "ALT", Key::KEY_RIGHTALT, 1),
    ("RWIN", "WIN", Key::KEY_RIGHTMETA, 1),
    ("MENU", "MENU", Key::KEY_COMPOSE, 1),
    ("RCTRL", "CTRL", Key::KEY_RIGHTCTRL, 1),
];

const STANDARD_ROWS: &[&[KeyDef]] = &[
    ROW_FUNCTION,
    ROW_NUMBER,
    ROW_TOP,
    ROW_HOME,
    ROW_BOTTOM,
    ROW_SPACE,
];

/// Ordered, immutable list of focusable keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardLayout {
    elements: Vec<FocusElement>,
    rows: usize,
}

impl KeyboardLayout {
    /// The six-row desktop keyboard
    pub fn standard() -> Self {
        let mut elements = Vec::new();
        for (row, defs) in STANDARD_ROWS.iter().enumerate() {
            let mut col = 0;
            for &(id, label, key, span) in defs.iter() {
                elements.push(FocusElement {
                    id: id.to_string(),
                    label: label.to_string(),
                    row: row as i32,
                    col,
                    span,
                    key,
                });
                col += span;
            }
        }
        Self::from_elements(elements)
    }

    /// Builds a layout from explicit elements, in scan order.
    pub fn from_elements(elements: Vec<FocusElement>) -> Self {
        let rows = elements
            .iter()
            .map(|e| e.row.max(0) as usize + 1)
            .max()
            .unwrap_or(0);
        Self { elements, rows }
    }

    pub fn get(&self, index: usize) -> Option<&FocusElement> {
        self.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[FocusElement] {
        &self.elements
    }

    /// Position of the first element with the given identifier
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.id == id)
    }

    /// Elements grouped per row with their sequence index, in scan order
    pub fn rows(&self) -> Vec<Vec<(usize, &FocusElement)>> {
        let mut rows: Vec<Vec<(usize, &FocusElement)>> = vec![Vec::new(); self.rows];
        for (index, element) in self.elements.iter().enumerate() {
            if let Some(row) = rows.get_mut(element.row.max(0) as usize) {
                row.push((index, element));
            }
        }
        rows
    }
}
