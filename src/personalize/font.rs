use font8x8::{BASIC_FONTS, UnicodeFonts};
use std::ops::{Add, AddAssign};

/// 26.6 fixed-point number: 26 integer bits, 6 fractional bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fixed26_6(pub i32);

impl Fixed26_6 {
    pub const ONE: i32 = 64;

    pub const fn from_int(value: i32) -> Self {
        Self(value * Self::ONE)
    }

    /// Largest integer not greater than this value.
    pub const fn floor(self) -> i32 {
        self.0 >> 6
    }
}

impl Add for Fixed26_6 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Fixed26_6 {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Pen position. `y` is the text baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point26_6 {
    pub x: Fixed26_6,
    pub y: Fixed26_6,
}

impl Point26_6 {
    pub const fn from_int(x: i32, y: i32) -> Self {
        Self {
            x: Fixed26_6::from_int(x),
            y: Fixed26_6::from_int(y),
        }
    }
}

/// Fixed-width bitmap face.
#[derive(Debug, Clone, Copy)]
pub struct BitmapFace {
    /// Horizontal pen advance per character, in pixels
    pub advance: i32,
    /// Glyph cell height, in pixels
    pub height: i32,
    /// Rows of the cell above the baseline
    pub ascent: i32,
}

impl BitmapFace {
    /// 8x8 ASCII face. Row 7 of every cell holds descenders.
    pub const BASIC_8X8: Self = Self {
        advance: 8,
        height: 8,
        ascent: 7,
    };

    pub fn advance_fixed(&self) -> Fixed26_6 {
        Fixed26_6::from_int(self.advance)
    }

    pub fn descent(&self) -> i32 {
        self.height - self.ascent
    }

    /// Glyph rows, top to bottom. Bit 0 of each row is the leftmost pixel.
    pub fn glyph(&self, c: char) -> Option<[u8; 8]> {
        BASIC_FONTS.get(c)
    }
}

impl Default for BitmapFace {
    fn default() -> Self {
        Self::BASIC_8X8
    }
}
