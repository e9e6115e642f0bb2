//! Framebuffer view handed to presenters on `SHW`
//!
//! Each byte packs two pixels. Bits 7/6/5 are red/green/blue of the left pixel, bits 3/2/1
//! the same for the right pixel; bits 4 and 0 are ignored. Rows are read left to right,
//! top to bottom, starting at offset 0 regardless of the page register.

use crate::constants::{FRAME_REGION, SCREEN_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    fn from_bits(bits: u8) -> Self {
        let scale = |bit: u8| if bits & bit != 0 { 0xFF } else { 0x00 };
        Self {
            r: scale(0b100),
            g: scale(0b010),
            b: scale(0b001),
        }
    }

    /// Single character used by the text preview
    pub fn glyph(&self) -> char {
        let index = (self.r & 1) << 2 | (self.g & 1) << 1 | (self.b & 1);
        b".BGCRMY#"[index as usize] as char
    }
}

/// Split a framebuffer byte into its (left, right) pixels.
pub fn byte_to_pixels(byte: u8) -> (Rgb, Rgb) {
    (Rgb::from_bits(byte >> 5), Rgb::from_bits(byte >> 1))
}

#[derive(Debug, Clone, Copy)]
pub struct Frame<'m> {
    pub display_value: u8,
    region: &'m [u8],
}

impl<'m> Frame<'m> {
    pub(crate) fn new(display_value: u8, memory: &'m [u8]) -> Self {
        let end = FRAME_REGION.min(memory.len());
        Self {
            display_value,
            region: &memory[..end],
        }
    }

    /// Memory [0x00, 0x100) as seen when the frame was taken
    pub fn region(&self) -> &'m [u8] {
        self.region
    }

    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        let byte = self
            .region
            .get(y * SCREEN_SIZE / 2 + x / 2)
            .copied()
            .unwrap_or(0);
        let (left, right) = byte_to_pixels(byte);
        if x % 2 == 0 { left } else { right }
    }

    pub fn rows(&self) -> impl Iterator<Item = [Rgb; SCREEN_SIZE]> + '_ {
        (0..SCREEN_SIZE).map(move |y| std::array::from_fn(|x| self.pixel(x, y)))
    }

    /// Text rendering, one line per row, followed by the display value
    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        for row in self.rows() {
            out.extend(row.iter().map(Rgb::glyph));
            out.push('\n');
        }
        out.push_str(&format!(
            "display: {:08b} (0x{:02X})\n",
            self.display_value, self.display_value
        ));
        out
    }
}
