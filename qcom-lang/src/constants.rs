//! Fixed layout of a QCOM machine.

/// Memory is never smaller than this, short images are zero-padded up to it.
pub const MIN_MEMORY: usize = 0x100;

/// Bytes reserved in front of the instruction stream of every image.
pub const HEADER_SIZE: usize = 0x90;

/// Execution always starts right after the header.
pub const ENTRY_POINT: usize = HEADER_SIZE;

/// Memory-mapped controller byte, rewritten once per tick.
pub const INPUT_PORT: usize = 0x80;

/// Register holding the page nibble and the zero flag.
pub const FLAGS_REGISTER: usize = 7;

pub const REGISTER_COUNT: usize = 8;

/// Memory window exposed to presenters, starting at offset 0.
pub const FRAME_REGION: usize = 0x100;

/// The screen is 16x16 pixels, two pixels per byte.
pub const SCREEN_SIZE: usize = 16;

/// Image extension expected by the compiler's output path.
pub const IMAGE_EXTENSION: &str = "qcom";
