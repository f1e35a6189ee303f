//! Error related data structures.

use std::fmt::{self, Display, Formatter};

/// Top level enum for error handling within the emulator core.
///
/// Reserved for *setup* failures (malformed ROM/BIOS) reported to the
/// caller of `new`/`load_rom`/`load_bios`. Fatal runtime conditions (an
/// `UNDEFINED` opcode reached during execution) are not represented
/// here; they go through the `panic_gb!` diagnostic path since there's
/// no well-defined way to resume from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The ROM image is shorter than the minimum header size.
    RomSize,

    /// Byte 0x147 of the ROM header names a mapper this core doesn't
    /// implement (only `NoMbc` and `Mbc1` are supported).
    UnsupportedMbc(u8),

    /// The header checksum at 0x14D didn't match and strict validation
    /// was requested.
    ChecksumMismatch { expected: u8, found: u8 },

    /// A boot ROM was supplied that isn't exactly 256 bytes.
    InvalidBiosSize(usize),

    /// A free-form error carrying a descriptive message, used for
    /// conditions that don't warrant a dedicated variant.
    CustomError(String),
}

impl Error {
    pub fn description(&self) -> String {
        match self {
            Error::RomSize => String::from("Invalid ROM size"),
            Error::UnsupportedMbc(code) => format!("Unsupported cartridge type 0x{code:02x}"),
            Error::ChecksumMismatch { expected, found } => format!(
                "Header checksum mismatch (expected 0x{expected:02x}, found 0x{found:02x})"
            ),
            Error::InvalidBiosSize(size) => {
                format!("Boot ROM must be exactly 256 bytes, got {size}")
            }
            Error::CustomError(message) => message.clone(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
