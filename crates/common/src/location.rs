//! Variable location kinds shared by LD, LDA, ST and CLOSURE operands.

use crate::error::DecodeError;

/// Where a variable lives. The sub-opcode of LD/LDA/ST and the kind byte
/// of each CLOSURE capture select one of these.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    /// Slot in the image-sized global area.
    Global = 0,
    /// Local slot of the active frame.
    Local = 1,
    /// Argument slot of the active frame.
    Argument = 2,
    /// Variable captured by the currently executing closure.
    Captured = 3,
}

/// All location kinds, in encoding order.
pub const ALL_LOCATION_KINDS: [LocationKind; 4] = [
    LocationKind::Global,
    LocationKind::Local,
    LocationKind::Argument,
    LocationKind::Captured,
];

impl TryFrom<u8> for LocationKind {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LocationKind::Global),
            1 => Ok(LocationKind::Local),
            2 => Ok(LocationKind::Argument),
            3 => Ok(LocationKind::Captured),
            other => Err(DecodeError::InvalidLocationKind(other)),
        }
    }
}

impl LocationKind {
    /// Single-letter prefix used by the reference disassembly syntax,
    /// e.g. `G(0)`, `L(1)`, `A(2)`, `C(3)`.
    pub fn letter(&self) -> char {
        match self {
            LocationKind::Global => 'G',
            LocationKind::Local => 'L',
            LocationKind::Argument => 'A',
            LocationKind::Captured => 'C',
        }
    }
}
