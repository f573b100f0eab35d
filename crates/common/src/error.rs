//! Decode errors for Lama instruction bytes.

use thiserror::Error;

/// Errors that occur while decoding instruction bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The (family, sub-opcode) pair is not part of the instruction set.
    #[error("invalid opcode {family}-{low}")]
    InvalidOpcode { family: u8, low: u8 },

    /// The encoding is reserved by a retired instruction (STI, RET, SWAP).
    /// Executing one means the bytecode stream is corrupted or was produced
    /// by an incompatible compiler.
    #[error("unsupported instruction {0}")]
    RetiredOpcode(&'static str),

    /// A location-kind byte outside 0..=3.
    #[error("invalid location kind {0}")]
    InvalidLocationKind(u8),
}
