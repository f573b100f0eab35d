//! Fatal interpreter errors.
//!
//! None of these are recoverable mid-execution: the bytecode language
//! exposes no exception-handling construct, so every error unwinds to
//! the embedding caller, which decides whether to log or terminate.

use lama_bytefile::LoadError;
use thiserror::Error;

use crate::runtime::RuntimeError;

/// Errors that abort bytecode execution.
#[derive(Debug, Error)]
pub enum VmError {
    /// The opcode byte names no instruction. Models a corrupted or
    /// incompatible bytecode stream.
    #[error("invalid opcode {family}-{low} at {at:#010x}")]
    InvalidOpcode { family: u8, low: u8, at: usize },

    /// A retired instruction encoding (STI, RET, SWAP) was executed.
    #[error("unsupported instruction {mnemonic} at {at:#010x}")]
    UnsupportedInstruction { mnemonic: &'static str, at: usize },

    /// A push exceeded the reserved stack capacity.
    #[error("stack overflow (capacity {capacity} words)")]
    StackOverflow { capacity: usize },

    /// A pop would cross the active frame boundary into the caller's
    /// region. Signals a compiler/VM contract violation.
    #[error("illegal pop across the active frame boundary")]
    IllegalPop,

    /// BINOP `/` or `%` with an unboxed zero divisor.
    #[error("division by zero at {at:#010x}")]
    DivisionByZero { at: usize },

    /// The FAIL instruction, carrying the source position it encodes.
    #[error("match failure at {line}:{column}")]
    ExplicitFail { line: i32, column: i32 },

    /// The instruction pointer left the code region mid-instruction.
    #[error("code ends inside an instruction at {at:#010x}")]
    UnexpectedEndOfCode { at: usize },

    /// An operand that names an offset, slot or count is negative.
    #[error("negative operand {value} at {at:#010x}")]
    NegativeOperand { value: i32, at: usize },

    /// A CLOSURE capture carries a location-kind byte outside 0..=3.
    #[error("invalid location kind {kind} at {at:#010x}")]
    InvalidLocationKind { kind: u8, at: usize },

    /// A global-slot operand is outside the image's global area.
    #[error("global slot {index} out of range ({size} slots)")]
    GlobalOutOfRange { index: usize, size: usize },

    /// A local-slot operand falls outside the active frame.
    #[error("local slot {pos} outside the active frame")]
    LocalOutOfFrame { pos: usize },

    /// An argument-slot operand falls outside the active frame.
    #[error("argument slot {pos} outside the active frame ({nargs} arguments)")]
    ArgOutOfFrame { pos: usize, nargs: usize },

    /// Errors reported by the image while resolving operands.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Errors reported by the external heap/object runtime.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
