//! Lama common types: tagged words and instruction decoding.
//!
//! This crate provides the foundational data structures shared by the
//! bytecode loader and the interpreter:
//!
//! - [`Word`] — the 32-bit tagged integer/reference cell
//! - [`Opcode`] — two-level (family, sub-opcode) instruction decoding
//! - [`LocationKind`] — global/local/argument/captured variable kinds
//! - [`DecodeError`] — errors from decoding instruction bytes
//!
//! It uses `thiserror` and has no other dependencies.

pub mod error;
pub mod location;
pub mod opcode;
pub mod word;

pub use error::DecodeError;
pub use location::LocationKind;
pub use opcode::{Binop, Opcode, Pattern};
pub use word::{Word, WordKind, MAX_INT, MIN_INT};
