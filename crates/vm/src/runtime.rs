//! The external heap/object runtime the engine delegates to.
//!
//! The interpreter never inspects heap object internals; everything an
//! opcode needs from a boxed reference goes through this trait. The
//! in-memory [`Heap`](crate::heap::Heap) implementation backs both
//! production runs and tests.

use lama_common::Word;
use thiserror::Error;

/// Errors reported by a runtime implementation.
///
/// The engine trusts the runtime, so any of these surfacing means the
/// bytecode handed it a word of the wrong shape — a fatal condition.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A reference word names no live object.
    #[error("dangling heap handle {0}")]
    BadHandle(usize),

    /// The object exists but has the wrong shape for the operation.
    #[error("expected a {expected}, handle {handle} holds something else")]
    WrongShape {
        expected: &'static str,
        handle: usize,
    },

    /// An element index outside the container.
    #[error("index {index} out of bounds (length {length})")]
    IndexOutOfBounds { index: i32, length: usize },

    /// An operation needing a heap reference got an immediate integer.
    #[error("expected a heap reference, got the integer {0}")]
    NotAReference(i32),

    /// An operation needing an immediate integer got a heap reference.
    #[error("expected an integer, got a heap reference")]
    NotAnInteger,

    /// The external input/output stream failed.
    #[error("builtin i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The external input was not a readable integer.
    #[error("malformed input line: {0:?}")]
    MalformedInput(String),
}

/// Allocation and inspection primitives supplied to the engine.
pub trait Runtime {
    /// Allocate a string object from raw bytes.
    fn alloc_string(&mut self, bytes: &[u8]) -> Result<Word, RuntimeError>;

    /// Allocate an array from element words in natural order.
    fn alloc_array(&mut self, elements: Vec<Word>) -> Result<Word, RuntimeError>;

    /// Allocate a tagged structure from a tag hash and element words.
    fn alloc_sexp(&mut self, tag: i32, elements: Vec<Word>) -> Result<Word, RuntimeError>;

    /// Allocate a closure wrapping an entry address and captured words.
    fn alloc_closure(&mut self, entry: usize, captured: Vec<Word>) -> Result<Word, RuntimeError>;

    /// Indexed element read on a string, array or structure.
    fn element(&self, container: Word, index: i32) -> Result<Word, RuntimeError>;

    /// Indexed element write on a string, array or structure.
    fn set_element(&mut self, container: Word, index: i32, value: Word)
        -> Result<(), RuntimeError>;

    /// The entry address a closure was built with.
    fn closure_entry(&self, closure: Word) -> Result<usize, RuntimeError>;

    /// The `index`-th captured word of a closure.
    fn closure_captured(&self, closure: Word, index: usize) -> Result<Word, RuntimeError>;

    /// Overwrite the `index`-th captured word of a closure.
    fn closure_set_captured(
        &mut self,
        closure: Word,
        index: usize,
        value: Word,
    ) -> Result<(), RuntimeError>;

    /// Element count of an array or structure, byte count of a string.
    fn length(&self, container: Word) -> Result<usize, RuntimeError>;

    /// Contents equality of two strings.
    fn string_eq(&self, a: Word, b: Word) -> Result<bool, RuntimeError>;

    /// Shape predicates; false for integers and wrong shapes.
    fn is_string(&self, word: Word) -> bool;
    fn is_array(&self, word: Word) -> bool;
    fn is_sexp(&self, word: Word) -> bool;
    fn is_closure(&self, word: Word) -> bool;

    /// True if `word` is a structure carrying `tag` with exactly
    /// `arity` elements.
    fn sexp_matches(&self, word: Word, tag: i32, arity: usize) -> bool;

    /// True if `word` is an array of exactly `len` elements.
    fn array_has_length(&self, word: Word, len: usize) -> bool;

    /// Printable-string conversion; allocates and returns a string.
    fn to_text(&mut self, word: Word) -> Result<Word, RuntimeError>;

    /// Hash a symbolic tag name into the integer space TAG compares in.
    fn tag_hash(&self, name: &[u8]) -> i32;

    /// Blocking read of one integer from the external input.
    fn read(&mut self) -> Result<Word, RuntimeError>;

    /// Emit one integer to the external output; returns the word the
    /// WRITE opcode pushes back.
    fn write(&mut self, value: Word) -> Result<Word, RuntimeError>;
}
