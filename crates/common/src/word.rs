//! Tagged word encoding for the Lama stack machine.
//!
//! Every stack cell, global slot and heap field is a 32-bit [`Word`].
//! The least-significant bit distinguishes the two payload kinds:
//!
//! - LSB set: an immediate integer, stored as `(n << 1) | 1`
//! - LSB clear: a heap reference, storing the object handle as `h << 1`
//!
//! Frame bookkeeping cells (saved frame pointer, argument count, return
//! address) bypass the tag entirely via [`Word::from_raw`]; they never
//! escape the call stack.

/// Smallest integer representable after losing one bit of range to the tag.
pub const MIN_INT: i32 = i32::MIN >> 1;

/// Largest integer representable after losing one bit of range to the tag.
pub const MAX_INT: i32 = i32::MAX >> 1;

/// A single tagged machine word.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Word(i32);

/// Decoded view of a word, for call sites that branch on the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    /// An immediate integer.
    Int(i32),
    /// A heap object handle.
    Reference(usize),
}

impl Word {
    /// Encode an immediate integer: `(n << 1) | 1`.
    pub fn int(n: i32) -> Self {
        Word((n << 1) | 1)
    }

    /// Encode a heap handle: `h << 1`. Handles above 31 bits do not occur;
    /// the heap allocates them sequentially.
    pub fn reference(handle: usize) -> Self {
        Word((handle as i32) << 1)
    }

    /// Reinterpret an untagged value as a word. Only frame bookkeeping
    /// cells use this.
    pub fn from_raw(bits: i32) -> Self {
        Word(bits)
    }

    /// The untagged bit pattern.
    pub fn raw(self) -> i32 {
        self.0
    }

    /// True if this word holds an immediate integer.
    pub fn is_int(self) -> bool {
        self.0 & 1 == 1
    }

    /// True if this word holds a heap reference.
    pub fn is_reference(self) -> bool {
        self.0 & 1 == 0
    }

    /// Decode an immediate integer: arithmetic shift restores the sign.
    pub fn as_int(self) -> i32 {
        self.0 >> 1
    }

    /// Decode a heap handle. Meaningless when [`is_int`](Self::is_int).
    pub fn handle(self) -> usize {
        (self.0 >> 1) as usize
    }

    /// Branchable view of the tag and payload.
    pub fn kind(self) -> WordKind {
        if self.is_int() {
            WordKind::Int(self.as_int())
        } else {
            WordKind::Reference(self.handle())
        }
    }
}

impl std::fmt::Debug for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            WordKind::Int(n) => write!(f, "Int({n})"),
            WordKind::Reference(h) => write!(f, "Ref({h})"),
        }
    }
}
