//! Opcode definitions for the Lama stack-machine instruction set.
//!
//! An instruction starts with one byte whose high nibble selects an
//! opcode family (0-15) and whose low nibble selects the operation
//! within it. Fixed-width operands follow; their layout is owned by the
//! interpreter, not by this crate.

use crate::error::DecodeError;
use crate::location::LocationKind;

/// Binary operator selected by the low nibble of family 0 (codes 1-13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binop {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// All binary operators, indexed by `code - 1`.
pub const ALL_BINOPS: [Binop; 13] = [
    Binop::Add,
    Binop::Sub,
    Binop::Mul,
    Binop::Div,
    Binop::Rem,
    Binop::Lt,
    Binop::Le,
    Binop::Gt,
    Binop::Ge,
    Binop::Eq,
    Binop::Ne,
    Binop::And,
    Binop::Or,
];

impl Binop {
    /// Source-syntax symbol, as printed by the reference disassembler.
    pub fn symbol(&self) -> &'static str {
        match self {
            Binop::Add => "+",
            Binop::Sub => "-",
            Binop::Mul => "*",
            Binop::Div => "/",
            Binop::Rem => "%",
            Binop::Lt => "<",
            Binop::Le => "<=",
            Binop::Gt => ">",
            Binop::Ge => ">=",
            Binop::Eq => "==",
            Binop::Ne => "!=",
            Binop::And => "&&",
            Binop::Or => "!!",
        }
    }
}

/// Shape predicate selected by the low nibble of family 6 (PATT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// `=str`: contents equality of two strings.
    StrEq,
    /// `#string`
    String,
    /// `#array`
    Array,
    /// `#sexp`
    Sexp,
    /// `#ref`: the word carries a heap reference.
    Boxed,
    /// `#val`: the word carries an immediate integer.
    Unboxed,
    /// `#fun`
    Closure,
}

/// All patterns, indexed by sub-opcode.
pub const ALL_PATTERNS: [Pattern; 7] = [
    Pattern::StrEq,
    Pattern::String,
    Pattern::Array,
    Pattern::Sexp,
    Pattern::Boxed,
    Pattern::Unboxed,
    Pattern::Closure,
];

impl Pattern {
    /// Disassembly syntax for this predicate.
    pub fn symbol(&self) -> &'static str {
        match self {
            Pattern::StrEq => "=str",
            Pattern::String => "#string",
            Pattern::Array => "#array",
            Pattern::Sexp => "#sexp",
            Pattern::Boxed => "#ref",
            Pattern::Unboxed => "#val",
            Pattern::Closure => "#fun",
        }
    }
}

/// A decoded instruction opcode. Operands are read separately from the
/// code stream by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Pop rhs then lhs, apply the operator, push the boxed result.
    Binop(Binop),
    /// Push a boxed integer constant (4-byte operand).
    Const,
    /// Allocate a runtime string from the string table (offset operand).
    String,
    /// Build a tagged structure (tag name + arity operands).
    Sexp,
    /// Tag-keyed 2- or 3-operand store.
    Sta,
    /// Unconditional jump to an absolute code offset.
    Jmp,
    /// Function epilogue; resume at the caller or halt.
    End,
    /// Pop and discard the top of stack.
    Drop,
    /// Duplicate the top of stack.
    Dup,
    /// Pop index, then container; push the element.
    Elem,
    /// Load a variable and push it.
    Ld(LocationKind),
    /// Push the address of a variable cell.
    Lda(LocationKind),
    /// Pop a value, store it, push it back.
    St(LocationKind),
    /// Jump if the unboxed top of stack is zero.
    CJmpZ,
    /// Jump if the unboxed top of stack is nonzero.
    CJmpNz,
    /// Function prologue (nargs, nlocals operands).
    Begin,
    /// Closure-body prologue; currently identical to [`Opcode::Begin`].
    CBegin,
    /// Build a closure (entry offset + capture list operands).
    Closure,
    /// Call through the closure at depth n on the stack.
    CallClosure,
    /// Call a code offset directly.
    Call,
    /// Test a value against a structure tag and arity.
    Tag,
    /// Test a value for being an array of a given length.
    Array,
    /// Explicit failure carrying a source position.
    Fail,
    /// Debug line marker; consumes its operand and does nothing.
    Line,
    /// Shape predicate on the top of stack.
    Patt(Pattern),
    /// Builtin: push one integer read from the external input.
    BuiltinRead,
    /// Builtin: pop, emit to external output, push the call result.
    BuiltinWrite,
    /// Builtin: pop a container, push its boxed length.
    BuiltinLength,
    /// Builtin: pop a value, push its printable-string conversion.
    BuiltinString,
    /// Builtin: build an array from the top n stack words.
    BuiltinArray,
    /// Halt the interpreter.
    Stop,
}

impl Opcode {
    /// Decode one opcode byte into its family and operation.
    ///
    /// Unknown (family, sub-opcode) pairs and the retired STI/RET/SWAP
    /// encodings are rejected; the interpreter treats both as fatal
    /// without consuming further bytes.
    pub fn decode(byte: u8) -> Result<Opcode, DecodeError> {
        let family = (byte & 0xF0) >> 4;
        let low = byte & 0x0F;
        let invalid = || DecodeError::InvalidOpcode { family, low };

        match family {
            0 => match low {
                1..=13 => Ok(Opcode::Binop(ALL_BINOPS[low as usize - 1])),
                _ => Err(invalid()),
            },
            1 => match low {
                0 => Ok(Opcode::Const),
                1 => Ok(Opcode::String),
                2 => Ok(Opcode::Sexp),
                3 => Err(DecodeError::RetiredOpcode("STI")),
                4 => Ok(Opcode::Sta),
                5 => Ok(Opcode::Jmp),
                6 => Ok(Opcode::End),
                7 => Err(DecodeError::RetiredOpcode("RET")),
                8 => Ok(Opcode::Drop),
                9 => Ok(Opcode::Dup),
                10 => Err(DecodeError::RetiredOpcode("SWAP")),
                11 => Ok(Opcode::Elem),
                _ => Err(invalid()),
            },
            2 => LocationKind::try_from(low).map(Opcode::Ld).map_err(|_| invalid()),
            3 => LocationKind::try_from(low).map(Opcode::Lda).map_err(|_| invalid()),
            4 => LocationKind::try_from(low).map(Opcode::St).map_err(|_| invalid()),
            5 => match low {
                0 => Ok(Opcode::CJmpZ),
                1 => Ok(Opcode::CJmpNz),
                2 => Ok(Opcode::Begin),
                3 => Ok(Opcode::CBegin),
                4 => Ok(Opcode::Closure),
                5 => Ok(Opcode::CallClosure),
                6 => Ok(Opcode::Call),
                7 => Ok(Opcode::Tag),
                8 => Ok(Opcode::Array),
                9 => Ok(Opcode::Fail),
                10 => Ok(Opcode::Line),
                _ => Err(invalid()),
            },
            6 => match low {
                0..=6 => Ok(Opcode::Patt(ALL_PATTERNS[low as usize])),
                _ => Err(invalid()),
            },
            7 => match low {
                0 => Ok(Opcode::BuiltinRead),
                1 => Ok(Opcode::BuiltinWrite),
                2 => Ok(Opcode::BuiltinLength),
                3 => Ok(Opcode::BuiltinString),
                4 => Ok(Opcode::BuiltinArray),
                _ => Err(invalid()),
            },
            15 => Ok(Opcode::Stop),
            _ => Err(invalid()),
        }
    }

    /// Assembly mnemonic, matching the reference disassembler.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Binop(_) => "BINOP",
            Opcode::Const => "CONST",
            Opcode::String => "STRING",
            Opcode::Sexp => "SEXP",
            Opcode::Sta => "STA",
            Opcode::Jmp => "JMP",
            Opcode::End => "END",
            Opcode::Drop => "DROP",
            Opcode::Dup => "DUP",
            Opcode::Elem => "ELEM",
            Opcode::Ld(_) => "LD",
            Opcode::Lda(_) => "LDA",
            Opcode::St(_) => "ST",
            Opcode::CJmpZ => "CJMPz",
            Opcode::CJmpNz => "CJMPnz",
            Opcode::Begin => "BEGIN",
            Opcode::CBegin => "CBEGIN",
            Opcode::Closure => "CLOSURE",
            Opcode::CallClosure => "CALLC",
            Opcode::Call => "CALL",
            Opcode::Tag => "TAG",
            Opcode::Array => "ARRAY",
            Opcode::Fail => "FAIL",
            Opcode::Line => "LINE",
            Opcode::Patt(_) => "PATT",
            Opcode::BuiltinRead => "CALL Lread",
            Opcode::BuiltinWrite => "CALL Lwrite",
            Opcode::BuiltinLength => "CALL Llength",
            Opcode::BuiltinString => "CALL Lstring",
            Opcode::BuiltinArray => "CALL Barray",
            Opcode::Stop => "STOP",
        }
    }
}
