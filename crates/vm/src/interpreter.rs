//! The fetch-decode-execute loop and opcode handlers.
//!
//! One [`Interpreter`] owns its call stack, its global area and its
//! runtime handle, so independent instances can run side by side. The
//! loop terminates on STOP or on a return with no caller frame; every
//! other exit is a fatal [`VmError`] handed to the embedding caller.

use lama_bytefile::Bytefile;
use lama_common::{Binop, DecodeError, LocationKind, Opcode, Pattern, Word, WordKind};

use crate::callstack::CallStack;
use crate::error::VmError;
use crate::runtime::Runtime;

/// Default call-stack capacity in words.
pub const DEFAULT_STACK_CAPACITY: usize = 1 << 20;

/// A single-threaded bytecode interpreter over one image.
pub struct Interpreter<'a, R> {
    image: &'a Bytefile,
    runtime: R,
    stack: CallStack,
    globals: Vec<Word>,
    ip: usize,
}

impl<'a, R: Runtime> Interpreter<'a, R> {
    /// Create an interpreter with the default stack capacity.
    pub fn new(image: &'a Bytefile, runtime: R) -> Self {
        Self::with_stack_capacity(image, runtime, DEFAULT_STACK_CAPACITY)
    }

    /// Create an interpreter with an explicit stack capacity in words.
    pub fn with_stack_capacity(image: &'a Bytefile, runtime: R, capacity: usize) -> Self {
        Interpreter {
            image,
            runtime,
            stack: CallStack::new(capacity),
            globals: vec![Word::int(0); image.global_area_size()],
            ip: 0,
        }
    }

    /// The runtime collaborator.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Consume the interpreter, releasing its runtime.
    pub fn into_runtime(self) -> R {
        self.runtime
    }

    /// The managed call stack. Useful for inspecting results in tests
    /// and embedders.
    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    /// The global-variable area.
    pub fn globals(&self) -> &[Word] {
        &self.globals
    }

    /// Execute from the start of the code region until STOP or an
    /// exhausted call chain.
    pub fn run(&mut self) -> Result<(), VmError> {
        loop {
            let at = self.ip;
            let byte = self.next_byte()?;
            let opcode = Opcode::decode(byte).map_err(|e| match e {
                DecodeError::RetiredOpcode(mnemonic) => {
                    VmError::UnsupportedInstruction { mnemonic, at }
                }
                _ => VmError::InvalidOpcode {
                    family: byte >> 4,
                    low: byte & 0x0F,
                    at,
                },
            })?;
            log::trace!("{at:#010x}: {}", opcode.mnemonic());

            match opcode {
                Opcode::Stop => return Ok(()),
                Opcode::Binop(op) => self.exec_binop(op, at)?,
                Opcode::Const => {
                    let n = self.next_int()?;
                    self.stack.push(Word::int(n))?;
                }
                Opcode::String => self.exec_string()?,
                Opcode::Sexp => self.exec_sexp()?,
                Opcode::Sta => self.exec_sta()?,
                Opcode::Jmp => self.ip = self.operand_index()?,
                Opcode::End => match self.stack.epilogue()? {
                    Some(resume) => self.ip = resume,
                    None => return Ok(()),
                },
                Opcode::Drop => {
                    self.stack.pop()?;
                }
                Opcode::Dup => {
                    let top = self.stack.pop()?;
                    self.stack.fill(2, top)?;
                }
                Opcode::Elem => self.exec_elem()?,
                Opcode::Ld(kind) => self.exec_ld(kind)?,
                Opcode::Lda(kind) => self.exec_lda(kind)?,
                Opcode::St(kind) => self.exec_st(kind)?,
                Opcode::CJmpZ => self.exec_cjmp(true)?,
                Opcode::CJmpNz => self.exec_cjmp(false)?,
                // CBEGIN is reserved for closure-specific prologue
                // handling; today both share one path.
                Opcode::Begin | Opcode::CBegin => self.exec_begin()?,
                Opcode::Closure => self.exec_closure()?,
                Opcode::CallClosure => self.exec_callc()?,
                Opcode::Call => self.exec_call()?,
                Opcode::Tag => self.exec_tag()?,
                Opcode::Array => self.exec_array()?,
                Opcode::Fail => {
                    let line = self.next_int()?;
                    let column = self.next_int()?;
                    return Err(VmError::ExplicitFail { line, column });
                }
                Opcode::Line => {
                    self.next_int()?;
                }
                Opcode::Patt(pattern) => self.exec_patt(pattern)?,
                Opcode::BuiltinRead => {
                    let word = self.runtime.read()?;
                    self.stack.push(word)?;
                }
                Opcode::BuiltinWrite => {
                    let value = self.stack.pop()?;
                    let result = self.runtime.write(value)?;
                    self.stack.push(result)?;
                }
                Opcode::BuiltinLength => {
                    let container = self.stack.pop()?;
                    let length = self.runtime.length(container)?;
                    self.stack.push(Word::int(length as i32))?;
                }
                Opcode::BuiltinString => {
                    let value = self.stack.pop()?;
                    let text = self.runtime.to_text(value)?;
                    self.stack.push(text)?;
                }
                Opcode::BuiltinArray => self.exec_barray()?,
            }
        }
    }

    // ---- operand primitives ----

    fn next_byte(&mut self) -> Result<u8, VmError> {
        let byte = self
            .image
            .code()
            .get(self.ip)
            .copied()
            .ok_or(VmError::UnexpectedEndOfCode { at: self.ip })?;
        self.ip += 1;
        Ok(byte)
    }

    fn next_int(&mut self) -> Result<i32, VmError> {
        let end = self.ip + 4;
        let bytes = self
            .image
            .code()
            .get(self.ip..end)
            .ok_or(VmError::UnexpectedEndOfCode { at: self.ip })?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        self.ip = end;
        Ok(i32::from_le_bytes(buf))
    }

    /// A 4-byte operand that must be non-negative: code offsets, string
    /// offsets, slot positions, counts.
    fn operand_index(&mut self) -> Result<usize, VmError> {
        let at = self.ip;
        let value = self.next_int()?;
        usize::try_from(value).map_err(|_| VmError::NegativeOperand { value, at })
    }

    /// Pop `n` words and return them in natural (push) order.
    fn pop_block(&mut self, n: usize) -> Result<Vec<Word>, VmError> {
        self.stack.reverse(n)?;
        let mut words = Vec::with_capacity(n);
        for _ in 0..n {
            words.push(self.stack.pop()?);
        }
        Ok(words)
    }

    // ---- opcode handlers ----

    fn exec_binop(&mut self, op: Binop, at: usize) -> Result<(), VmError> {
        let rhs = self.stack.pop()?.as_int();
        let lhs = self.stack.pop()?.as_int();
        let result = match op {
            Binop::Add => lhs.wrapping_add(rhs),
            Binop::Sub => lhs.wrapping_sub(rhs),
            Binop::Mul => lhs.wrapping_mul(rhs),
            Binop::Div => {
                if rhs == 0 {
                    return Err(VmError::DivisionByZero { at });
                }
                lhs.wrapping_div(rhs)
            }
            Binop::Rem => {
                if rhs == 0 {
                    return Err(VmError::DivisionByZero { at });
                }
                lhs.wrapping_rem(rhs)
            }
            Binop::Lt => (lhs < rhs) as i32,
            Binop::Le => (lhs <= rhs) as i32,
            Binop::Gt => (lhs > rhs) as i32,
            Binop::Ge => (lhs >= rhs) as i32,
            Binop::Eq => (lhs == rhs) as i32,
            Binop::Ne => (lhs != rhs) as i32,
            Binop::And => (lhs != 0 && rhs != 0) as i32,
            Binop::Or => (lhs != 0 || rhs != 0) as i32,
        };
        self.stack.push(Word::int(result))
    }

    fn exec_string(&mut self) -> Result<(), VmError> {
        let offset = self.operand_index()?;
        let word = self.runtime.alloc_string(self.image.get_string(offset)?)?;
        self.stack.push(word)
    }

    fn exec_sexp(&mut self) -> Result<(), VmError> {
        let name_offset = self.operand_index()?;
        let arity = self.operand_index()?;
        let tag = self.runtime.tag_hash(self.image.get_string(name_offset)?);
        let elements = self.pop_block(arity)?;
        let word = self.runtime.alloc_sexp(tag, elements)?;
        self.stack.push(word)
    }

    /// The STA branch is keyed on the tag bit of the second popped
    /// word: an immediate integer selects the three-operand element
    /// store, a reference the two-operand store through a variable
    /// address produced by LDA. This overload is a compatibility
    /// contract with the instruction set.
    fn exec_sta(&mut self) -> Result<(), VmError> {
        let value = self.stack.pop()?;
        let target = self.stack.pop()?;
        match target.kind() {
            WordKind::Int(index) => {
                let container = self.stack.pop()?;
                self.runtime.set_element(container, index, value)?;
            }
            WordKind::Reference(_) => {
                let (kind, pos) = decode_location(target);
                self.store_location(kind, pos, value)?;
            }
        }
        self.stack.push(value)
    }

    fn exec_elem(&mut self) -> Result<(), VmError> {
        let index = self.stack.pop()?;
        let container = self.stack.pop()?;
        let element = self.runtime.element(container, index.as_int())?;
        self.stack.push(element)
    }

    fn exec_ld(&mut self, kind: LocationKind) -> Result<(), VmError> {
        let pos = self.operand_index()?;
        let value = self.load_location(kind, pos)?;
        self.stack.push(value)
    }

    fn exec_lda(&mut self, kind: LocationKind) -> Result<(), VmError> {
        let pos = self.operand_index()?;
        self.stack.push(location_word(kind, pos))
    }

    fn exec_st(&mut self, kind: LocationKind) -> Result<(), VmError> {
        let pos = self.operand_index()?;
        // Assignment is an expression: the stored value stays on top.
        let value = self.stack.pop()?;
        self.store_location(kind, pos, value)?;
        self.stack.push(value)
    }

    fn exec_cjmp(&mut self, jump_if_zero: bool) -> Result<(), VmError> {
        let target = self.operand_index()?;
        let value = self.stack.pop()?.as_int();
        if (value == 0) == jump_if_zero {
            self.ip = target;
        }
        Ok(())
    }

    fn exec_begin(&mut self) -> Result<(), VmError> {
        let nargs = self.operand_index()?;
        let nlocals = self.operand_index()?;
        self.stack.prologue(nlocals, nargs)
    }

    fn exec_closure(&mut self) -> Result<(), VmError> {
        let entry = self.operand_index()?;
        let count = self.operand_index()?;
        let mut captured = Vec::with_capacity(count);
        for _ in 0..count {
            let at = self.ip;
            let kind_byte = self.next_byte()?;
            let kind = LocationKind::try_from(kind_byte)
                .map_err(|_| VmError::InvalidLocationKind { kind: kind_byte, at })?;
            let pos = self.operand_index()?;
            captured.push(self.load_location(kind, pos)?);
        }
        let word = self.runtime.alloc_closure(entry, captured)?;
        self.stack.push(word)
    }

    fn exec_callc(&mut self) -> Result<(), VmError> {
        let nargs = self.operand_index()?;
        // The closure sits under its n arguments, pushed first.
        let closure = self.stack.nth(nargs)?;
        let entry = self.runtime.closure_entry(closure)?;
        self.stack.reverse(nargs)?;
        self.stack.push(Word::from_raw(self.ip as i32))?;
        // The closure slot acts as one extra trailing argument.
        self.stack.push(Word::from_raw(nargs as i32 + 1))?;
        log::debug!("callc -> {entry:#x} ({nargs} args)");
        self.ip = entry;
        Ok(())
    }

    fn exec_call(&mut self) -> Result<(), VmError> {
        let target = self.operand_index()?;
        let nargs = self.operand_index()?;
        self.stack.reverse(nargs)?;
        self.stack.push(Word::from_raw(self.ip as i32))?;
        self.stack.push(Word::from_raw(nargs as i32))?;
        log::debug!("call -> {target:#x} ({nargs} args)");
        self.ip = target;
        Ok(())
    }

    fn exec_tag(&mut self) -> Result<(), VmError> {
        let name_offset = self.operand_index()?;
        let arity = self.operand_index()?;
        let tag = self.runtime.tag_hash(self.image.get_string(name_offset)?);
        let value = self.stack.pop()?;
        let matched = self.runtime.sexp_matches(value, tag, arity);
        self.stack.push(Word::int(matched as i32))
    }

    fn exec_array(&mut self) -> Result<(), VmError> {
        let len = self.operand_index()?;
        let value = self.stack.pop()?;
        let matched = self.runtime.array_has_length(value, len);
        self.stack.push(Word::int(matched as i32))
    }

    fn exec_patt(&mut self, pattern: Pattern) -> Result<(), VmError> {
        let result = match pattern {
            Pattern::StrEq => {
                let left = self.stack.pop()?;
                let right = self.stack.pop()?;
                self.runtime.string_eq(left, right)?
            }
            Pattern::String => {
                let value = self.stack.pop()?;
                self.runtime.is_string(value)
            }
            Pattern::Array => {
                let value = self.stack.pop()?;
                self.runtime.is_array(value)
            }
            Pattern::Sexp => {
                let value = self.stack.pop()?;
                self.runtime.is_sexp(value)
            }
            Pattern::Boxed => self.stack.pop()?.is_reference(),
            Pattern::Unboxed => self.stack.pop()?.is_int(),
            Pattern::Closure => {
                let value = self.stack.pop()?;
                self.runtime.is_closure(value)
            }
        };
        self.stack.push(Word::int(result as i32))
    }

    fn exec_barray(&mut self) -> Result<(), VmError> {
        let len = self.operand_index()?;
        let elements = self.pop_block(len)?;
        let word = self.runtime.alloc_array(elements)?;
        self.stack.push(word)
    }

    // ---- variable locations ----

    fn load_location(&mut self, kind: LocationKind, pos: usize) -> Result<Word, VmError> {
        match kind {
            LocationKind::Global => {
                self.globals
                    .get(pos)
                    .copied()
                    .ok_or(VmError::GlobalOutOfRange {
                        index: pos,
                        size: self.globals.len(),
                    })
            }
            LocationKind::Local => self.stack.local(pos),
            LocationKind::Argument => self.stack.arg(pos),
            LocationKind::Captured => {
                let closure = self.stack.current_closure()?;
                Ok(self.runtime.closure_captured(closure, pos)?)
            }
        }
    }

    fn store_location(
        &mut self,
        kind: LocationKind,
        pos: usize,
        value: Word,
    ) -> Result<(), VmError> {
        match kind {
            LocationKind::Global => {
                let size = self.globals.len();
                let slot = self
                    .globals
                    .get_mut(pos)
                    .ok_or(VmError::GlobalOutOfRange { index: pos, size })?;
                *slot = value;
                Ok(())
            }
            LocationKind::Local => self.stack.set_local(pos, value),
            LocationKind::Argument => self.stack.set_arg(pos, value),
            LocationKind::Captured => {
                let closure = self.stack.current_closure()?;
                self.runtime.closure_set_captured(closure, pos, value)?;
                Ok(())
            }
        }
    }
}

/// Encode a variable location as a reference-tagged word for LDA. Only
/// the STA store-through-address branch ever decodes one.
fn location_word(kind: LocationKind, pos: usize) -> Word {
    Word::from_raw((((pos as i32) << 2) | kind as i32) << 1)
}

fn decode_location(word: Word) -> (LocationKind, usize) {
    let bits = word.raw() >> 1;
    let kind = match bits & 0b11 {
        0 => LocationKind::Global,
        1 => LocationKind::Local,
        2 => LocationKind::Argument,
        _ => LocationKind::Captured,
    };
    (kind, (bits >> 2) as usize)
}
