//! The managed call stack and activation-record layout.
//!
//! The stack is one owned buffer of tagged words indexed by a frame
//! pointer; call/return never touches the host's native stack, so
//! recursion depth is bounded only by the configured capacity.
//!
//! Activation record, in push order:
//!
//! ```text
//! arguments (reversed into callee order)
//! return address   (raw word, negative = no caller)
//! argument count   (raw word)
//! saved frame pointer  <- fp
//! locals (boxed zero on entry)
//! operand temporaries
//! ```
//!
//! `local(pos)` addresses slots above `fp`, `arg(pos)` slots below it
//! past the two bookkeeping cells. Saved frame pointers form a chain
//! ending in a sentinel frame pushed at construction; returning from
//! the sentinel yields no resume address, which halts the interpreter.

use lama_common::Word;

use crate::error::VmError;

/// Raw return-address value marking "no caller".
const NO_RETURN: i32 = -1;

/// Number of bookkeeping cells between the frame pointer and the
/// argument slots (saved fp is at `fp` itself, then nargs, then the
/// return address).
const FRAME_LINK_CELLS: usize = 3;

/// A bounded stack of tagged words with frame management.
#[derive(Debug)]
pub struct CallStack {
    data: Vec<Word>,
    fp: usize,
    capacity: usize,
}

impl CallStack {
    /// Create a stack holding at most `capacity` words, with the
    /// sentinel frame (no caller, zero arguments) already in place.
    pub fn new(capacity: usize) -> Self {
        let mut data = Vec::with_capacity(capacity.min(4096));
        data.push(Word::from_raw(NO_RETURN));
        data.push(Word::from_raw(0));
        CallStack {
            data,
            fp: 1,
            capacity,
        }
    }

    /// Number of words currently on the stack.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if only the sentinel bookkeeping remains.
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 2
    }

    /// Push one word.
    pub fn push(&mut self, value: Word) -> Result<(), VmError> {
        if self.data.len() >= self.capacity {
            return Err(VmError::StackOverflow {
                capacity: self.capacity,
            });
        }
        self.data.push(value);
        Ok(())
    }

    /// Pop one word, refusing to cross the active frame boundary.
    pub fn pop(&mut self) -> Result<Word, VmError> {
        if self.data.len() <= self.fp + 1 {
            return Err(VmError::IllegalPop);
        }
        self.data.pop().ok_or(VmError::IllegalPop)
    }

    /// Pop without the frame-isolation check. Only the epilogue uses
    /// this, on bookkeeping cells the layout invariant guarantees exist.
    fn pop_unchecked(&mut self) -> Result<Word, VmError> {
        self.data.pop().ok_or(VmError::IllegalPop)
    }

    /// Peek at the word `n` positions below the top without removing it.
    pub fn nth(&self, n: usize) -> Result<Word, VmError> {
        let index = self
            .data
            .len()
            .checked_sub(n + 1)
            .ok_or(VmError::IllegalPop)?;
        if index <= self.fp {
            return Err(VmError::IllegalPop);
        }
        Ok(self.data[index])
    }

    /// Discard the top `n` words.
    pub fn drop_words(&mut self, n: usize) -> Result<(), VmError> {
        let new_len = self
            .data
            .len()
            .checked_sub(n)
            .ok_or(VmError::IllegalPop)?;
        if new_len <= self.fp {
            return Err(VmError::IllegalPop);
        }
        self.data.truncate(new_len);
        Ok(())
    }

    /// Push `value` `n` times.
    pub fn fill(&mut self, n: usize, value: Word) -> Result<(), VmError> {
        for _ in 0..n {
            self.push(value)?;
        }
        Ok(())
    }

    /// Reverse the top `n` words in place. Self-inverse; 0 and 1 are
    /// no-ops. Converts push-time argument order into callee order.
    pub fn reverse(&mut self, n: usize) -> Result<(), VmError> {
        if n <= 1 {
            return Ok(());
        }
        let start = self
            .data
            .len()
            .checked_sub(n)
            .ok_or(VmError::IllegalPop)?;
        if start <= self.fp {
            return Err(VmError::IllegalPop);
        }
        self.data[start..].reverse();
        Ok(())
    }

    /// Establish a new activation record: save the frame pointer, point
    /// it at the saved cell, and zero-fill the local slots. The caller
    /// has already pushed the arguments, return address and `nargs`.
    pub fn prologue(&mut self, nlocals: usize, nargs: usize) -> Result<(), VmError> {
        log::trace!("prologue: {nargs} args, {nlocals} locals");
        self.push(Word::from_raw(self.fp as i32))?;
        self.fp = self.data.len() - 1;
        self.fill(nlocals, Word::int(0))
    }

    /// Unwind the active record: pop the return value, discard the
    /// frame, restore the caller's frame pointer, drop the recorded
    /// argument words and push the return value back.
    ///
    /// Returns the resume address, or `None` when the frame had no
    /// caller (the sentinel), which halts execution.
    pub fn epilogue(&mut self) -> Result<Option<usize>, VmError> {
        let return_value = self.pop()?;
        self.data.truncate(self.fp + 1);

        let saved_fp = self.pop_unchecked()?;
        let nargs = self.pop_unchecked()?.raw() as usize;
        let return_address = self.pop_unchecked()?.raw();
        self.fp = saved_fp.raw() as usize;

        let new_len = self
            .data
            .len()
            .checked_sub(nargs)
            .ok_or(VmError::IllegalPop)?;
        self.data.truncate(new_len);
        self.push(return_value)?;

        log::trace!("epilogue: resume at {return_address:#x}");
        if return_address < 0 {
            Ok(None)
        } else {
            Ok(Some(return_address as usize))
        }
    }

    /// Read the local slot `pos` of the active frame.
    pub fn local(&self, pos: usize) -> Result<Word, VmError> {
        Ok(self.data[self.local_index(pos)?])
    }

    /// Write the local slot `pos` of the active frame.
    pub fn set_local(&mut self, pos: usize, value: Word) -> Result<(), VmError> {
        let index = self.local_index(pos)?;
        self.data[index] = value;
        Ok(())
    }

    /// Read the argument slot `pos` of the active frame.
    pub fn arg(&self, pos: usize) -> Result<Word, VmError> {
        Ok(self.data[self.arg_index(pos)?])
    }

    /// Write the argument slot `pos` of the active frame.
    pub fn set_arg(&mut self, pos: usize, value: Word) -> Result<(), VmError> {
        let index = self.arg_index(pos)?;
        self.data[index] = value;
        Ok(())
    }

    /// Arguments recorded for the active frame.
    pub fn nargs(&self) -> usize {
        // fp >= 1 always; the cell below the saved fp holds the count.
        self.data[self.fp - 1].raw() as usize
    }

    /// The closure reference the active frame was entered through. By
    /// the CALLC convention it sits in the last argument slot.
    pub fn current_closure(&self) -> Result<Word, VmError> {
        let nargs = self.nargs();
        if nargs == 0 {
            return Err(VmError::ArgOutOfFrame { pos: 0, nargs: 0 });
        }
        self.arg(nargs - 1)
    }

    fn local_index(&self, pos: usize) -> Result<usize, VmError> {
        let index = self.fp + 1 + pos;
        if index >= self.data.len() {
            return Err(VmError::LocalOutOfFrame { pos });
        }
        Ok(index)
    }

    fn arg_index(&self, pos: usize) -> Result<usize, VmError> {
        let nargs = self.nargs();
        if pos >= nargs {
            return Err(VmError::ArgOutOfFrame { pos, nargs });
        }
        self.fp
            .checked_sub(FRAME_LINK_CELLS + pos)
            .ok_or(VmError::ArgOutOfFrame { pos, nargs })
    }
}
