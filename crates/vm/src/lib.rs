//! Lama bytecode interpreter — a stack machine with an explicit,
//! bounded call stack.
//!
//! The machine executes the compact (family, sub-opcode) instruction
//! set over 32-bit tagged words: immediate integers carry their value
//! shifted past a tag bit, heap references delegate to an external
//! [`Runtime`] for allocation and inspection. Call and return live
//! entirely on the managed [`CallStack`], so recursion depth is bounded
//! by configured capacity rather than the host stack.
//!
//! # Usage
//!
//! ```
//! use lama_bytefile::Bytefile;
//! use lama_vm::{run, Heap};
//! use std::io::Cursor;
//!
//! // CONST 42; CALL Lwrite; DROP; STOP
//! let mut code = vec![0x10];
//! code.extend_from_slice(&42i32.to_le_bytes());
//! code.extend_from_slice(&[0x71, 0x18, 0xF0]);
//!
//! let image = Bytefile::from_parts(code, vec![], vec![], 0);
//! let heap = run(&image, Heap::new(Cursor::new(vec![]), Vec::new())).unwrap();
//! assert_eq!(heap.into_output(), b"42\n");
//! ```

pub mod callstack;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod runtime;

pub use callstack::CallStack;
pub use error::VmError;
pub use heap::Heap;
pub use interpreter::{Interpreter, DEFAULT_STACK_CAPACITY};
pub use runtime::{Runtime, RuntimeError};

use lama_bytefile::Bytefile;

/// Execute an image to completion and hand back the runtime.
///
/// This is the primary embedding entry point: it builds an interpreter
/// with the default stack capacity, runs until STOP or an exhausted
/// call chain, and returns the runtime so the caller can inspect what
/// the program produced.
///
/// # Errors
///
/// Returns [`VmError`] on any fatal condition (invalid opcode, stack
/// overflow, explicit failure, ...). Fatal errors are not recoverable:
/// the bytecode language has no exception construct.
pub fn run<R: Runtime>(image: &Bytefile, runtime: R) -> Result<R, VmError> {
    let mut interpreter = Interpreter::new(image, runtime);
    interpreter.run()?;
    Ok(interpreter.into_runtime())
}
