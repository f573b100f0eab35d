//! In-memory object store implementing the [`Runtime`] trait.
//!
//! Objects live in an append-only table; a reference word carries the
//! table index. There is deliberately no collector — the store grows
//! for the lifetime of one interpreter instance. Input and output are
//! pluggable streams, so tests run against byte buffers and the CLI
//! runs against stdio.

use std::io::{BufRead, BufReader, Stdin, Stdout, Write};

use lama_common::{Word, WordKind};

use crate::runtime::{Runtime, RuntimeError};

/// Mask keeping tag hashes inside 25 bits, so they always box cleanly.
const TAG_HASH_MASK: i32 = (1 << 25) - 1;

#[derive(Debug, Clone)]
enum Object {
    Str(Vec<u8>),
    Array(Vec<Word>),
    Sexp { tag: i32, fields: Vec<Word> },
    Closure { entry: usize, captured: Vec<Word> },
}

impl Object {
    fn shape(&self) -> &'static str {
        match self {
            Object::Str(_) => "string",
            Object::Array(_) => "array",
            Object::Sexp { .. } => "sexp",
            Object::Closure { .. } => "closure",
        }
    }
}

/// A growable heap over pluggable input/output streams.
pub struct Heap<In, Out> {
    objects: Vec<Object>,
    input: In,
    output: Out,
}

impl Heap<BufReader<Stdin>, Stdout> {
    /// A heap wired to the process's standard streams.
    pub fn stdio() -> Self {
        Heap::new(BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<In: BufRead, Out: Write> Heap<In, Out> {
    /// Create an empty heap reading from `input` and writing to `output`.
    pub fn new(input: In, output: Out) -> Self {
        Heap {
            objects: Vec::new(),
            input,
            output,
        }
    }

    /// Consume the heap and hand back its output stream.
    pub fn into_output(self) -> Out {
        self.output
    }

    /// Number of live objects. Diagnostic only.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn alloc(&mut self, object: Object) -> Word {
        self.objects.push(object);
        Word::reference(self.objects.len() - 1)
    }

    fn object(&self, word: Word) -> Result<&Object, RuntimeError> {
        match word.kind() {
            WordKind::Int(n) => Err(RuntimeError::NotAReference(n)),
            WordKind::Reference(h) => self.objects.get(h).ok_or(RuntimeError::BadHandle(h)),
        }
    }

    fn object_mut(&mut self, word: Word) -> Result<&mut Object, RuntimeError> {
        match word.kind() {
            WordKind::Int(n) => Err(RuntimeError::NotAReference(n)),
            WordKind::Reference(h) => self.objects.get_mut(h).ok_or(RuntimeError::BadHandle(h)),
        }
    }

    fn closure(&self, word: Word) -> Result<(usize, &[Word]), RuntimeError> {
        match self.object(word)? {
            Object::Closure { entry, captured } => Ok((*entry, captured)),
            _ => Err(RuntimeError::WrongShape {
                expected: "closure",
                handle: word.handle(),
            }),
        }
    }

    fn render(&self, word: Word) -> Result<String, RuntimeError> {
        match word.kind() {
            WordKind::Int(n) => Ok(n.to_string()),
            WordKind::Reference(_) => match self.object(word)? {
                Object::Str(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
                Object::Array(fields) => {
                    let parts = fields
                        .iter()
                        .map(|&f| self.render(f))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(format!("[{}]", parts.join(", ")))
                }
                // The tag hash is one-way, so structures print the hash.
                Object::Sexp { tag, fields } => {
                    let parts = fields
                        .iter()
                        .map(|&f| self.render(f))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(format!("`{:#09x} ({})", tag, parts.join(", ")))
                }
                Object::Closure { entry, .. } => Ok(format!("<closure {entry:#x}>")),
            },
        }
    }
}

impl<In: BufRead, Out: Write> Runtime for Heap<In, Out> {
    fn alloc_string(&mut self, bytes: &[u8]) -> Result<Word, RuntimeError> {
        Ok(self.alloc(Object::Str(bytes.to_vec())))
    }

    fn alloc_array(&mut self, elements: Vec<Word>) -> Result<Word, RuntimeError> {
        Ok(self.alloc(Object::Array(elements)))
    }

    fn alloc_sexp(&mut self, tag: i32, elements: Vec<Word>) -> Result<Word, RuntimeError> {
        Ok(self.alloc(Object::Sexp {
            tag,
            fields: elements,
        }))
    }

    fn alloc_closure(&mut self, entry: usize, captured: Vec<Word>) -> Result<Word, RuntimeError> {
        Ok(self.alloc(Object::Closure { entry, captured }))
    }

    fn element(&self, container: Word, index: i32) -> Result<Word, RuntimeError> {
        let out_of_bounds = |length| RuntimeError::IndexOutOfBounds { index, length };
        let i = usize::try_from(index).map_err(|_| out_of_bounds(0))?;
        match self.object(container)? {
            Object::Str(bytes) => bytes
                .get(i)
                .map(|&b| Word::int(b as i32))
                .ok_or(out_of_bounds(bytes.len())),
            Object::Array(fields) | Object::Sexp { fields, .. } => {
                fields.get(i).copied().ok_or(out_of_bounds(fields.len()))
            }
            Object::Closure { .. } => Err(RuntimeError::WrongShape {
                expected: "indexable container",
                handle: container.handle(),
            }),
        }
    }

    fn set_element(
        &mut self,
        container: Word,
        index: i32,
        value: Word,
    ) -> Result<(), RuntimeError> {
        let out_of_bounds = |length| RuntimeError::IndexOutOfBounds { index, length };
        let i = usize::try_from(index).map_err(|_| out_of_bounds(0))?;
        let handle = container.handle();
        match self.object_mut(container)? {
            Object::Str(bytes) => {
                let len = bytes.len();
                let cell = bytes.get_mut(i).ok_or(out_of_bounds(len))?;
                *cell = (value.as_int() & 0xFF) as u8;
                Ok(())
            }
            Object::Array(fields) | Object::Sexp { fields, .. } => {
                let len = fields.len();
                let cell = fields.get_mut(i).ok_or(out_of_bounds(len))?;
                *cell = value;
                Ok(())
            }
            Object::Closure { .. } => Err(RuntimeError::WrongShape {
                expected: "indexable container",
                handle,
            }),
        }
    }

    fn closure_entry(&self, closure: Word) -> Result<usize, RuntimeError> {
        Ok(self.closure(closure)?.0)
    }

    fn closure_captured(&self, closure: Word, index: usize) -> Result<Word, RuntimeError> {
        let (_, captured) = self.closure(closure)?;
        captured
            .get(index)
            .copied()
            .ok_or(RuntimeError::IndexOutOfBounds {
                index: index as i32,
                length: captured.len(),
            })
    }

    fn closure_set_captured(
        &mut self,
        closure: Word,
        index: usize,
        value: Word,
    ) -> Result<(), RuntimeError> {
        let handle = closure.handle();
        match self.object_mut(closure)? {
            Object::Closure { captured, .. } => {
                let len = captured.len();
                let cell = captured
                    .get_mut(index)
                    .ok_or(RuntimeError::IndexOutOfBounds {
                        index: index as i32,
                        length: len,
                    })?;
                *cell = value;
                Ok(())
            }
            _ => Err(RuntimeError::WrongShape {
                expected: "closure",
                handle,
            }),
        }
    }

    fn length(&self, container: Word) -> Result<usize, RuntimeError> {
        match self.object(container)? {
            Object::Str(bytes) => Ok(bytes.len()),
            Object::Array(fields) | Object::Sexp { fields, .. } => Ok(fields.len()),
            Object::Closure { captured, .. } => Ok(captured.len()),
        }
    }

    fn string_eq(&self, a: Word, b: Word) -> Result<bool, RuntimeError> {
        match (self.object(a)?, self.object(b)?) {
            (Object::Str(left), Object::Str(right)) => Ok(left == right),
            _ => Ok(false),
        }
    }

    fn is_string(&self, word: Word) -> bool {
        matches!(self.object(word), Ok(Object::Str(_)))
    }

    fn is_array(&self, word: Word) -> bool {
        matches!(self.object(word), Ok(Object::Array(_)))
    }

    fn is_sexp(&self, word: Word) -> bool {
        matches!(self.object(word), Ok(Object::Sexp { .. }))
    }

    fn is_closure(&self, word: Word) -> bool {
        matches!(self.object(word), Ok(Object::Closure { .. }))
    }

    fn sexp_matches(&self, word: Word, tag: i32, arity: usize) -> bool {
        matches!(
            self.object(word),
            Ok(Object::Sexp { tag: t, fields }) if *t == tag && fields.len() == arity
        )
    }

    fn array_has_length(&self, word: Word, len: usize) -> bool {
        matches!(self.object(word), Ok(Object::Array(fields)) if fields.len() == len)
    }

    fn to_text(&mut self, word: Word) -> Result<Word, RuntimeError> {
        let text = self.render(word)?;
        self.alloc_string(text.as_bytes())
    }

    fn tag_hash(&self, name: &[u8]) -> i32 {
        // Identifier characters pack into 6 bits each; the low 25 bits
        // are kept so the hash survives the integer tag shift.
        let mut hash: i32 = 0;
        for &byte in name {
            let code = match byte {
                b'_' => 0,
                b'a'..=b'z' => 1 + (byte - b'a') as i32,
                b'A'..=b'Z' => 27 + (byte - b'A') as i32,
                b'0'..=b'9' => 53 + (byte - b'0') as i32,
                _ => 63,
            };
            hash = ((hash << 6) | code) & TAG_HASH_MASK;
        }
        hash
    }

    fn read(&mut self) -> Result<Word, RuntimeError> {
        write!(self.output, "> ")?;
        self.output.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        let trimmed = line.trim();
        trimmed
            .parse::<i32>()
            .map(Word::int)
            .map_err(|_| RuntimeError::MalformedInput(trimmed.to_string()))
    }

    fn write(&mut self, value: Word) -> Result<Word, RuntimeError> {
        match value.kind() {
            WordKind::Int(n) => {
                writeln!(self.output, "{n}")?;
                Ok(Word::int(0))
            }
            WordKind::Reference(_) => Err(RuntimeError::NotAnInteger),
        }
    }
}
