//! Lama bytecode container (`.bc`) parsing.
//!
//! File layout, all integers little-endian 32-bit:
//!
//! ```text
//! [stringtab_size][global_area_size][public_symbols_number]
//! [public symbol table: public_symbols_number x (name offset, code offset)]
//! [string table: stringtab_size bytes of NUL-delimited strings]
//! [code: remaining bytes]
//! ```
//!
//! All declared region sizes are validated against the actual file
//! length up front, before any instruction executes.

use std::fs;
use std::path::Path;

use thiserror::Error;

/// Size in bytes of the three-field header.
const HEADER_SIZE: usize = 3 * 4;

/// Errors from loading or inspecting a bytecode container.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file is missing or unreadable.
    #[error("cannot read bytecode file: {0}")]
    Io(#[from] std::io::Error),

    /// The file ends before the three header fields.
    #[error("file too short for header: {0} bytes")]
    TruncatedHeader(usize),

    /// A header field is negative.
    #[error("negative {field} in header: {value}")]
    NegativeHeaderField { field: &'static str, value: i32 },

    /// The declared regions do not fit in the file.
    #[error("declared regions exceed file size: need {needed} bytes, have {actual}")]
    TruncatedBody { needed: usize, actual: usize },

    /// A string-table offset points outside the table.
    #[error("string offset {0} out of bounds")]
    BadStringOffset(usize),

    /// A string-table entry runs off the end without a NUL terminator.
    #[error("unterminated string at offset {0}")]
    UnterminatedString(usize),

    /// A public-symbol index is out of range.
    #[error("public symbol index {index} out of range ({count} symbols)")]
    BadPublicIndex { index: usize, count: usize },
}

/// One entry of the public-symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicSymbol {
    /// Offset of the symbol's name in the string table.
    pub name_offset: usize,
    /// Offset of the symbol's code in the code region.
    pub code_offset: usize,
}

/// A parsed, immutable bytecode image.
///
/// The mutable global area it sizes is owned by the interpreter, not by
/// the image, so several interpreter instances can share one image.
#[derive(Debug, Clone)]
pub struct Bytefile {
    publics: Vec<PublicSymbol>,
    string_table: Vec<u8>,
    code: Vec<u8>,
    global_area_size: usize,
}

impl Bytefile {
    /// Read and parse a bytecode file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let bytes = fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Parse an in-memory bytecode container.
    pub fn parse(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() < HEADER_SIZE {
            return Err(LoadError::TruncatedHeader(bytes.len()));
        }

        let stringtab_size = read_header_field(bytes, 0, "string table size")?;
        let global_area_size = read_header_field(bytes, 1, "global area size")?;
        let public_symbols_number = read_header_field(bytes, 2, "public symbol count")?;

        let publics_size = public_symbols_number * 2 * 4;
        let needed = HEADER_SIZE + publics_size + stringtab_size;
        if bytes.len() < needed {
            return Err(LoadError::TruncatedBody {
                needed,
                actual: bytes.len(),
            });
        }

        let mut publics = Vec::with_capacity(public_symbols_number);
        for i in 0..public_symbols_number {
            let base = HEADER_SIZE + i * 8;
            publics.push(PublicSymbol {
                name_offset: read_i32(bytes, base) as u32 as usize,
                code_offset: read_i32(bytes, base + 4) as u32 as usize,
            });
        }

        let strings_start = HEADER_SIZE + publics_size;
        let code_start = strings_start + stringtab_size;

        Ok(Bytefile {
            publics,
            string_table: bytes[strings_start..code_start].to_vec(),
            code: bytes[code_start..].to_vec(),
            global_area_size,
        })
    }

    /// Assemble an image from already-split regions. Used by embedders
    /// and tests that build code in memory instead of loading a file.
    pub fn from_parts(
        code: Vec<u8>,
        string_table: Vec<u8>,
        publics: Vec<PublicSymbol>,
        global_area_size: usize,
    ) -> Self {
        Bytefile {
            publics,
            string_table,
            code,
            global_area_size,
        }
    }

    /// The NUL-terminated string starting at `offset`, without the NUL.
    pub fn get_string(&self, offset: usize) -> Result<&[u8], LoadError> {
        let tail = self
            .string_table
            .get(offset..)
            .ok_or(LoadError::BadStringOffset(offset))?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(LoadError::UnterminatedString(offset))?;
        Ok(&tail[..len])
    }

    /// Name of the i-th public symbol.
    pub fn get_public_name(&self, i: usize) -> Result<&[u8], LoadError> {
        self.get_string(self.public(i)?.name_offset)
    }

    /// Code offset of the i-th public symbol.
    pub fn get_public_offset(&self, i: usize) -> Result<usize, LoadError> {
        Ok(self.public(i)?.code_offset)
    }

    /// All public symbols in table order.
    pub fn publics(&self) -> &[PublicSymbol] {
        &self.publics
    }

    /// The executable code region.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Number of global-variable slots the program expects.
    pub fn global_area_size(&self) -> usize {
        self.global_area_size
    }

    fn public(&self, i: usize) -> Result<&PublicSymbol, LoadError> {
        self.publics.get(i).ok_or(LoadError::BadPublicIndex {
            index: i,
            count: self.publics.len(),
        })
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(field)
}

fn read_header_field(bytes: &[u8], index: usize, name: &'static str) -> Result<usize, LoadError> {
    let value = read_i32(bytes, index * 4);
    usize::try_from(value).map_err(|_| LoadError::NegativeHeaderField { field: name, value })
}
