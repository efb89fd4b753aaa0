//! Code buffer for building JIT code.
//!
//! Machine code is appended here in emission order. Loop branches are emitted
//! with a zeroed rel32 field and patched in place once the target is known.

use super::memory::{ExecutableMemory, MemoryError};

/// A buffer for building machine code.
#[derive(Debug, Default)]
pub struct CodeBuffer {
    code: Vec<u8>,
}

/// Error returned when a displacement patch cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The rel32 field at `offset` does not lie inside the buffer.
    OutOfBounds { offset: usize, len: usize },
    /// The displacement does not fit in a signed 32-bit field.
    OutOfRange { offset: usize, displacement: i64 },
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchError::OutOfBounds { offset, len } => {
                write!(f, "patch at offset {} is outside code buffer of {} bytes", offset, len)
            }
            PatchError::OutOfRange {
                offset,
                displacement,
            } => write!(
                f,
                "displacement {} at offset {} does not fit in 32 bits",
                displacement, offset
            ),
        }
    }
}

impl std::error::Error for PatchError {}

impl CodeBuffer {
    /// Create a new empty code buffer.
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    /// Create a new code buffer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Current emission position, as a byte offset from the buffer start.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    pub fn emit_u8(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Emit a 32-bit value (little-endian).
    pub fn emit_u32(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    /// Read back the rel32 field stored at `offset`.
    pub fn read_rel32(&self, offset: usize) -> Option<i32> {
        let field = self.code.get(offset..offset.checked_add(4)?)?;
        Some(i32::from_le_bytes([field[0], field[1], field[2], field[3]]))
    }

    /// Overwrite the rel32 field at `offset` so that it reaches `target`.
    ///
    /// The displacement is relative to the end of the field, which is where
    /// x86-64 near branches measure from.
    pub fn patch_rel32(&mut self, offset: usize, target: usize) -> Result<(), PatchError> {
        let len = self.code.len();
        let end = offset
            .checked_add(4)
            .filter(|end| *end <= len)
            .ok_or(PatchError::OutOfBounds { offset, len })?;

        let displacement = target as i64 - end as i64;
        let rel = i32::try_from(displacement).map_err(|_| PatchError::OutOfRange {
            offset,
            displacement,
        })?;
        self.code[offset..end].copy_from_slice(&rel.to_le_bytes());
        Ok(())
    }

    /// Copy the finished code into a fresh mapping and make it executable.
    pub fn finalize(self) -> Result<ExecutableMemory, MemoryError> {
        let mut mem = ExecutableMemory::new(self.code.len())?;
        mem.write(0, &self.code)?;
        mem.make_executable()?;
        Ok(mem)
    }

    /// Get the code bytes (for inspection).
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn into_code(self) -> Vec<u8> {
        self.code
    }
}
