//! Crate-level error type.

use crate::jit::{CompileError, MemoryError};
use std::io;
use std::path::PathBuf;

/// Any failure of a compile-and-run cycle.
#[derive(Debug)]
pub enum Error {
    /// The source file could not be read.
    Io { path: PathBuf, source: io::Error },
    Compile(CompileError),
    Memory(MemoryError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Error::Compile(e) => write!(f, "compile error: {}", e),
            Error::Memory(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { source, .. } => Some(source),
            Error::Compile(e) => Some(e),
            Error::Memory(e) => Some(e),
        }
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<MemoryError> for Error {
    fn from(e: MemoryError) -> Self {
        Error::Memory(e)
    }
}
