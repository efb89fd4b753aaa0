//! bfjit - a single-pass JIT compiler for the eight-symbol tape language
//!
//! Source bytes are folded into ops, emitted as x86-64 machine code with
//! loop branches backpatched in place, mapped into executable memory and
//! called with a pointer to a fresh 30000-cell tape.

pub mod compiler;
pub mod config;
pub mod error;
pub mod jit;
pub mod tape;

// Re-export commonly used types
pub use compiler::{Op, Program, compile, run_file, run_source};
pub use config::{FoldMode, RuntimeConfig, TimingsFormat};
pub use error::Error;
pub use tape::{TAPE_SIZE, Tape};
