//! JIT compilation for tape programs.
//!
//! This module provides the native code path:
//! - Code buffer with in-place rel32 patching
//! - x86-64 instruction encoding
//! - The emitter trait and its x86-64 implementation
//! - The single-pass backpatching compiler
//! - Executable memory allocation

pub mod codebuf;
pub mod compiler;
pub mod emitter;
pub mod memory;
pub mod x86_64;

pub use codebuf::{CodeBuffer, PatchError};
pub use compiler::{Assembly, CompileError, CompiledProgram, EntryPoint, JitCompiler, host_supported};
pub use emitter::{Backpatch, TapeEmitter, X86_64Emitter};
pub use memory::{ExecutableMemory, MemoryError};
