//! Backpatch-driven JIT compiler for tape programs.
//!
//! One left-to-right pass over the ops. Each `[` emits a branch with an
//! empty displacement and pushes a [`Backpatch`]; the matching `]` pops it,
//! emits the backward branch, and fills in the forward displacement. Every
//! target is known the moment its counterpart is reached.

use super::codebuf::{CodeBuffer, PatchError};
use super::emitter::{Backpatch, TapeEmitter};
use super::memory::{ExecutableMemory, MemoryError};
use crate::compiler::ops::{Op, Program};
use crate::tape::Tape;

/// Native entry point: takes the tape base, returns nothing.
#[cfg(target_arch = "x86_64")]
pub type EntryPoint = unsafe extern "sysv64" fn(tape: *mut u8);
#[cfg(not(target_arch = "x86_64"))]
pub type EntryPoint = unsafe extern "C" fn(tape: *mut u8);

/// Whether generated code can run on this host.
pub const fn host_supported() -> bool {
    cfg!(all(target_arch = "x86_64", target_os = "linux"))
}

/// Error produced while emitting code for a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A `]` with no open `[`.
    UnmatchedLoopEnd { op_index: usize },
    /// A `[` still open at the end of the program.
    UnclosedLoopStart { op_index: usize },
    Patch(PatchError),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UnmatchedLoopEnd { op_index } => {
                write!(f, "unmatched ']' (op {})", op_index)
            }
            CompileError::UnclosedLoopStart { op_index } => {
                write!(f, "unclosed '[' (op {})", op_index)
            }
            CompileError::Patch(e) => write!(f, "branch patch failed: {}", e),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Patch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PatchError> for CompileError {
    fn from(e: PatchError) -> Self {
        CompileError::Patch(e)
    }
}

/// Emitted machine code that has not been mapped yet.
#[derive(Debug)]
pub struct Assembly {
    code: CodeBuffer,
    /// Byte offset where each op's code starts, plus one trailing entry for
    /// the final return.
    op_offsets: Vec<usize>,
}

impl Assembly {
    pub fn code(&self) -> &[u8] {
        self.code.code()
    }

    pub fn op_offsets(&self) -> &[usize] {
        &self.op_offsets
    }

    /// Copy the code into executable memory.
    pub fn load(self) -> Result<CompiledProgram, MemoryError> {
        if !host_supported() {
            return Err(MemoryError::Unsupported);
        }

        let code_len = self.code.len();
        let memory = self.code.finalize()?;
        // SAFETY: the buffer holds a complete routine following the
        // EntryPoint contract.
        let entry = unsafe { memory.as_fn::<EntryPoint>() }.ok_or_else(|| {
            MemoryError::ProtectionFailed(std::io::Error::other("region is not executable"))
        })?;

        Ok(CompiledProgram {
            memory,
            entry,
            code_len,
        })
    }
}

/// A program mapped into executable memory.
#[derive(Debug)]
pub struct CompiledProgram {
    memory: ExecutableMemory,
    entry: EntryPoint,
    code_len: usize,
}

impl CompiledProgram {
    /// Bytes of machine code.
    pub fn code_len(&self) -> usize {
        self.code_len
    }

    /// Bytes mapped for the code (whole pages).
    pub fn mapped_size(&self) -> usize {
        self.memory.size()
    }

    /// Run the program against `tape`. Blocks on `,` until input arrives.
    ///
    /// # Safety
    /// The tape pointer is not bounds-checked. The program must keep it
    /// within the tape; moving off either end and touching a cell is
    /// undefined behavior.
    pub unsafe fn run(&self, tape: &mut Tape) {
        // SAFETY: entry points at code emitted for EntryPoint; the tape
        // outlives the call and the caller vouches for pointer bounds.
        unsafe { (self.entry)(tape.as_mut_ptr()) }
    }
}

/// Single-pass compiler from ops to machine code.
pub struct JitCompiler<E: TapeEmitter> {
    emitter: E,
    buf: CodeBuffer,
    /// Open loops, innermost last.
    pending: Vec<Backpatch>,
    op_offsets: Vec<usize>,
}

impl<E: TapeEmitter> JitCompiler<E> {
    pub fn new(emitter: E) -> Self {
        Self {
            emitter,
            buf: CodeBuffer::new(),
            pending: Vec::new(),
            op_offsets: Vec::new(),
        }
    }

    /// Compile a program to machine code.
    pub fn compile(mut self, program: &Program) -> Result<Assembly, CompileError> {
        self.buf = CodeBuffer::with_capacity(program.len() * 8 + 16);
        self.op_offsets = Vec::with_capacity(program.len() + 1);

        self.emitter.emit_prologue(&mut self.buf);

        for (index, op) in program.ops().iter().enumerate() {
            self.op_offsets.push(self.buf.offset());
            self.compile_op(index, op)?;
        }

        if let Some(open) = self.pending.first() {
            return Err(CompileError::UnclosedLoopStart {
                op_index: self.op_index_at(open.placeholder),
            });
        }

        self.op_offsets.push(self.buf.offset());
        self.emitter.emit_return(&mut self.buf);

        Ok(Assembly {
            code: self.buf,
            op_offsets: self.op_offsets,
        })
    }

    fn compile_op(&mut self, index: usize, op: &Op) -> Result<(), CompileError> {
        let buf = &mut self.buf;
        match *op {
            Op::MoveRight(n) => self.emitter.emit_move(buf, n as i32),
            Op::MoveLeft(n) => self.emitter.emit_move(buf, -(n as i32)),
            Op::Increment(n) => self.emitter.emit_mutate(buf, n as i16),
            Op::Decrement(n) => self.emitter.emit_mutate(buf, -(n as i16)),
            Op::Output(n) => {
                for _ in 0..n {
                    self.emitter.emit_output(buf);
                }
            }
            Op::Input(n) => {
                for _ in 0..n {
                    self.emitter.emit_input(buf);
                }
            }
            Op::LoopStart => {
                let pending = self.emitter.emit_branch_if_zero(buf);
                self.pending.push(pending);
            }
            Op::LoopEnd { .. } => {
                let pending = self
                    .pending
                    .pop()
                    .ok_or(CompileError::UnmatchedLoopEnd { op_index: index })?;
                self.emitter.emit_branch_if_nonzero(buf, pending.origin)?;
                let after_loop = buf.offset();
                self.emitter.patch_branch(buf, pending, after_loop)?;
            }
        }
        Ok(())
    }

    /// Index of the op whose code contains byte `offset`.
    fn op_index_at(&self, offset: usize) -> usize {
        self.op_offsets
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse;
    use crate::config::FoldMode;
    use crate::jit::emitter::X86_64Emitter;

    fn assemble(source: &str) -> Result<Assembly, CompileError> {
        let program = parse(source.as_bytes(), FoldMode::On);
        JitCompiler::new(X86_64Emitter::default()).compile(&program)
    }

    /// Absolute target of the rel32 branch whose field ends at `end`.
    fn branch_target(asm: &Assembly, end: usize) -> usize {
        let field = &asm.code()[end - 4..end];
        let rel = i32::from_le_bytes([field[0], field[1], field[2], field[3]]);
        (end as i64 + rel as i64) as usize
    }

    /// Check every loop's displacements against the op offset map.
    fn check_loops(source: &str) {
        let program = parse(source.as_bytes(), FoldMode::On);
        let asm = JitCompiler::new(X86_64Emitter::default())
            .compile(&program)
            .unwrap();
        let offsets = asm.op_offsets();

        let mut checked = 0;
        for (end, op) in program.ops().iter().enumerate() {
            if let Op::LoopEnd { start: Some(start) } = *op {
                let body = offsets[start + 1];
                let after = offsets[end + 1];
                assert_eq!(branch_target(&asm, body), after, "forward branch of op {}", start);
                assert_eq!(branch_target(&asm, after), body, "backward branch of op {}", end);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_empty_program() {
        let asm = assemble("").unwrap();
        // mov rsi, rdi; ret
        assert_eq!(asm.code(), &[0x48, 0x89, 0xFE, 0xC3]);
        assert_eq!(asm.op_offsets(), &[3]);
    }

    #[test]
    fn test_straight_line_code() {
        let asm = assemble("+++>--<").unwrap();
        assert_eq!(
            asm.code(),
            &[
                0x48, 0x89, 0xFE, // mov rsi, rdi
                0x80, 0x06, 0x03, // add byte [rsi], 3
                0x48, 0x83, 0xC6, 0x01, // add rsi, 1
                0x80, 0x2E, 0x02, // sub byte [rsi], 2
                0x48, 0x83, 0xEE, 0x01, // sub rsi, 1
                0xC3, // ret
            ]
        );
        assert_eq!(asm.op_offsets(), &[3, 6, 10, 13, 17]);
    }

    #[test]
    fn test_output_emitted_per_repeat() {
        let one = assemble(".").unwrap().code().len();
        let three = assemble("...").unwrap().code().len();
        assert_eq!(three - 4, 3 * (one - 4));
    }

    #[test]
    fn test_simple_loop_displacements() {
        check_loops("[-]");
    }

    #[test]
    fn test_nested_loop_displacements() {
        check_loops("++[>++[>+<-]<-]>>.");
        check_loops("[[[]]][][[]]");
    }

    #[test]
    fn test_loop_displacements_with_large_body() {
        let body = ".".repeat(200);
        check_loops(&format!("+[{}-]", body));
    }

    #[test]
    fn test_unmatched_loop_end() {
        assert_eq!(
            assemble("]").unwrap_err(),
            CompileError::UnmatchedLoopEnd { op_index: 0 }
        );
        assert_eq!(
            assemble("+[-]]").unwrap_err(),
            CompileError::UnmatchedLoopEnd { op_index: 4 }
        );
    }

    #[test]
    fn test_unclosed_loop_start() {
        assert_eq!(
            assemble("+[").unwrap_err(),
            CompileError::UnclosedLoopStart { op_index: 1 }
        );
        // The outermost open loop is reported.
        assert_eq!(
            assemble("[[]").unwrap_err(),
            CompileError::UnclosedLoopStart { op_index: 0 }
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            CompileError::UnmatchedLoopEnd { op_index: 2 }.to_string(),
            "unmatched ']' (op 2)"
        );
        assert_eq!(
            CompileError::UnclosedLoopStart { op_index: 0 }.to_string(),
            "unclosed '[' (op 0)"
        );
    }
}
