//! Instruction emitters for tape operations.
//!
//! The backpatch driver only talks to [`TapeEmitter`]; everything that knows
//! about a concrete instruction set lives behind it.

use super::codebuf::{CodeBuffer, PatchError};
use super::x86_64::{Cond, Reg, X86_64Assembler};

/// A loop-entry branch whose target is not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backpatch {
    /// Offset of the branch's displacement field.
    pub placeholder: usize,
    /// Offset the displacement is measured from: the first byte after the
    /// branch, which is also where the loop body starts.
    pub origin: usize,
}

/// Instruction selection for the tape machine.
pub trait TapeEmitter {
    /// Short name of the target, used in traces.
    fn target_name(&self) -> &'static str;

    /// Code run once on entry; must load the tape base into the tape
    /// pointer register.
    fn emit_prologue(&self, buf: &mut CodeBuffer);

    /// Move the tape pointer by `delta` cells.
    fn emit_move(&self, buf: &mut CodeBuffer, delta: i32);

    /// Add `delta` to the current cell, wrapping modulo 256.
    fn emit_mutate(&self, buf: &mut CodeBuffer, delta: i16);

    /// Write the current cell to the output descriptor.
    fn emit_output(&self, buf: &mut CodeBuffer);

    /// Read one byte into the current cell. End of stream leaves the cell
    /// untouched.
    fn emit_input(&self, buf: &mut CodeBuffer);

    /// Branch to a not-yet-known address if the current cell is zero.
    fn emit_branch_if_zero(&self, buf: &mut CodeBuffer) -> Backpatch;

    /// Branch back to `target` if the current cell is non-zero.
    fn emit_branch_if_nonzero(&self, buf: &mut CodeBuffer, target: usize)
    -> Result<(), PatchError>;

    /// Resolve a pending loop-entry branch so it lands on `target`.
    fn patch_branch(
        &self,
        buf: &mut CodeBuffer,
        pending: Backpatch,
        target: usize,
    ) -> Result<(), PatchError>;

    fn emit_return(&self, buf: &mut CodeBuffer);
}

/// Linux syscall numbers.
mod sys {
    pub const READ: i32 = 0;
    pub const WRITE: i32 = 1;
}

/// Register conventions for the tape machine on x86-64.
///
/// Only caller-saved registers are touched and the stack is never used, so
/// the generated routine is a System V leaf function:
/// - RSI: tape pointer (also the syscall buffer argument, preserved by SYSCALL)
/// - RDI: tape base on entry, then the file descriptor for I/O
/// - RAX, RDX: syscall number and byte count
/// - RCX, R11: clobbered by SYSCALL
pub mod regs {
    use super::Reg;

    pub const ARG0: Reg = Reg::Rdi;
    pub const TAPE: Reg = Reg::Rsi;
    pub const SYS_NR: Reg = Reg::Rax;
    pub const SYS_FD: Reg = Reg::Rdi;
    pub const SYS_LEN: Reg = Reg::Rdx;
}

/// x86-64 Linux emitter. I/O goes straight to `read`/`write` syscalls on
/// the configured descriptors.
#[derive(Debug, Clone, Copy)]
pub struct X86_64Emitter {
    input_fd: i32,
    output_fd: i32,
}

impl X86_64Emitter {
    pub fn new(input_fd: i32, output_fd: i32) -> Self {
        Self {
            input_fd,
            output_fd,
        }
    }

    /// `syscall(nr, fd, [tape], 1)`
    fn emit_byte_syscall(&self, buf: &mut CodeBuffer, nr: i32, fd: i32) {
        let mut asm = X86_64Assembler::new(buf);
        asm.mov_ri32(regs::SYS_NR, nr);
        asm.mov_ri32(regs::SYS_FD, fd);
        asm.mov_ri32(regs::SYS_LEN, 1);
        asm.syscall();
    }
}

impl Default for X86_64Emitter {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl TapeEmitter for X86_64Emitter {
    fn target_name(&self) -> &'static str {
        "x86-64"
    }

    fn emit_prologue(&self, buf: &mut CodeBuffer) {
        X86_64Assembler::new(buf).mov_rr(regs::TAPE, regs::ARG0);
    }

    fn emit_move(&self, buf: &mut CodeBuffer, delta: i32) {
        let mut asm = X86_64Assembler::new(buf);
        if delta >= 0 {
            asm.add_ri32(regs::TAPE, delta);
        } else {
            asm.sub_ri32(regs::TAPE, delta.wrapping_neg());
        }
    }

    fn emit_mutate(&self, buf: &mut CodeBuffer, delta: i16) {
        let mut asm = X86_64Assembler::new(buf);
        if delta >= 0 {
            asm.add_m8_imm8(regs::TAPE, delta as u8);
        } else {
            asm.sub_m8_imm8(regs::TAPE, delta.unsigned_abs() as u8);
        }
    }

    fn emit_output(&self, buf: &mut CodeBuffer) {
        self.emit_byte_syscall(buf, sys::WRITE, self.output_fd);
    }

    fn emit_input(&self, buf: &mut CodeBuffer) {
        // read(2) stores directly into the cell, so a zero-byte read at end
        // of stream leaves it unchanged.
        self.emit_byte_syscall(buf, sys::READ, self.input_fd);
    }

    fn emit_branch_if_zero(&self, buf: &mut CodeBuffer) -> Backpatch {
        let mut asm = X86_64Assembler::new(buf);
        asm.cmp_m8_imm8(regs::TAPE, 0);
        let placeholder = asm.jcc_rel32_fixup(Cond::E);
        Backpatch {
            placeholder,
            origin: placeholder + 4,
        }
    }

    fn emit_branch_if_nonzero(
        &self,
        buf: &mut CodeBuffer,
        target: usize,
    ) -> Result<(), PatchError> {
        let mut asm = X86_64Assembler::new(buf);
        asm.cmp_m8_imm8(regs::TAPE, 0);
        let field = asm.jcc_rel32_fixup(Cond::Ne);
        buf.patch_rel32(field, target)
    }

    fn patch_branch(
        &self,
        buf: &mut CodeBuffer,
        pending: Backpatch,
        target: usize,
    ) -> Result<(), PatchError> {
        debug_assert_eq!(pending.origin, pending.placeholder + 4);
        buf.patch_rel32(pending.placeholder, target)
    }

    fn emit_return(&self, buf: &mut CodeBuffer) {
        X86_64Assembler::new(buf).ret();
    }
}
