//! x86-64 instruction encoding for JIT compilation.
//!
//! Only the handful of instructions the tape compiler needs are encoded
//! here. Uses System V AMD64 ABI conventions.

use super::codebuf::CodeBuffer;

/// x86-64 general-purpose registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    // Caller-saved (scratch) registers
    Rax = 0,  // Return value, syscall number
    Rcx = 1,  // Clobbered by syscall
    Rdx = 2,  // 3rd argument
    Rbx = 3,  // Callee-saved
    Rsp = 4,  // Stack pointer
    Rbp = 5,  // Frame pointer (callee-saved)
    Rsi = 6,  // 2nd argument
    Rdi = 7,  // 1st argument
    R8 = 8,   // 5th argument
    R9 = 9,   // 6th argument
    R10 = 10, // Caller-saved
    R11 = 11, // Clobbered by syscall
    R12 = 12, // Callee-saved
    R13 = 13, // Callee-saved
    R14 = 14, // Callee-saved
    R15 = 15, // Callee-saved
}

impl Reg {
    /// Get the register code (lower 3 bits).
    pub fn code(self) -> u8 {
        (self as u8) & 0x7
    }

    pub fn needs_rex_ext(self) -> bool {
        (self as u8) >= 8
    }

    /// Get the REX.B bit for this register (when used as base/rm).
    pub fn rex_b(self) -> u8 {
        if self.needs_rex_ext() { 0x01 } else { 0x00 }
    }

    /// Get the REX.R bit for this register (when used as reg).
    pub fn rex_r(self) -> u8 {
        if self.needs_rex_ext() { 0x04 } else { 0x00 }
    }
}

/// x86-64 condition codes (for Jcc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    E = 0x4,  // Equal / zero
    Ne = 0x5, // Not equal / not zero
}

/// x86-64 assembler.
pub struct X86_64Assembler<'a> {
    buf: &'a mut CodeBuffer,
}

impl<'a> X86_64Assembler<'a> {
    pub fn new(buf: &'a mut CodeBuffer) -> Self {
        Self { buf }
    }

    // ==================== Prefix and ModR/M helpers ====================

    /// Emit REX.W prefix for 64-bit operations.
    fn emit_rex_w(&mut self, reg: Reg, rm: Reg) {
        let rex = 0x48 | reg.rex_r() | rm.rex_b();
        self.buf.emit_u8(rex);
    }

    /// Emit REX.W prefix for single register operations.
    fn emit_rex_w_single(&mut self, rm: Reg) {
        let rex = 0x48 | rm.rex_b();
        self.buf.emit_u8(rex);
    }

    /// Encode ModR/M byte.
    /// mod: 2 bits, reg: 3 bits, rm: 3 bits
    fn modrm(mode: u8, reg: u8, rm: u8) -> u8 {
        ((mode & 0x3) << 6) | ((reg & 0x7) << 3) | (rm & 0x7)
    }

    /// Emit the ModR/M (+SIB, +disp) bytes addressing `[base + disp]`.
    fn emit_mem_operand(&mut self, reg_field: u8, base: Reg, disp: i32) {
        let needs_sib = base.code() == 0b100; // RSP / R12
        let needs_disp = disp != 0 || base.code() == 0b101; // RBP / R13

        let mode = if !needs_disp {
            0b00
        } else if (-128..=127).contains(&disp) {
            0b01
        } else {
            0b10
        };

        self.buf.emit_u8(Self::modrm(mode, reg_field, base.code()));
        if needs_sib {
            self.buf.emit_u8(0x24); // SIB: no index, base from ModR/M
        }
        match mode {
            0b01 => self.buf.emit_u8(disp as u8),
            0b10 => self.buf.emit_u32(disp as u32),
            _ => {}
        }
    }

    /// Group-1 `op BYTE PTR [base], imm8` (opcode 0x80 /ext).
    fn group1_m8_imm8(&mut self, ext: u8, base: Reg, imm: u8) {
        if base.needs_rex_ext() {
            self.buf.emit_u8(0x41); // REX.B
        }
        self.buf.emit_u8(0x80);
        self.emit_mem_operand(ext, base, 0);
        self.buf.emit_u8(imm);
    }

    // ==================== Data Movement ====================

    /// MOV r64, r64 (register to register)
    pub fn mov_rr(&mut self, dst: Reg, src: Reg) {
        self.emit_rex_w(src, dst);
        self.buf.emit_u8(0x89); // MOV r/m64, r64
        self.buf.emit_u8(Self::modrm(0b11, src.code(), dst.code()));
    }

    /// MOV r64, imm32 (sign-extended 32-bit immediate to register)
    pub fn mov_ri32(&mut self, dst: Reg, imm: i32) {
        self.emit_rex_w_single(dst);
        self.buf.emit_u8(0xC7); // MOV r/m64, imm32
        self.buf.emit_u8(Self::modrm(0b11, 0, dst.code()));
        self.buf.emit_u32(imm as u32);
    }

    // ==================== Arithmetic Operations ====================

    /// ADD r64, imm32 (sign-extended)
    pub fn add_ri32(&mut self, dst: Reg, imm: i32) {
        self.emit_rex_w_single(dst);
        if (-128..=127).contains(&imm) {
            self.buf.emit_u8(0x83); // ADD r/m64, imm8
            self.buf.emit_u8(Self::modrm(0b11, 0, dst.code()));
            self.buf.emit_u8(imm as u8);
        } else {
            self.buf.emit_u8(0x81); // ADD r/m64, imm32
            self.buf.emit_u8(Self::modrm(0b11, 0, dst.code()));
            self.buf.emit_u32(imm as u32);
        }
    }

    /// SUB r64, imm32 (sign-extended)
    pub fn sub_ri32(&mut self, dst: Reg, imm: i32) {
        self.emit_rex_w_single(dst);
        if (-128..=127).contains(&imm) {
            self.buf.emit_u8(0x83); // SUB r/m64, imm8
            self.buf.emit_u8(Self::modrm(0b11, 5, dst.code()));
            self.buf.emit_u8(imm as u8);
        } else {
            self.buf.emit_u8(0x81); // SUB r/m64, imm32
            self.buf.emit_u8(Self::modrm(0b11, 5, dst.code()));
            self.buf.emit_u32(imm as u32);
        }
    }

    /// ADD BYTE PTR [base], imm8 (wraps modulo 256)
    pub fn add_m8_imm8(&mut self, base: Reg, imm: u8) {
        self.group1_m8_imm8(0, base, imm);
    }

    /// SUB BYTE PTR [base], imm8 (wraps modulo 256)
    pub fn sub_m8_imm8(&mut self, base: Reg, imm: u8) {
        self.group1_m8_imm8(5, base, imm);
    }

    /// CMP BYTE PTR [base], imm8
    pub fn cmp_m8_imm8(&mut self, base: Reg, imm: u8) {
        self.group1_m8_imm8(7, base, imm);
    }

    // ==================== Control Flow ====================

    /// Jcc rel32 (conditional jump, near)
    pub fn jcc_rel32(&mut self, cond: Cond, offset: i32) {
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x80 + cond as u8); // Jcc rel32
        self.buf.emit_u32(offset as u32);
    }

    /// Jcc rel32 with a zeroed displacement; returns the offset of the
    /// displacement field for later patching.
    pub fn jcc_rel32_fixup(&mut self, cond: Cond) -> usize {
        self.jcc_rel32(cond, 0);
        self.buf.offset() - 4
    }

    /// SYSCALL (clobbers RAX, RCX, R11)
    pub fn syscall(&mut self) {
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x05);
    }

    /// RET (return)
    pub fn ret(&mut self) {
        self.buf.emit_u8(0xC3);
    }
}
