//! Human-readable dumps of the op sequence and emitted machine code.

use super::ops::{Op, Program};
use std::fmt::Write;

/// One line per op: index, symbol, repeat count or loop partner.
pub fn format_ops(program: &Program) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== ops ({}) ==", program.len());
    for (index, op) in program.ops().iter().enumerate() {
        let _ = match op {
            Op::LoopStart => writeln!(out, "{:04}  [", index),
            Op::LoopEnd { start: Some(start) } => {
                writeln!(out, "{:04}  ]  -> {:04}", index, start)
            }
            Op::LoopEnd { start: None } => writeln!(out, "{:04}  ]  -> ????", index),
            other => writeln!(out, "{:04}  {}  x{}", index, other.symbol(), other.count()),
        };
    }
    out
}

/// Hex dump, 16 bytes per line, prefixed with the byte offset.
pub fn format_code(code: &[u8]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== code ({} bytes) ==", code.len());
    for (line, chunk) in code.chunks(16).enumerate() {
        let _ = write!(out, "{:06x}:", line * 16);
        for byte in chunk {
            let _ = write!(out, " {:02x}", byte);
        }
        out.push('\n');
    }
    out
}
