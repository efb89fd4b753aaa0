//! Folding parser.
//!
//! Turns raw source bytes into a [`Program`]. Bytes other than the eight
//! instruction symbols are comments and are skipped. Consecutive identical
//! run-length symbols collapse into a single op carrying the run length.

use super::ops::{Op, Program};
use crate::config::FoldMode;

pub struct Parser<'a> {
    source: &'a [u8],
    pos: usize,
    fold: FoldMode,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            pos: 0,
            fold: FoldMode::On,
        }
    }

    pub fn with_fold(mut self, fold: FoldMode) -> Self {
        self.fold = fold;
        self
    }

    /// Parse the whole source.
    ///
    /// Never fails: a `]` without an open `[` yields `LoopEnd { start: None }`
    /// and an unclosed `[` is left as is. Both are reported by the emitter.
    pub fn parse(mut self) -> Program {
        let mut ops = Vec::new();
        let mut open = Vec::new();

        while let Some(&symbol) = self.source.get(self.pos) {
            match symbol {
                b'[' => {
                    open.push(ops.len());
                    ops.push(Op::LoopStart);
                    self.pos += 1;
                }
                b']' => {
                    ops.push(Op::LoopEnd { start: open.pop() });
                    self.pos += 1;
                }
                _ => {
                    let count = self.take_run(symbol);
                    // Truncation to u8 is the documented wrap for runs >= 256.
                    if let Some(op) = Op::run(symbol, count as u8) {
                        ops.push(op);
                    }
                }
            }
        }

        Program::new(ops)
    }

    /// Consume the run of `symbol` at the cursor and return its length.
    fn take_run(&mut self, symbol: u8) -> usize {
        let start = self.pos;
        self.pos += 1;
        if self.fold == FoldMode::On && Op::run(symbol, 1).is_some() {
            while self.source.get(self.pos) == Some(&symbol) {
                self.pos += 1;
            }
        }
        self.pos - start
    }
}

/// Parse `source` with the given fold mode.
pub fn parse(source: &[u8], fold: FoldMode) -> Program {
    Parser::new(source).with_fold(fold).parse()
}
