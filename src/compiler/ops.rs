//! Tape-machine operations produced by the folding parser.

/// A single operation of the tape machine.
///
/// Run-length kinds carry a repeat count in one byte. Runs longer than 255
/// wrap modulo 256 when folded; that is a known limitation of the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `<` repeated n times.
    MoveLeft(u8),
    /// `>` repeated n times.
    MoveRight(u8),
    /// `+` repeated n times.
    Increment(u8),
    /// `-` repeated n times.
    Decrement(u8),
    /// `.` repeated n times.
    Output(u8),
    /// `,` repeated n times.
    Input(u8),
    /// `[`; its forward target is only known once code is emitted.
    LoopStart,
    /// `]`, with the op index of its matching `[` when one was open.
    LoopEnd { start: Option<usize> },
}

impl Op {
    /// Build a run-length op for `symbol`, or `None` for brackets and
    /// non-instruction bytes.
    pub fn run(symbol: u8, count: u8) -> Option<Op> {
        Some(match symbol {
            b'<' => Op::MoveLeft(count),
            b'>' => Op::MoveRight(count),
            b'+' => Op::Increment(count),
            b'-' => Op::Decrement(count),
            b'.' => Op::Output(count),
            b',' => Op::Input(count),
            _ => return None,
        })
    }

    /// Source symbol of this op.
    pub fn symbol(&self) -> char {
        match self {
            Op::MoveLeft(_) => '<',
            Op::MoveRight(_) => '>',
            Op::Increment(_) => '+',
            Op::Decrement(_) => '-',
            Op::Output(_) => '.',
            Op::Input(_) => ',',
            Op::LoopStart => '[',
            Op::LoopEnd { .. } => ']',
        }
    }

    /// Repeat count for run-length ops; brackets always count once.
    pub fn count(&self) -> u8 {
        match *self {
            Op::MoveLeft(n)
            | Op::MoveRight(n)
            | Op::Increment(n)
            | Op::Decrement(n)
            | Op::Output(n)
            | Op::Input(n) => n,
            Op::LoopStart | Op::LoopEnd { .. } => 1,
        }
    }
}

/// An ordered sequence of ops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    ops: Vec<Op>,
}

impl Program {
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
