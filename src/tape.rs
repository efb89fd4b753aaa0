//! The tape: the whole working memory of a running program.

/// Number of cells on a tape.
pub const TAPE_SIZE: usize = 30_000;

/// A zero-initialized, fixed-size byte tape owned by the caller.
///
/// Compiled code receives a raw pointer to cell 0 and walks it without
/// bounds checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Box<[u8]>,
}

impl Tape {
    pub fn new() -> Self {
        Self {
            cells: vec![0; TAPE_SIZE].into_boxed_slice(),
        }
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.cells.as_mut_ptr()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tape_is_zeroed() {
        let tape = Tape::new();
        assert_eq!(tape.len(), TAPE_SIZE);
        assert!(tape.cells().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_tapes_are_independent() {
        let mut a = Tape::new();
        let b = Tape::new();
        a.cells_mut()[0] = 9;
        assert_eq!(b.cells()[0], 0);
    }
}
