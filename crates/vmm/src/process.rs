//! Programs and the processes started from them.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::{PageId, ProcessId};

/// A program image: how much memory it needs and the addresses it touches, relative to
/// its own base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub memory_size: usize,
    pub instructions: Vec<usize>,
}

impl Program {
    pub fn new(memory_size: usize, instructions: Vec<usize>) -> Self {
        Self {
            memory_size,
            instructions,
        }
    }

    /// A program of `memory_size` cells that touches each of its cells once, in order.
    pub fn sequential(memory_size: usize) -> Self {
        Self::new(memory_size, (0..memory_size).collect())
    }
}

/// A running program.
///
/// The instruction queue holds absolute virtual addresses and is consumed one entry per
/// execution step. It cannot be restarted once drained.
#[derive(Debug, Clone)]
pub struct Process {
    id: ProcessId,
    size: usize,
    instructions: VecDeque<usize>,
    pages: Vec<PageId>,
}

impl Process {
    pub(crate) fn new(
        id: ProcessId,
        size: usize,
        instructions: VecDeque<usize>,
        pages: Vec<PageId>,
    ) -> Self {
        Self {
            id,
            size,
            instructions,
            pages,
        }
    }

    #[inline]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Returns the memory size requested by the program.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the remaining instruction addresses, next first.
    pub fn instructions(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.instructions.iter().copied()
    }

    /// Returns the address the next step will execute.
    pub fn next_instruction(&self) -> Option<usize> {
        self.instructions.front().copied()
    }

    /// Returns true once every instruction has been executed.
    pub fn is_drained(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the virtual page ids reserved for this process when it started.
    pub fn pages(&self) -> &[PageId] {
        &self.pages
    }

    pub(crate) fn pop_instruction(&mut self) -> Option<usize> {
        self.instructions.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_program() {
        let program = Program::sequential(4);
        assert_eq!(program.memory_size, 4);
        assert_eq!(program.instructions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn instructions_drain_in_order() {
        let mut process = Process::new(
            ProcessId::new(0),
            2,
            VecDeque::from([8, 9]),
            vec![PageId::new(2)],
        );
        assert_eq!(process.next_instruction(), Some(8));
        assert_eq!(process.pop_instruction(), Some(8));
        assert_eq!(process.pop_instruction(), Some(9));
        assert!(process.is_drained());
        assert_eq!(process.pop_instruction(), None);
        assert_eq!(process.pages(), &[PageId::new(2)]);
    }
}
