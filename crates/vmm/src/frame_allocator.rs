//! Bitmap-based physical frame allocator.
//!
//! Physical memory is modeled as a fixed-length occupancy bitmap with one entry per memory
//! cell. Free memory is found by scanning for maximal runs of free cells, and placement is
//! first-fit. No compaction is performed, so fragmentation accumulates as frames are
//! reserved and released in arbitrary order.

use alloc::boxed::Box;
use alloc::vec;

use crate::{AllocError, MemoryRange};

/// Occupancy bitmap over a fixed number of physical memory cells.
///
/// A cell is marked iff it belongs to a currently reserved range. Callers only reserve ranges
/// previously reported as free, so reservations never overlap.
pub struct PhysicalMemory {
    map: Box<[bool]>,
}

impl PhysicalMemory {
    /// Creates a physical memory of `size` cells, all free.
    pub fn new(size: usize) -> Self {
        Self {
            map: vec![false; size].into_boxed_slice(),
        }
    }

    /// Returns the total number of cells.
    #[inline]
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Returns a snapshot of the occupancy bitmap, `true` meaning reserved.
    #[inline]
    pub fn occupancy(&self) -> &[bool] {
        &self.map
    }

    /// Returns true if `cell` is reserved.
    ///
    /// Cells outside of physical memory are reported as not reserved.
    #[inline]
    pub fn is_reserved(&self, cell: usize) -> bool {
        self.map.get(cell).copied().unwrap_or(false)
    }

    /// Marks every cell in `range` as reserved.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past the end of physical memory.
    pub fn reserve(&mut self, range: MemoryRange) {
        self.update(range, true);
    }

    /// Marks every cell in `range` as free.
    ///
    /// # Panics
    ///
    /// Panics if the range extends past the end of physical memory.
    pub fn free(&mut self, range: MemoryRange) {
        self.update(range, false);
    }

    fn update(&mut self, range: MemoryRange, reserved: bool) {
        assert!(
            range.end() < self.map.len(),
            "range extends past the end of physical memory"
        );
        self.map[range.start()..=range.end()].fill(reserved);
    }

    /// Returns an iterator over the maximal free regions, left to right.
    ///
    /// Each call starts a fresh scan; the bitmap is not modified.
    pub fn free_regions(&self) -> FreeRegions<'_> {
        FreeRegions {
            map: &self.map,
            cursor: 0,
        }
    }

    /// Finds the first free region of at least `length` cells and returns its leading
    /// `length` cells. Nothing is reserved.
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero.
    pub fn first_fit(&self, length: usize) -> Result<MemoryRange, AllocError> {
        self.free_regions()
            .find(|region| region.length() >= length)
            .ok_or(AllocError::OutOfMemory)?
            .sub_range(length)
    }

    /// Returns the number of free cells.
    pub fn free_cells(&self) -> usize {
        self.map.iter().filter(|&&reserved| !reserved).count()
    }

    /// Returns the number of reserved cells.
    pub fn reserved_cells(&self) -> usize {
        self.size() - self.free_cells()
    }

    /// Returns the number of maximal free regions.
    pub fn free_region_count(&self) -> usize {
        self.free_regions().count()
    }

    /// Returns the fraction of cells that are free, between 0 and 1.
    ///
    /// An empty memory reports 0.
    pub fn percent_free(&self) -> f64 {
        if self.map.is_empty() {
            return 0.0;
        }
        self.free_cells() as f64 / self.size() as f64
    }
}

/// Iterator over the maximal free regions of a [`PhysicalMemory`].
///
/// Adjacent free cells are always merged into one reported region.
#[derive(Debug, Clone)]
pub struct FreeRegions<'a> {
    map: &'a [bool],
    cursor: usize,
}

impl Iterator for FreeRegions<'_> {
    type Item = MemoryRange;

    fn next(&mut self) -> Option<Self::Item> {
        // Skip reserved cells
        while self.cursor < self.map.len() && self.map[self.cursor] {
            self.cursor += 1;
        }

        if self.cursor == self.map.len() {
            return None;
        }

        let start = self.cursor;
        while self.cursor < self.map.len() && !self.map[self.cursor] {
            self.cursor += 1;
        }

        Some(MemoryRange::new(start, self.cursor - 1))
    }
}

impl core::iter::FusedIterator for FreeRegions<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(memory: &PhysicalMemory) -> Vec<MemoryRange> {
        memory.free_regions().collect()
    }

    #[test]
    fn fresh_memory_is_one_free_region() {
        let memory = PhysicalMemory::new(10);
        assert_eq!(regions(&memory), vec![MemoryRange::new(0, 9)]);
        assert_eq!(memory.free_cells(), 10);
        assert_eq!(memory.free_region_count(), 1);
    }

    #[test]
    fn fully_reserved_memory_has_no_free_regions() {
        let mut memory = PhysicalMemory::new(10);
        memory.reserve(MemoryRange::new(0, 9));
        assert!(regions(&memory).is_empty());
        assert_eq!(memory.free_cells(), 0);
        assert_eq!(memory.reserved_cells(), 10);
    }

    #[test]
    fn empty_memory_has_no_free_regions() {
        let memory = PhysicalMemory::new(0);
        assert!(regions(&memory).is_empty());
        assert_eq!(memory.percent_free(), 0.0);
    }

    #[test]
    fn regions_are_maximal_and_ordered() {
        let mut memory = PhysicalMemory::new(12);
        memory.reserve(MemoryRange::new(2, 3));
        memory.reserve(MemoryRange::new(7, 7));
        assert_eq!(
            regions(&memory),
            vec![
                MemoryRange::new(0, 1),
                MemoryRange::new(4, 6),
                MemoryRange::new(8, 11)
            ]
        );

        // Freeing the separator merges the neighbours
        memory.free(MemoryRange::new(7, 7));
        assert_eq!(
            regions(&memory),
            vec![MemoryRange::new(0, 1), MemoryRange::new(4, 11)]
        );
    }

    #[test]
    fn region_scan_is_restartable() {
        let mut memory = PhysicalMemory::new(8);
        memory.reserve(MemoryRange::new(3, 4));

        let mut first = memory.free_regions();
        assert_eq!(first.next(), Some(MemoryRange::new(0, 2)));

        let second: Vec<_> = memory.free_regions().collect();
        assert_eq!(second.len(), 2);
        assert_eq!(first.next(), Some(MemoryRange::new(5, 7)));
        assert_eq!(first.next(), None);
        assert_eq!(first.next(), None);
    }

    #[test]
    fn first_fit_skips_small_regions() {
        let mut memory = PhysicalMemory::new(12);
        memory.reserve(MemoryRange::new(2, 3));
        assert_eq!(memory.first_fit(2), Ok(MemoryRange::new(0, 1)));
        assert_eq!(memory.first_fit(3), Ok(MemoryRange::new(4, 6)));
        // first_fit does not reserve
        assert_eq!(memory.free_cells(), 10);
    }

    #[test]
    fn first_fit_out_of_memory() {
        let mut memory = PhysicalMemory::new(8);
        memory.reserve(MemoryRange::new(2, 2));
        memory.reserve(MemoryRange::new(5, 5));
        assert_eq!(memory.first_fit(3), Err(AllocError::OutOfMemory));
    }

    #[test]
    fn is_reserved() {
        let mut memory = PhysicalMemory::new(4);
        memory.reserve(MemoryRange::new(1, 2));
        assert_eq!(memory.occupancy(), &[false, true, true, false]);
        assert!(memory.is_reserved(1));
        assert!(!memory.is_reserved(3));
        assert!(!memory.is_reserved(4));
    }

    #[test]
    fn percent_free() {
        let mut memory = PhysicalMemory::new(4);
        memory.reserve(MemoryRange::new(0, 0));
        assert_eq!(memory.percent_free(), 0.75);
    }

    #[test]
    #[should_panic(expected = "range extends past the end of physical memory")]
    fn reserve_out_of_bounds() {
        let mut memory = PhysicalMemory::new(4);
        memory.reserve(MemoryRange::new(2, 4));
    }
}
