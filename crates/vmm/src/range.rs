//! Contiguous ranges of physical memory cells.

use core::fmt;

use crate::{AllocError, PhysicalAddress};

/// An inclusive, non-empty range of memory cells: the unit of reservation and release.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    start: usize,
    end: usize,
}

impl MemoryRange {
    /// Creates the range `start..=end`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    pub const fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "range start must not exceed its end");
        Self { start, end }
    }

    /// Creates the range of `length` cells beginning at `base`.
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero.
    pub const fn with_length(base: PhysicalAddress, length: usize) -> Self {
        assert!(length > 0, "range length must be non-zero");
        Self::new(base.as_usize(), base.as_usize() + length - 1)
    }

    /// Returns the first cell in the range.
    #[inline]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Returns the last cell in the range.
    #[inline]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Returns the number of cells in the range.
    #[inline]
    pub const fn length(&self) -> usize {
        self.end - self.start + 1
    }

    /// Returns the first cell as a physical address.
    #[inline]
    pub const fn base(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.start)
    }

    /// Returns true if `cell` lies within the range.
    #[inline]
    pub const fn contains(&self, cell: usize) -> bool {
        cell >= self.start && cell <= self.end
    }

    /// Returns the leading `length` cells of this range.
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero.
    pub const fn sub_range(&self, length: usize) -> Result<MemoryRange, AllocError> {
        assert!(length > 0, "range length must be non-zero");
        if length > self.length() {
            return Err(AllocError::RangeTooLong {
                requested: length,
                available: self.length(),
            });
        }
        Ok(Self::new(self.start, self.start + length - 1))
    }
}

impl fmt::Debug for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryRange({}..={})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_inclusive() {
        let range = MemoryRange::new(4, 7);
        assert_eq!(range.length(), 4);
        assert_eq!(MemoryRange::new(3, 3).length(), 1);
    }

    #[test]
    fn with_length() {
        let range = MemoryRange::with_length(PhysicalAddress::new(8), 4);
        assert_eq!(range, MemoryRange::new(8, 11));
        assert_eq!(range.base(), PhysicalAddress::new(8));
    }

    #[test]
    fn sub_range_truncates_from_start() {
        let range = MemoryRange::new(10, 19);
        assert_eq!(range.sub_range(4), Ok(MemoryRange::new(10, 13)));
        assert_eq!(range.sub_range(10), Ok(range));
    }

    #[test]
    fn sub_range_longer_than_parent_fails() {
        let range = MemoryRange::new(10, 12);
        assert_eq!(
            range.sub_range(4),
            Err(AllocError::RangeTooLong {
                requested: 4,
                available: 3
            })
        );
    }

    #[test]
    fn contains() {
        let range = MemoryRange::new(2, 5);
        assert!(range.contains(2));
        assert!(range.contains(5));
        assert!(!range.contains(1));
        assert!(!range.contains(6));
    }

    #[test]
    #[should_panic(expected = "range start must not exceed its end")]
    fn rejects_inverted_range() {
        MemoryRange::new(5, 4);
    }
}
