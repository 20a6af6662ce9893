//! Address types and the bit-level address translator.
//!
//! A flat address is split into a page number and an offset within that page. The split is
//! parameterized by the address-space width in bits and by the page size, which must be a
//! power of two.

use core::fmt;
use core::ops::{Add, Sub};

use crate::{PageId, VmError};

/// A physical memory cell index.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysicalAddress(usize);

impl PhysicalAddress {
    /// Creates a new physical address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalAddress({:#x})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for PhysicalAddress {
    #[inline]
    fn from(addr: usize) -> Self {
        Self(addr)
    }
}

impl Add<usize> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<PhysicalAddress> for PhysicalAddress {
    type Output = usize;

    #[inline]
    fn sub(self, rhs: PhysicalAddress) -> Self::Output {
        self.0 - rhs.0
    }
}

/// The decomposed form of a flat address: a page number and an offset within the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualAddress {
    pub page: PageId,
    pub offset: usize,
}

impl VirtualAddress {
    /// Creates a virtual address from its parts.
    #[inline]
    pub const fn new(page: PageId, offset: usize) -> Self {
        Self { page, offset }
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}", self.page, self.offset)
    }
}

/// Describes how flat addresses split into page and offset bits.
///
/// ```
/// use vmm::{AddressLayout, PageId, VirtualAddress};
///
/// let layout = AddressLayout::new(8, 16);
/// let va = layout.decompose(0x1B).unwrap();
/// assert_eq!(va, VirtualAddress::new(PageId::new(1), 11));
/// assert_eq!(layout.compose(va), 0x1B);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLayout {
    bits: u32,
    shift: u32,
}

impl AddressLayout {
    /// Creates a layout for an address space `bits` wide with pages of `page_size` cells.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    pub const fn new(bits: u32, page_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        Self {
            bits,
            shift: page_size.trailing_zeros(),
        }
    }

    /// Creates the narrowest layout that can address every one of `pages` pages.
    ///
    /// The width is the bit length of `pages << log2(page_size)`.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is not a power of two.
    pub const fn covering(pages: usize, page_size: usize) -> Self {
        assert!(page_size.is_power_of_two(), "page size must be a power of two");
        let shift = page_size.trailing_zeros();
        let span = pages << shift;
        Self {
            bits: usize::BITS - span.leading_zeros(),
            shift,
        }
    }

    /// Returns the width of the address space in bits.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns the number of offset bits, i.e. `log2(page_size)`.
    #[inline]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// Returns the page size in cells.
    #[inline]
    pub const fn page_size(&self) -> usize {
        1 << self.shift
    }

    /// Returns the highest address representable in this layout.
    #[inline]
    pub const fn max_address(&self) -> usize {
        if self.bits >= usize::BITS {
            usize::MAX
        } else {
            (1 << self.bits) - 1
        }
    }

    /// Splits a flat address into its page number and offset.
    pub const fn decompose(&self, address: usize) -> Result<VirtualAddress, VmError> {
        let max = self.max_address();
        if address > max {
            return Err(VmError::AddressOutOfRange { address, max });
        }

        let offset_mask = self.page_size() - 1;
        let page_mask = max ^ offset_mask;
        Ok(VirtualAddress {
            page: PageId::new((address & page_mask) >> self.shift),
            offset: address & offset_mask,
        })
    }

    /// Joins a page number and offset back into a flat address.
    #[inline]
    pub const fn compose(&self, address: VirtualAddress) -> usize {
        (address.page.as_usize() << self.shift) + address.offset
    }
}

/// Splits `address` into page and offset for an address space `address_bits` wide.
///
/// # Panics
///
/// Panics if `page_size` is not a power of two.
pub const fn decompose(
    address: usize,
    address_bits: u32,
    page_size: usize,
) -> Result<VirtualAddress, VmError> {
    AddressLayout::new(address_bits, page_size).decompose(address)
}

/// Joins a page number and offset into a flat address for pages of `page_size` cells.
///
/// # Panics
///
/// Panics if `page_size` is not a power of two.
pub const fn compose(address: VirtualAddress, page_size: usize) -> usize {
    assert!(page_size.is_power_of_two(), "page size must be a power of two");
    (address.page.as_usize() << page_size.trailing_zeros()) + address.offset
}

#[cfg(test)]
mod tests {
    use super::*;

    mod physical_address {
        use super::*;

        #[test]
        fn add_operator() {
            let addr = PhysicalAddress::new(0x0100);
            assert_eq!((addr + 0x50).as_usize(), 0x0150);
        }

        #[test]
        fn sub_address_operator() {
            let diff = PhysicalAddress::new(0x0150) - PhysicalAddress::new(0x0100);
            assert_eq!(diff, 0x50);
        }

        #[test]
        fn formatting() {
            let addr = PhysicalAddress::new(0x0100);
            assert_eq!(format!("{:?}", addr), "PhysicalAddress(0x100)");
            assert_eq!(format!("{}", addr), "0x100");
        }
    }

    mod layout {
        use super::*;

        #[test]
        fn worked_examples() {
            assert_eq!(
                decompose(0x1B, 8, 16),
                Ok(VirtualAddress::new(PageId::new(1), 11))
            );
            assert_eq!(
                decompose(0xF3, 8, 16),
                Ok(VirtualAddress::new(PageId::new(15), 3))
            );
        }

        #[test]
        fn rejects_addresses_beyond_width() {
            assert_eq!(
                decompose(0xFFFF, 8, 4),
                Err(VmError::AddressOutOfRange {
                    address: 0xFFFF,
                    max: 0xFF
                })
            );
        }

        #[test]
        fn max_address_is_accepted() {
            let va = decompose(0xFF, 8, 4).unwrap();
            assert_eq!(va, VirtualAddress::new(PageId::new(63), 3));
        }

        #[test]
        fn round_trip_every_page_and_offset() {
            let layout = AddressLayout::new(8, 4);
            for page in 0..64 {
                for offset in 0..4 {
                    let va = VirtualAddress::new(PageId::new(page), offset);
                    let address = compose(va, 4);
                    assert_eq!(layout.compose(va), address);
                    assert_eq!(layout.decompose(address), Ok(va));
                }
            }
        }

        #[test]
        fn covering_width() {
            // 256 pages of 4 cells span 1024 cells, which needs 11 bits.
            let layout = AddressLayout::covering(256, 4);
            assert_eq!(layout.bits(), 11);
            assert_eq!(layout.shift(), 2);
            assert_eq!(layout.page_size(), 4);
            assert_eq!(layout.max_address(), 0x7FF);
        }

        #[test]
        fn page_size_of_one_has_no_offset_bits() {
            let layout = AddressLayout::new(4, 1);
            assert_eq!(layout.decompose(9), Ok(VirtualAddress::new(PageId::new(9), 0)));
        }

        #[test]
        fn full_width_layout() {
            let layout = AddressLayout::new(usize::BITS, 16);
            assert_eq!(layout.max_address(), usize::MAX);
            assert!(layout.decompose(usize::MAX).is_ok());
        }

        #[test]
        #[should_panic(expected = "page size must be a power of two")]
        fn rejects_non_power_of_two_page_size() {
            AddressLayout::new(8, 6);
        }
    }
}
