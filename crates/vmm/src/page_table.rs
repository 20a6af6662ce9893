//! The virtual page table.
//!
//! One [`Page`] exists per virtual page slot for the life of the system. Only a page's
//! residency and its membership of the free or occupied list ever change.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::{PageId, PhysicalAddress, VmError};

/// Status bits tracked for each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFlag {
    /// The page was translated successfully since it was loaded or last swept.
    Accessed = 1 << 0,
    /// The page was written since it was loaded. Instructions only read, so nothing in
    /// this crate sets it; it is cleared with the other flags on load and unlink.
    Modified = 1 << 1,
}

/// A small set of [`PageFlag`]s.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageFlags(u8);

impl PageFlags {
    /// Creates a flag set with all flags cleared.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Sets the given flag.
    pub fn set(&mut self, flag: PageFlag) {
        self.0 |= flag as u8;
    }

    /// Clears the given flag.
    pub fn clear(&mut self, flag: PageFlag) {
        self.0 &= !(flag as u8);
    }

    /// Tests if the given flag is set.
    pub const fn test(&self, flag: PageFlag) -> bool {
        self.0 & (flag as u8) != 0
    }

    /// Tests the given flag and clears it, returning the previous value.
    pub fn test_and_clear(&mut self, flag: PageFlag) -> bool {
        let was_set = self.test(flag);
        self.clear(flag);
        was_set
    }
}

/// A fixed-size unit of virtual address space with a stable identity and optional residency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    id: PageId,
    size: usize,
    pub flags: PageFlags,
    physical_address: Option<PhysicalAddress>,
}

impl Page {
    /// Creates a non-resident page.
    pub const fn new(id: PageId, size: usize) -> Self {
        Self {
            id,
            size,
            flags: PageFlags::new(),
            physical_address: None,
        }
    }

    #[inline]
    pub const fn id(&self) -> PageId {
        self.id
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns the start of the frame backing this page, if resident.
    #[inline]
    pub const fn physical_address(&self) -> Option<PhysicalAddress> {
        self.physical_address
    }

    #[inline]
    pub const fn is_resident(&self) -> bool {
        self.physical_address.is_some()
    }

    #[inline]
    pub const fn is_accessed(&self) -> bool {
        self.flags.test(PageFlag::Accessed)
    }

    #[inline]
    pub const fn is_modified(&self) -> bool {
        self.flags.test(PageFlag::Modified)
    }

    /// Binds the page to the frame starting at `frame`. Both flags are reset.
    pub(crate) fn link(&mut self, frame: PhysicalAddress) {
        self.physical_address = Some(frame);
        self.flags = PageFlags::new();
    }

    /// Detaches the page from its frame, returning the frame's start. Both flags are reset.
    pub(crate) fn unlink(&mut self) -> Option<PhysicalAddress> {
        self.flags = PageFlags::new();
        self.physical_address.take()
    }
}

/// Every page of the virtual address space, plus the free and occupied id lists.
///
/// The two lists are disjoint and together hold every page id. Reservation takes ids from
/// the front of the free list; release appends to its back, so after any release the free
/// list is no longer sorted and reserved ids are not guaranteed to be contiguous.
#[derive(Debug, Clone)]
pub struct VirtualPageTable {
    pages: Vec<Page>,
    free_list: VecDeque<PageId>,
    occupied_list: Vec<PageId>,
}

impl VirtualPageTable {
    /// Creates a table of `count` non-resident pages of `page_size` cells, all free.
    pub fn new(count: usize, page_size: usize) -> Self {
        let pages: Vec<Page> = (0..count)
            .map(|id| Page::new(PageId::new(id), page_size))
            .collect();
        let free_list = pages.iter().map(Page::id).collect();

        Self {
            pages,
            free_list,
            occupied_list: Vec::new(),
        }
    }

    /// Returns the number of pages.
    #[inline]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Looks up a page by id.
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(id.as_usize())
    }

    pub(crate) fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.get_mut(id.as_usize())
    }

    /// Returns all pages in table order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Returns the free page ids, in the order they will be handed out.
    pub fn free_list(&self) -> impl ExactSizeIterator<Item = PageId> + '_ {
        self.free_list.iter().copied()
    }

    /// Returns the reserved page ids, in the order they were reserved.
    pub fn occupied_list(&self) -> &[PageId] {
        &self.occupied_list
    }

    /// Returns the number of free page ids.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Moves the first `count` ids of the free list to the occupied list and returns their
    /// pages.
    ///
    /// Nothing is reserved if fewer than `count` ids are free.
    pub fn reserve_pages(&mut self, count: usize) -> Result<Vec<Page>, VmError> {
        if self.free_list.len() < count {
            return Err(VmError::VirtualMemoryExhausted {
                requested: count,
                available: self.free_list.len(),
            });
        }

        let reserved: Vec<PageId> = self.free_list.drain(..count).collect();
        self.occupied_list.extend_from_slice(&reserved);
        debug_assert!(self.is_partitioned());

        Ok(reserved
            .into_iter()
            .map(|id| self.pages[id.as_usize()])
            .collect())
    }

    /// Moves each of `ids` from the occupied list to the back of the free list.
    ///
    /// Nothing is released if any id is not currently occupied or appears twice.
    pub fn free_pages(&mut self, ids: &[PageId]) -> Result<(), VmError> {
        for (index, id) in ids.iter().enumerate() {
            if !self.occupied_list.contains(id) || ids[..index].contains(id) {
                return Err(VmError::PageNotOccupied(*id));
            }
        }

        self.occupied_list.retain(|id| !ids.contains(id));
        self.free_list.extend(ids.iter().copied());
        debug_assert!(self.is_partitioned());
        Ok(())
    }

    /// Returns the pages that currently have a frame, in table order.
    pub fn resident_pages(&self) -> impl Iterator<Item = &Page> + '_ {
        self.pages.iter().filter(|page| page.is_resident())
    }

    /// Returns the number of pages that currently have a frame.
    pub fn resident_count(&self) -> usize {
        self.resident_pages().count()
    }

    /// Returns true if the free and occupied lists are disjoint and together cover every
    /// page id exactly once.
    pub fn is_partitioned(&self) -> bool {
        if self.free_list.len() + self.occupied_list.len() != self.pages.len() {
            return false;
        }

        let mut seen = alloc::vec![false; self.pages.len()];
        self.free_list
            .iter()
            .chain(self.occupied_list.iter())
            .all(|id| match seen.get_mut(id.as_usize()) {
                Some(slot) if !*slot => {
                    *slot = true;
                    true
                }
                _ => false,
            })
    }
}
