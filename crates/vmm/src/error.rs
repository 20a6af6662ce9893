//! Error types for the memory manager.
//!
//! Page faults are not errors: they are reported through
//! [`Translation::Fault`](crate::Translation::Fault). Everything here is a hard failure.

use core::fmt;

use crate::{PageId, ProcessId};

/// Errors that can occur while reserving physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// No free region is long enough for the request.
    OutOfMemory,
    /// A sub-range was requested that is longer than its parent range.
    RangeTooLong { requested: usize, available: usize },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("no free physical region is large enough"),
            Self::RangeTooLong {
                requested,
                available,
            } => write!(
                f,
                "sub-range of {requested} cells requested from a range of {available}"
            ),
        }
    }
}

impl core::error::Error for AllocError {}

/// Errors raised by the page table, the address translator and the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// The address does not fit the configured address space.
    AddressOutOfRange { address: usize, max: usize },
    /// The page id is not part of the page table.
    UnknownPage(PageId),
    /// A load was requested for a page that already has a frame.
    PageAlreadyResident(PageId),
    /// An unlink was requested for a page without a frame.
    PageNotResident(PageId),
    /// A page id was released that is not currently reserved.
    PageNotOccupied(PageId),
    /// No frame could be found, even after evicting a resident page.
    OutOfMemory,
    /// Not enough free virtual page ids to start a process.
    VirtualMemoryExhausted { requested: usize, available: usize },
    /// No process with this id is in the process table.
    UnknownProcess(ProcessId),
    /// The process has no instructions left to execute.
    ProcessDrained(ProcessId),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressOutOfRange { address, max } => {
                write!(f, "address {address:#x} exceeds the address space (max {max:#x})")
            }
            Self::UnknownPage(page) => write!(f, "no such page: {page}"),
            Self::PageAlreadyResident(page) => write!(f, "page {page} is already resident"),
            Self::PageNotResident(page) => write!(f, "page {page} is not resident"),
            Self::PageNotOccupied(page) => write!(f, "page {page} is not reserved"),
            Self::OutOfMemory => f.write_str("out of physical memory"),
            Self::VirtualMemoryExhausted {
                requested,
                available,
            } => write!(
                f,
                "virtual memory exhausted: {requested} pages requested, {available} free"
            ),
            Self::UnknownProcess(pid) => write!(f, "no such process: {pid}"),
            Self::ProcessDrained(pid) => write!(f, "process {pid} has no instructions left"),
        }
    }
}

impl core::error::Error for VmError {}

impl From<AllocError> for VmError {
    fn from(error: AllocError) -> Self {
        match error {
            AllocError::OutOfMemory | AllocError::RangeTooLong { .. } => Self::OutOfMemory,
        }
    }
}

/// Errors found while validating a [`Config`](crate::Config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The page size is zero or not a power of two.
    PageSizeNotPowerOfTwo(usize),
    /// The virtual address space has no pages.
    NoVirtualPages,
    /// Physical memory cannot hold a single page.
    PhysicalMemoryTooSmall { physical_size: usize, page_size: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageSizeNotPowerOfTwo(size) => {
                write!(f, "page size {size} is not a power of two")
            }
            Self::NoVirtualPages => f.write_str("virtual memory must have at least one page"),
            Self::PhysicalMemoryTooSmall {
                physical_size,
                page_size,
            } => write!(
                f,
                "physical memory of {physical_size} cells cannot hold a {page_size}-cell page"
            ),
        }
    }
}

impl core::error::Error for ConfigError {}
