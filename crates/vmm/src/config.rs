//! Configuration for an [`OperatingSystem`](crate::OperatingSystem).

use crate::ConfigError;

/// How a resident page is chosen for eviction when physical memory is full.
///
/// Every policy is deterministic: the same sequence of operations always evicts the same
/// pages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Evict the resident page with the lowest id.
    #[default]
    FirstResident,
    /// Second chance: sweep the page table from where the last sweep stopped, clearing the
    /// accessed flag of each resident page passed, and evict the first resident page found
    /// with the flag already clear.
    Clock,
}

/// Sizing and policy for an [`OperatingSystem`](crate::OperatingSystem).
///
/// ```
/// use vmm::{Config, EvictionPolicy};
///
/// let config = Config::new(64, 4, 256).with_eviction(EvictionPolicy::Clock);
/// assert!(config.validate().is_ok());
/// assert!(Config::new(64, 6, 256).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of physical memory cells.
    pub physical_size: usize,
    /// Cells per page and per frame. Must be a power of two.
    pub page_size: usize,
    /// Number of pages in the virtual address space.
    pub virtual_pages: usize,
    pub eviction: EvictionPolicy,
    /// Unlink a process's resident pages when it closes. When false, frames held by closed
    /// processes stay reserved forever.
    pub release_frames_on_close: bool,
}

impl Config {
    pub const fn new(physical_size: usize, page_size: usize, virtual_pages: usize) -> Self {
        Self {
            physical_size,
            page_size,
            virtual_pages,
            eviction: EvictionPolicy::FirstResident,
            release_frames_on_close: true,
        }
    }

    pub const fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub const fn with_release_frames_on_close(mut self, release: bool) -> Self {
        self.release_frames_on_close = release;
        self
    }

    /// Checks that the configuration describes a usable system.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if !self.page_size.is_power_of_two() {
            return Err(ConfigError::PageSizeNotPowerOfTwo(self.page_size));
        }
        if self.virtual_pages == 0 {
            return Err(ConfigError::NoVirtualPages);
        }
        if self.physical_size < self.page_size {
            return Err(ConfigError::PhysicalMemoryTooSmall {
                physical_size: self.physical_size,
                page_size: self.page_size,
            });
        }
        Ok(())
    }
}
