#![cfg_attr(not(test), no_std)]

//! # Virtual Memory Manager (VMM)
//!
//! A deterministic model of an operating system's demand-paging engine. It provides:
//!
//! - A bitmap-based physical frame allocator with first-fit placement.
//! - A virtual page table tracking page identity, residency and free/occupied membership.
//! - Bit-level address translation between flat addresses and `(page, offset)` pairs.
//! - An orchestrator tying process lifecycle to page residency: faults, lazy loading,
//!   eviction and single-step execution.
//!
//! ```
//! use vmm::{OperatingSystem, Program};
//!
//! let mut os = OperatingSystem::new(16, 4, 64).unwrap();
//! let pid = os.start_process(Program::new(8, (0..8).collect())).unwrap();
//!
//! let outcome = os.step(pid).unwrap();
//! assert!(outcome.faulted);
//! assert_eq!(os.resident_page_count(), 1);
//! ```

extern crate alloc;

mod address;
mod config;
mod error;
mod frame_allocator;
mod numbers;
mod operating_system;
mod page_table;
mod process;
mod range;

pub use address::{AddressLayout, PhysicalAddress, VirtualAddress, compose, decompose};
pub use config::{Config, EvictionPolicy};
pub use error::{AllocError, ConfigError, VmError};
pub use frame_allocator::{FreeRegions, PhysicalMemory};
pub use numbers::{PageId, ProcessId};
pub use operating_system::{OperatingSystem, StepOutcome, Translation};
pub use page_table::{Page, PageFlag, PageFlags, VirtualPageTable};
pub use process::{Process, Program};
pub use range::MemoryRange;
