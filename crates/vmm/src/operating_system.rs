//! The operating system: process lifecycle, address translation and demand paging.
//!
//! Processes are given virtual page ids when they start, but no physical memory. The first
//! time an instruction touches a page, translation faults and the page is loaded into the
//! first free frame that fits. When no frame fits, one resident page is evicted and the
//! allocation is retried exactly once.
//!
//! Known limitation: a process's base address is derived from the first page id it was
//! given. Ids are only consecutive while no pages have ever been released, so after a
//! release a process's later addresses may fall on pages that were reserved for somebody
//! else. The page table stays consistent; only the isolation between processes is lost.
//! Closing a process unlinks only the pages it reserved, so a frame loaded through such a
//! stray address stays resident after the close, and the next process to reserve that page
//! finds it already loaded.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::{
    AddressLayout, AllocError, Config, ConfigError, EvictionPolicy, MemoryRange, Page,
    PageFlag, PageId, PhysicalAddress, PhysicalMemory, Process, ProcessId, Program,
    VirtualAddress, VirtualPageTable, VmError,
};

/// The result of translating a virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// The page is resident; this is the physical cell.
    Resident(PhysicalAddress),
    /// The covering page has no frame.
    Fault(VirtualAddress),
}

/// What happened while executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub pid: ProcessId,
    /// The executed instruction address.
    pub virtual_address: usize,
    pub physical_address: PhysicalAddress,
    /// True if the page had to be loaded first.
    pub faulted: bool,
    /// The page evicted to make room, if any.
    pub evicted: Option<PageId>,
}

/// Owns the page table, physical memory and process table, and advances them one
/// instruction at a time.
pub struct OperatingSystem {
    config: Config,
    layout: AddressLayout,
    virtual_memory: VirtualPageTable,
    physical_memory: PhysicalMemory,
    processes: Vec<Process>,
    next_process_id: ProcessId,
    clock_hand: usize,
}

impl OperatingSystem {
    /// Creates a system with `physical_size` cells of physical memory and `virtual_pages`
    /// pages of `page_size` cells, using the default policies.
    pub fn new(
        physical_size: usize,
        page_size: usize,
        virtual_pages: usize,
    ) -> Result<Self, ConfigError> {
        Self::with_config(Config::new(physical_size, page_size, virtual_pages))
    }

    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;

        log::debug!(
            "initializing {} virtual pages of {} cells over {} physical cells",
            config.virtual_pages,
            config.page_size,
            config.physical_size
        );

        Ok(Self {
            config,
            layout: AddressLayout::covering(config.virtual_pages, config.page_size),
            virtual_memory: VirtualPageTable::new(config.virtual_pages, config.page_size),
            physical_memory: PhysicalMemory::new(config.physical_size),
            processes: Vec::new(),
            next_process_id: ProcessId::new(0),
            clock_hand: 0,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Returns the width of the virtual address space, just wide enough to address every
    /// virtual page.
    #[inline]
    pub fn address_bits(&self) -> u32 {
        self.layout.bits()
    }

    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }

    pub fn virtual_memory(&self) -> &VirtualPageTable {
        &self.virtual_memory
    }

    pub fn physical_memory(&self) -> &PhysicalMemory {
        &self.physical_memory
    }

    /// Starts `program`, reserving enough virtual pages for its memory size.
    ///
    /// The program's instruction addresses are rebased onto the start of the first reserved
    /// page. No physical memory is allocated until the process runs.
    ///
    /// Nothing is reserved if the program cannot be started: an instruction whose rebased
    /// address does not fit in a `usize` fails with [`VmError::AddressOutOfRange`].
    pub fn start_process(&mut self, program: Program) -> Result<ProcessId, VmError> {
        let required_pages = program.memory_size.div_ceil(self.page_size()).max(1);

        let (pages, instructions) = self
            .reserve_and_rebase(required_pages, &program.instructions)
            .inspect_err(|e| log::warn!("cannot start process: {}", e))?;
        let base_page = pages[0].id();
        let base_address = self.layout.compose(VirtualAddress::new(base_page, 0));

        let pid = self.next_process_id;
        self.next_process_id = pid.next();

        log::info!(
            "started process {} with {} pages at base address {:#x}",
            pid,
            pages.len(),
            base_address
        );

        self.processes.push(Process::new(
            pid,
            program.memory_size,
            instructions,
            pages.iter().map(Page::id).collect(),
        ));
        Ok(pid)
    }

    /// Rebases `instructions` onto the first free page, then reserves `count` pages.
    fn reserve_and_rebase(
        &mut self,
        count: usize,
        instructions: &[usize],
    ) -> Result<(Vec<Page>, VecDeque<usize>), VmError> {
        // reserve_pages takes ids from the front of the free list
        let Some(base_page) = self.virtual_memory.free_list().next() else {
            return Err(VmError::VirtualMemoryExhausted {
                requested: count,
                available: 0,
            });
        };

        let base_address = self.layout.compose(VirtualAddress::new(base_page, 0));
        let rebased = instructions
            .iter()
            .map(|&address| {
                address
                    .checked_add(base_address)
                    .ok_or(VmError::AddressOutOfRange {
                        address,
                        max: usize::MAX - base_address,
                    })
            })
            .collect::<Result<VecDeque<usize>, VmError>>()?;

        let pages = self.virtual_memory.reserve_pages(count)?;
        debug_assert_eq!(pages[0].id(), base_page);
        Ok((pages, rebased))
    }

    /// Removes a process and returns its virtual pages to the free list.
    ///
    /// Unless the configuration says otherwise, the process's resident pages are unlinked
    /// first so their frames become free. Only the pages the process reserved are unlinked;
    /// see the module documentation for pages reached through non-consecutive ids.
    pub fn close_process(&mut self, pid: ProcessId) -> Result<(), VmError> {
        let index = self.process_index(pid)?;
        let process = self.processes.remove(index);

        if self.config.release_frames_on_close {
            for &page in process.pages() {
                if self.page(page).is_some_and(Page::is_resident) {
                    self.unlink_page(page)?;
                }
            }
        }

        self.virtual_memory.free_pages(process.pages())?;
        log::info!(
            "closed process {} and released {} pages",
            pid,
            process.pages().len()
        );
        Ok(())
    }

    /// Splits a virtual address into page and offset using this system's layout.
    ///
    /// Fails if the address is wider than the address space or lands on a page beyond the
    /// end of the page table.
    pub fn virtual_address(&self, address: usize) -> Result<VirtualAddress, VmError> {
        let va = self.layout.decompose(address)?;
        if va.page.as_usize() >= self.virtual_memory.len() {
            return Err(VmError::AddressOutOfRange {
                address,
                max: self.virtual_memory.len() * self.page_size() - 1,
            });
        }
        Ok(va)
    }

    /// Translates a virtual address to a physical one, or reports a page fault.
    pub fn translate(&self, address: usize) -> Result<Translation, VmError> {
        let va = self.virtual_address(address)?;
        let page = self
            .virtual_memory
            .page(va.page)
            .ok_or(VmError::UnknownPage(va.page))?;

        match page.physical_address() {
            None => Ok(Translation::Fault(va)),
            Some(frame) => {
                let physical = frame + va.offset;
                debug_assert!(
                    self.physical_memory.is_reserved(physical.as_usize()),
                    "resident page {} points at a free cell {}",
                    va.page,
                    physical
                );
                Ok(Translation::Resident(physical))
            }
        }
    }

    /// Gives a page a physical frame, evicting a resident page if memory is full.
    ///
    /// Returns the id of the evicted page, if any.
    pub fn load_page(&mut self, id: PageId) -> Result<Option<PageId>, VmError> {
        let page = self.page(id).ok_or(VmError::UnknownPage(id))?;
        if page.is_resident() {
            return Err(VmError::PageAlreadyResident(id));
        }

        let page_size = self.page_size();
        let (frame, evicted) = match self.physical_memory.first_fit(page_size) {
            Ok(frame) => (frame, None),
            Err(AllocError::OutOfMemory) => {
                let victim = self.evict_one()?;
                let frame = self
                    .physical_memory
                    .first_fit(page_size)
                    .inspect_err(|_| log::warn!("no frame for page {} after eviction", id))?;
                (frame, Some(victim))
            }
            Err(e) => return Err(e.into()),
        };

        self.physical_memory.reserve(frame);
        if let Some(page) = self.virtual_memory.page_mut(id) {
            page.link(frame.base());
        }
        log::debug!("loaded page {} into frame {:?}", id, frame);
        Ok(evicted)
    }

    /// Releases a page's frame.
    pub fn unlink_page(&mut self, id: PageId) -> Result<(), VmError> {
        let page = self
            .virtual_memory
            .page_mut(id)
            .ok_or(VmError::UnknownPage(id))?;
        let frame = page.unlink().ok_or(VmError::PageNotResident(id))?;

        self.physical_memory
            .free(MemoryRange::with_length(frame, self.config.page_size));
        log::trace!("unlinked page {} from frame {}", id, frame);
        Ok(())
    }

    /// Evicts one resident page chosen by the configured policy and returns its id.
    ///
    /// Fails with [`VmError::OutOfMemory`] if no page is resident.
    pub fn evict_one(&mut self) -> Result<PageId, VmError> {
        let victim = match self.config.eviction {
            EvictionPolicy::FirstResident => {
                self.virtual_memory.resident_pages().next().map(Page::id)
            }
            EvictionPolicy::Clock => self.clock_victim(),
        };

        let Some(victim) = victim else {
            log::warn!("out of memory with no resident page to evict");
            return Err(VmError::OutOfMemory);
        };

        self.unlink_page(victim)?;
        log::debug!("evicted page {}", victim);
        Ok(victim)
    }

    /// Sweeps the page table from the clock hand. Two full turns are enough: the first
    /// clears every accessed flag it passes.
    fn clock_victim(&mut self) -> Option<PageId> {
        let count = self.virtual_memory.len();
        for _ in 0..2 * count {
            let id = PageId::new(self.clock_hand);
            self.clock_hand = (self.clock_hand + 1) % count;

            let Some(page) = self.virtual_memory.page_mut(id) else {
                continue;
            };
            if !page.is_resident() {
                continue;
            }
            if !page.flags.test_and_clear(PageFlag::Accessed) {
                return Some(id);
            }
        }
        None
    }

    /// Executes the next instruction of a process, loading its page on a fault.
    ///
    /// The instruction is consumed even if the step fails.
    pub fn step(&mut self, pid: ProcessId) -> Result<StepOutcome, VmError> {
        let index = self.process_index(pid)?;
        let address = self.processes[index]
            .pop_instruction()
            .ok_or(VmError::ProcessDrained(pid))?;

        let (va, physical, faulted, evicted) = match self.translate(address)? {
            Translation::Resident(physical) => {
                (self.virtual_address(address)?, physical, false, None)
            }
            Translation::Fault(va) => {
                log::debug!("process {} faulted on {:#x} ({})", pid, address, va);
                let evicted = self.load_page(va.page)?;
                match self.translate(address)? {
                    Translation::Resident(physical) => (va, physical, true, evicted),
                    Translation::Fault(_) => return Err(VmError::PageNotResident(va.page)),
                }
            }
        };

        if let Some(page) = self.virtual_memory.page_mut(va.page) {
            page.flags.set(PageFlag::Accessed);
        }
        log::trace!("process {} executed {:#x} -> {}", pid, address, physical);

        Ok(StepOutcome {
            pid,
            virtual_address: address,
            physical_address: physical,
            faulted,
            evicted,
        })
    }

    /// Executes one instruction of every process that still has instructions, in process
    /// table order.
    ///
    /// Drained processes are skipped, not closed. The first fatal error ends the tick.
    pub fn step_all(&mut self) -> Result<Vec<StepOutcome>, VmError> {
        let runnable: Vec<ProcessId> = self
            .processes
            .iter()
            .filter(|process| !process.is_drained())
            .map(Process::id)
            .collect();

        runnable.into_iter().map(|pid| self.step(pid)).collect()
    }

    fn process_index(&self, pid: ProcessId) -> Result<usize, VmError> {
        self.processes
            .iter()
            .position(|process| process.id() == pid)
            .ok_or(VmError::UnknownProcess(pid))
    }

    /// Looks up a process by id.
    pub fn process(&self, pid: ProcessId) -> Option<&Process> {
        self.processes.iter().find(|process| process.id() == pid)
    }

    /// Returns the process table, in start order.
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Returns the ids of processes with no instructions left.
    pub fn finished_processes(&self) -> Vec<ProcessId> {
        self.processes
            .iter()
            .filter(|process| process.is_drained())
            .map(Process::id)
            .collect()
    }

    /// Looks up a page by id.
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.virtual_memory.page(id)
    }

    /// Returns a snapshot of the physical occupancy bitmap.
    pub fn occupancy(&self) -> &[bool] {
        self.physical_memory.occupancy()
    }

    pub fn free_cells(&self) -> usize {
        self.physical_memory.free_cells()
    }

    pub fn free_region_count(&self) -> usize {
        self.physical_memory.free_region_count()
    }

    pub fn resident_page_count(&self) -> usize {
        self.virtual_memory.resident_count()
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }
}
