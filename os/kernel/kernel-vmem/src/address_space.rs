//! # Address Space (32-bit x86, directory-rooted)
//!
//! One [`AddressSpace`] owns one page directory and every page table hanging
//! off it. It is the only place that edits translation entries.
//!
//! ## Highlights
//!
//! - [`AddressSpace::new`] builds the directory: the shared region at the
//!   bottom of memory is identity-mapped, every other slot is absent, and the
//!   last slot maps the directory to itself.
//! - [`AddressSpace::handle_fault`] services not-present faults on demand by
//!   allocating a data frame (and a table frame if needed) and installing the
//!   entries.
//! - [`AddressSpace::free_page`] undoes one demand-paged mapping and gives the
//!   table frame back once the table is empty.
//! - [`AddressSpace::translate`] walks the structure for a VA→PA query.
//! - [`AddressSpace::destroy`] tears the space down.
//!
//! ## Page states
//!
//! ```text
//!            not-present fault
//!  Unmapped ───────────────────► Mapped
//!     ▲                            │
//!     └────────── free_page ───────┘
//! ```
//!
//! Pages in the shared region are `Mapped` from construction and never
//! change state.
//!
//! ## Safety
//!
//! - Structures are reached only through the [`TableWindow`]. With a
//!   [`RecursiveWindow`](crate::RecursiveWindow) this space must be the active one.
//! - Mutating active mappings requires a TLB flush ([`AddressSpace::load`]
//!   reloads CR3); the fault path needs none since the entry was not present.
//! - Fault handling is not reentrant: callers serialize access.

use crate::info::RECURSIVE_SLOT;
use crate::page_table::pd::{DirectoryIndex, PageDirectory, PdEntry};
use crate::page_table::pt::{PageTable, PtEntry, TableIndex};
use crate::page_table::split_indices;
use crate::{
    FaultCause, FaultPolicy, FrameAlloc, Mmu, PageEntryBits, PageFault, PagingConfig, PhysMapper,
    TableWindow,
};
use kernel_memory_addresses::{
    FrameNumber, PAGES_PER_TABLE, PageNumber, PhysicalAddress, PhysicalPage, VirtualAddress,
    VirtualPage, pages_for,
};
use log::{debug, info, trace, warn};

/// Largest number of VM-pool windows one address space tracks.
pub const MAX_REGISTERED_POOLS: usize = 16;

/// The virtual window of a VM pool, as registered with its address space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PoolWindow {
    pub base: VirtualAddress,
    pub size: u32,
}

impl PoolWindow {
    #[must_use]
    pub const fn new(base: VirtualAddress, size: u32) -> Self {
        Self { base, size }
    }

    /// `base <= va < base + size`.
    #[must_use]
    pub const fn contains(&self, va: VirtualAddress) -> bool {
        va.as_u32() >= self.base.as_u32() && va.as_u32() - self.base.as_u32() < self.size
    }
}

/// What a serviced not-present fault installed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ServicedFault {
    /// The page that is now mapped.
    pub page: VirtualPage,
    /// The data frame backing it.
    pub frame: PhysicalPage,
    /// The table frame, if the fault also had to create the page table.
    pub table: Option<PhysicalPage>,
}

/// What [`AddressSpace::free_page`] gave back.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FreedPage {
    pub frame: PhysicalPage,
    /// The table frame, if the table became empty and was released too.
    pub table: Option<PhysicalPage>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PageFaultError {
    #[error("protection fault at {address}: {cause}")]
    Protection {
        address: VirtualAddress,
        cause: FaultCause,
    },
    #[error("no space: no frame available to service the fault at {address}")]
    OutOfFrames { address: VirtualAddress },
    #[error("fault at {address} lies in the recursive table window")]
    ReservedWindow { address: VirtualAddress },
    #[error("fault at {address} lies in the shared identity-mapped region")]
    SharedRegion { address: VirtualAddress },
    #[error("not-present fault at {address}, but the page is already mapped")]
    AlreadyMapped { address: VirtualAddress },
    #[error("fault at {address} lies outside every registered VM pool")]
    Illegitimate { address: VirtualAddress },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AddressSpaceError {
    #[error("no frame available for the directory or a shared table")]
    OutOfFrames,
    #[error("VM pool registry is full ({MAX_REGISTERED_POOLS} entries)")]
    RegistryFull,
    #[error("shared region of {size:#x} bytes reaches the recursive slot")]
    SharedRegionTooLarge { size: u32 },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FreePageError {
    #[error("page {page} is not mapped")]
    NotMapped { page: PageNumber },
    #[error("page {page} belongs to the shared identity-mapped region")]
    SharedRegion { page: PageNumber },
    #[error("page {page} lies in the recursive table window")]
    ReservedWindow { page: PageNumber },
}

/// Handle to a single, concrete address space.
pub struct AddressSpace<W: TableWindow> {
    directory: PhysicalPage,
    window: W,
    config: PagingConfig,
    /// Directory slots `0..shared_slots` hold the shared identity map.
    shared_slots: usize,
    pools: [Option<PoolWindow>; MAX_REGISTERED_POOLS],
}

impl<W: TableWindow> AddressSpace<W> {
    /// Build a new address space.
    ///
    /// The directory and the shared tables are taken from `frames` and written
    /// through `mapper`, so this works before paging is enabled. Afterwards all
    /// accesses go through `window`.
    ///
    /// # Errors
    /// - [`AddressSpaceError::SharedRegionTooLarge`] if the shared region would
    ///   need the recursive slot.
    /// - [`AddressSpaceError::OutOfFrames`] if a frame could not be allocated;
    ///   frames taken so far are returned.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new<M, A>(
        mapper: &M,
        frames: &mut A,
        window: W,
        config: PagingConfig,
    ) -> Result<Self, AddressSpaceError>
    where
        M: PhysMapper + ?Sized,
        A: FrameAlloc + ?Sized,
    {
        let shared_pages = pages_for(config.shared_size);
        let shared_slots = shared_pages.div_ceil(PAGES_PER_TABLE) as usize;
        if shared_slots >= RECURSIVE_SLOT {
            return Err(AddressSpaceError::SharedRegionTooLarge {
                size: config.shared_size,
            });
        }

        let directory = frames.alloc_4k().ok_or(AddressSpaceError::OutOfFrames)?;
        // SAFETY: freshly allocated frame, reachable through `mapper`.
        let dir = unsafe { mapper.phys_to_mut::<PageDirectory>(directory.base()) };
        dir.fill(PdEntry::absent());

        for slot in 0..shared_slots {
            let d = DirectoryIndex::new(slot as u16);
            let Some(table_frame) = frames.alloc_4k() else {
                warn!("address space: out of frames after {slot} shared table(s)");
                release_shared_tables(dir, frames, slot);
                frames.free_4k(directory);
                return Err(AddressSpaceError::OutOfFrames);
            };

            // SAFETY: freshly allocated frame, reachable through `mapper`.
            let table = unsafe { mapper.phys_to_mut::<PageTable>(table_frame.base()) };
            table.zero();

            let first = slot as u32 * PAGES_PER_TABLE;
            let last = shared_pages.min(first + PAGES_PER_TABLE);
            for frame in first..last {
                let page = FrameNumber::new(frame).page();
                table.set(
                    TableIndex::new((frame - first) as u16),
                    PtEntry::make_4k(page, PageEntryBits::new_kernel_rw()),
                );
            }
            dir.set(d, PdEntry::make_table(table_frame, PageEntryBits::new_kernel_rw()));
            trace!("shared table for slot {slot} at {table_frame}");
        }

        dir.set(
            DirectoryIndex::new(RECURSIVE_SLOT as u16),
            PdEntry::make_table(directory, PageEntryBits::new_kernel_rw()),
        );

        info!(
            "Constructed address space: directory at {directory}, {} shared bytes",
            config.shared_size
        );
        Ok(Self {
            directory,
            window,
            config,
            shared_slots,
            pools: [None; MAX_REGISTERED_POOLS],
        })
    }

    /// Physical page of the directory.
    #[inline]
    pub const fn directory_page(&self) -> PhysicalPage {
        self.directory
    }

    #[inline]
    pub const fn config(&self) -> &PagingConfig {
        &self.config
    }

    #[inline]
    pub const fn window(&self) -> &W {
        &self.window
    }

    /// Number of directory slots taken by the shared identity map.
    #[inline]
    pub const fn shared_slots(&self) -> usize {
        self.shared_slots
    }

    /// Make this the active address space (loads CR3).
    ///
    /// Also used to flush cached translations after entries were removed.
    pub fn load<U: Mmu + ?Sized>(&self, mmu: &mut U) {
        mmu.load_directory(self.directory);
        debug!("Loaded page directory {}", self.directory);
    }

    /// Turn on paging (CR0.PG). A directory must have been loaded first.
    pub fn enable_paging<U: Mmu + ?Sized>(&self, mmu: &mut U) {
        mmu.enable_paging();
        info!("Enabled paging");
    }

    /// Register the window of a VM pool so that legitimacy queries know about it.
    ///
    /// # Errors
    /// [`AddressSpaceError::RegistryFull`] if all slots are taken.
    pub fn register_pool(&mut self, pool: PoolWindow) -> Result<(), AddressSpaceError> {
        let Some(slot) = self.pools.iter_mut().find(|p| p.is_none()) else {
            warn!("Cannot register VM pool at {}: registry full", pool.base);
            return Err(AddressSpaceError::RegistryFull);
        };
        *slot = Some(pool);
        debug!("Registered VM pool {}+{:#x}", pool.base, pool.size);
        Ok(())
    }

    /// Registered VM-pool windows, in registration order.
    pub fn registered_pools(&self) -> impl Iterator<Item = &PoolWindow> {
        self.pools.iter().flatten()
    }

    /// `true` if `va` lies inside any registered VM-pool window.
    #[must_use]
    pub fn is_legitimate(&self, va: VirtualAddress) -> bool {
        self.registered_pools().any(|p| p.contains(va))
    }

    /// Service a page fault.
    ///
    /// Protection faults are reported and left alone. Not-present faults get a
    /// data frame from [`FrameAlloc::alloc_data_4k`] and, if the directory slot
    /// is empty, a zeroed table from [`FrameAlloc::alloc_4k`]. The new entry is
    /// present, and writable / user-accessible exactly when the faulting access was.
    ///
    /// Faults in the shared region or on a page that is already mapped are
    /// refused; existing mappings are never replaced.
    ///
    /// # Errors
    /// See [`PageFaultError`]. Nothing is installed on error; a data frame taken
    /// before a table allocation failed is returned.
    pub fn handle_fault<A: FrameAlloc + ?Sized>(
        &mut self,
        frames: &mut A,
        fault: PageFault,
    ) -> Result<ServicedFault, PageFaultError> {
        let PageFault { address, cause } = fault;

        if cause.present() {
            warn!("Protection fault at {address}: {cause}");
            return Err(PageFaultError::Protection { address, cause });
        }

        let (d, t) = split_indices(address);
        if d.as_usize() == RECURSIVE_SLOT {
            warn!("Fault at {address} inside the recursive window");
            return Err(PageFaultError::ReservedWindow { address });
        }

        if self.config.fault_policy == FaultPolicy::RequireLegitimate
            && !self.is_legitimate(address)
        {
            warn!("Fault at {address} outside every VM pool");
            return Err(PageFaultError::Illegitimate { address });
        }

        if d.as_usize() < self.shared_slots {
            warn!("Fault at {address} inside the shared region");
            return Err(PageFaultError::SharedRegion { address });
        }

        // SAFETY: the window views this space; no other borrow is live.
        let dir = unsafe { self.window.directory(self.directory) };
        if let Some(table) = dir.get(d).table() {
            // SAFETY: the directory entry for `d` is present and points at `table`.
            let table = unsafe { self.window.table(d, table) };
            if table.get(t).is_present() {
                warn!("Not-present fault at {address} on a mapped page");
                return Err(PageFaultError::AlreadyMapped { address });
            }
        }

        let Some(frame) = frames.alloc_data_4k() else {
            warn!("No space to service fault at {address}");
            return Err(PageFaultError::OutOfFrames { address });
        };

        let (table_frame, new_table) = if let Some(table) = dir.get(d).table() {
            (table, None)
        } else {
            let Some(table) = frames.alloc_4k() else {
                frames.free_4k(frame);
                warn!("No space for a page table to service fault at {address}");
                return Err(PageFaultError::OutOfFrames { address });
            };
            dir.set(d, PdEntry::make_table(table, PageEntryBits::new_kernel_rw()));
            trace!("Installed table {table} in directory slot {}", d.as_usize());
            (table, Some(table))
        };

        // SAFETY: the directory entry for `d` is present and points at `table_frame`.
        let table = unsafe { self.window.table(d, table_frame) };
        if new_table.is_some() {
            table.zero();
        }
        let flags = PageEntryBits::from_access(cause.write(), cause.user());
        table.set(t, PtEntry::make_4k(frame, flags));

        debug!("Serviced fault at {address}: mapped {frame}");
        Ok(ServicedFault {
            page: address.page(),
            frame,
            table: new_table,
        })
    }

    /// Unmap one demand-paged page and give its frame back.
    ///
    /// If the page table becomes empty, its frame is released and the directory
    /// slot reset to absent. Cached translations are not flushed; call
    /// [`load`](Self::load) afterwards if this space is active.
    ///
    /// # Errors
    /// [`FreePageError`] if the page is not a demand-paged mapping.
    pub fn free_page<A: FrameAlloc + ?Sized>(
        &mut self,
        frames: &mut A,
        page: PageNumber,
    ) -> Result<FreedPage, FreePageError> {
        let (d, t) = split_indices(page.base_address());
        if d.as_usize() == RECURSIVE_SLOT {
            return Err(FreePageError::ReservedWindow { page });
        }
        if d.as_usize() < self.shared_slots {
            return Err(FreePageError::SharedRegion { page });
        }

        // SAFETY: the window views this space; no other borrow is live.
        let dir = unsafe { self.window.directory(self.directory) };
        let Some(table_frame) = dir.get(d).table() else {
            return Err(FreePageError::NotMapped { page });
        };

        // SAFETY: the directory entry for `d` is present and points at `table_frame`.
        let table = unsafe { self.window.table(d, table_frame) };
        let Some((frame, _)) = table.get(t).page_4k() else {
            return Err(FreePageError::NotMapped { page });
        };

        frames.free_4k(frame);
        table.set(t, PtEntry::zero());
        debug!("Freed page {page}: released {frame}");

        let released_table = if table.is_empty() {
            frames.free_4k(table_frame);
            dir.set(d, PdEntry::absent());
            trace!("Released empty table {table_frame} of slot {}", d.as_usize());
            Some(table_frame)
        } else {
            None
        };

        Ok(FreedPage {
            frame,
            table: released_table,
        })
    }

    /// Translate a `VirtualAddress` to a `PhysicalAddress` if mapped.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let (d, t) = split_indices(va);
        // SAFETY: the window views this space; the borrows end with this call.
        let dir = unsafe { self.window.directory(self.directory) };
        let table_frame = dir.get(d).table()?;
        // SAFETY: the directory entry for `d` is present and points at `table_frame`.
        let table = unsafe { self.window.table(d, table_frame) };
        let (page, _) = table.get(t).page_4k()?;
        Some(page.join(va.offset()))
    }

    #[must_use]
    pub fn is_mapped(&self, va: VirtualAddress) -> bool {
        self.translate(va).is_some()
    }

    /// Tear the address space down.
    ///
    /// Releases every demand-paged frame, every table frame and the directory
    /// frame. The identity-mapped frames of the shared region are not owned and
    /// stay untouched. Returns the number of frames released.
    ///
    /// With a [`RecursiveWindow`](crate::RecursiveWindow) the space must still
    /// be active; the caller switches to another directory afterwards.
    #[allow(clippy::cast_possible_truncation)]
    pub fn destroy<A: FrameAlloc + ?Sized>(self, frames: &mut A) -> usize {
        // SAFETY: the window views this space; no other borrow is live.
        let dir = unsafe { self.window.directory(self.directory) };
        let mut released = 0;

        for slot in 0..RECURSIVE_SLOT {
            let d = DirectoryIndex::new(slot as u16);
            let Some(table_frame) = dir.get(d).table() else {
                continue;
            };

            if slot >= self.shared_slots {
                // SAFETY: the directory entry for `d` is present and points at `table_frame`.
                let table = unsafe { self.window.table(d, table_frame) };
                for (_, entry) in table.present_entries() {
                    if let Some((frame, _)) = entry.page_4k() {
                        frames.free_4k(frame);
                        released += 1;
                    }
                }
            }

            dir.set(d, PdEntry::absent());
            frames.free_4k(table_frame);
            released += 1;
        }

        frames.free_4k(self.directory);
        released += 1;

        info!(
            "Destroyed address space {}: released {released} frame(s)",
            self.directory
        );
        released
    }
}

/// Give back the tables of shared slots `0..slots` during a failed construction.
#[allow(clippy::cast_possible_truncation)]
fn release_shared_tables<A: FrameAlloc + ?Sized>(
    dir: &PageDirectory,
    frames: &mut A,
    slots: usize,
) {
    for slot in 0..slots {
        if let Some(table) = dir.get(DirectoryIndex::new(slot as u16)).table() {
            frames.free_4k(table);
        }
    }
}
