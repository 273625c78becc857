//! # Virtual Memory Support
//!
//! 32-bit x86 two-level paging for a teaching kernel: typed paging structures,
//! demand paging, and the seams the rest of the memory core plugs into.
//!
//! ## What you get
//! - An [`AddressSpace`] rooted at one page directory, with a recursive
//!   self-map in the last directory slot, an identity-mapped shared region,
//!   and an on-demand page-fault handler.
//! - x86 paging-entry bits ([`PageEntryBits`]) and 4 KiB-aligned
//!   [`PageDirectory`] / [`PageTable`] frames.
//! - Page-fault decoding ([`FaultCause`], [`InterruptFrame`], [`PageFault`]).
//! - Interfaces to the outside world: [`FrameAlloc`] (physical frames),
//!   [`PhysMapper`] (reach a frame by physical address), [`TableWindow`]
//!   (reach the paging structures of a space) and [`Mmu`] (CR0/CR2/CR3).
//!
//! ## x86 Virtual Address → Physical Address Walk
//!
//! Each 32-bit virtual address is divided into three fields:
//!
//! ```text
//! | 31‒22 | 21‒12 | 11‒0   |
//! |  PD   |  PT   | Offset |
//! ```
//!
//! ```text
//!  CR3 → PD → PT → Physical Page
//!        │     │
//!        │     └───► PTE (Page Table Entry)      → maps 4 KiB page
//!        └─────────► PDE (Page Directory Entry)  → points to a PT
//! ```
//!
//! Both levels hold 1024 (2¹⁰) entries of 4 bytes each; one directory entry
//! therefore covers 4 MiB of virtual address space.
//!
//! ### Recursive mapping
//!
//! Directory slot 1023 points back at the directory itself. Walking through
//! that slot treats the directory as a page table, which makes every table of
//! the active space visible at `0xFFC0_0000 + slot * 4096`, and the directory
//! itself at `0xFFFF_F000`. See [`RecursiveWindow`].

#![cfg_attr(not(any(test, doctest, feature = "test-support")), no_std)]
#![allow(unsafe_code)]

pub mod address_space;
mod config;
mod fault;
mod mmu;
mod page_entry_bits;
pub mod page_table;
mod window;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::address_space::{
    AddressSpace, AddressSpaceError, FreePageError, FreedPage, PageFaultError, PoolWindow,
    ServicedFault,
};
pub use crate::config::{FaultPolicy, PagingConfig};
pub use crate::fault::{FaultCause, InterruptFrame, PAGE_FAULT_VECTOR, PageFault};
pub use crate::mmu::Mmu;
#[cfg(all(feature = "asm", target_arch = "x86"))]
pub use crate::mmu::X86Mmu;
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::pd::{DirectoryIndex, PageDirectory, PdEntry};
pub use crate::page_table::pt::{PageTable, PtEntry, TableIndex};
pub use crate::window::{PhysicalWindow, RecursiveWindow, TableWindow};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};

/// Source of **physical** 4 KiB frames for paging structures and
/// demand-paged memory.
///
/// Returns `None` on out-of-memory. Returned frames **must** be 4 KiB aligned.
pub trait FrameAlloc {
    /// Allocate one frame for a page directory or page table.
    fn alloc_4k(&mut self) -> Option<PhysicalPage>;

    /// Allocate one frame to back a faulted-in page.
    ///
    /// Defaults to [`alloc_4k`](Self::alloc_4k); implementations that keep
    /// paging structures and data in different pools override it.
    fn alloc_data_4k(&mut self) -> Option<PhysicalPage> {
        self.alloc_4k()
    }

    /// Return a frame to whichever pool owns it.
    fn free_4k(&mut self, page: PhysicalPage);
}

impl<A: FrameAlloc + ?Sized> FrameAlloc for &mut A {
    fn alloc_4k(&mut self) -> Option<PhysicalPage> {
        (**self).alloc_4k()
    }

    fn alloc_data_4k(&mut self) -> Option<PhysicalPage> {
        (**self).alloc_data_4k()
    }

    fn free_4k(&mut self, page: PhysicalPage) {
        (**self).free_4k(page);
    }
}

/// Converts physical addresses to *temporarily* usable pointers in the current
/// virtual address space.
///
/// Typical patterns:
/// - **Before paging**: physical and virtual addresses coincide.
/// - **After paging**: frames inside the identity-mapped shared region are
///   still reachable at their physical address.
///
/// # Safety
/// - You must ensure `pa` is mapped as writable in the current page tables
///   for `&mut T`.
/// - Lifetime `'a` is purely borrow-checked; the mapping must remain valid
///   for `'a`.
/// - Type `T` must match the bytes at `pa` (no aliasing UB).
pub trait PhysMapper {
    /// Convert a *physical* address to a usable mutable reference.
    ///
    /// # Safety
    /// See the trait documentation.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &M {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        unsafe { (**self).phys_to_mut(pa) }
    }
}
