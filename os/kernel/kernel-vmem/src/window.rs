//! # Table Windows
//!
//! An [`AddressSpace`](crate::AddressSpace) never dereferences a physical
//! address directly once it has been built. Every directory and table access
//! goes through a [`TableWindow`], which decides *where* in the current
//! virtual address space a paging structure is visible.
//!
//! - [`RecursiveWindow`]: the active address space's own tables, seen through
//!   the self-referencing last directory slot. The directory lives at
//!   `0xFFFF_F000`; the table of directory slot `d` at `0xFFC0_0000 | d << 12`.
//! - [`PhysicalWindow`]: any address space, reached through a [`PhysMapper`].
//!   Used before paging is enabled and on hosts without an MMU.

use crate::info::{RECURSIVE_DIRECTORY_ADDRESS, RECURSIVE_TABLES_BASE};
use crate::page_table::pd::{DirectoryIndex, PageDirectory};
use crate::page_table::pt::PageTable;
use crate::PhysMapper;
use kernel_memory_addresses::{PAGE_SHIFT, PhysicalPage, VirtualAddress};

/// Access path to the paging structures of one address space.
pub trait TableWindow {
    /// Borrow the page directory stored in `directory`.
    ///
    /// # Safety
    /// - `directory` must be the directory frame of the address space this
    ///   window can see.
    /// - The caller must not create overlapping mutable borrows.
    unsafe fn directory<'a>(&self, directory: PhysicalPage) -> &'a mut PageDirectory;

    /// Borrow the page table installed in directory slot `slot`, stored in `table`.
    ///
    /// # Safety
    /// - The directory entry at `slot` must be present and point at `table`.
    /// - The caller must not create overlapping mutable borrows.
    unsafe fn table<'a>(&self, slot: DirectoryIndex, table: PhysicalPage) -> &'a mut PageTable;
}

/// Window onto the **active** address space through its recursive directory slot.
///
/// The physical frame arguments of [`TableWindow`] are ignored; the
/// hardware walk through the self-map locates the structures.
#[derive(Debug, Copy, Clone)]
pub struct RecursiveWindow {
    _private: (),
}

impl RecursiveWindow {
    /// # Safety
    /// The address space using this window must be the one loaded in CR3,
    /// with paging enabled, whenever the window is accessed.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// Virtual address at which the active directory is visible.
    #[inline]
    #[must_use]
    pub const fn directory_address() -> VirtualAddress {
        RECURSIVE_DIRECTORY_ADDRESS
    }

    /// Virtual address at which the table of directory slot `slot` is visible.
    ///
    /// ```rust
    /// # use kernel_vmem::{RecursiveWindow, page_table::pd::DirectoryIndex};
    /// let va = RecursiveWindow::table_address(DirectoryIndex::new(2));
    /// assert_eq!(va.as_u32(), 0xFFC0_2000);
    /// let dir = RecursiveWindow::table_address(DirectoryIndex::new(1023));
    /// assert_eq!(dir, RecursiveWindow::directory_address());
    /// ```
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn table_address(slot: DirectoryIndex) -> VirtualAddress {
        VirtualAddress::new(RECURSIVE_TABLES_BASE.as_u32() | ((slot.as_usize() as u32) << PAGE_SHIFT))
    }
}

impl TableWindow for RecursiveWindow {
    unsafe fn directory<'a>(&self, _directory: PhysicalPage) -> &'a mut PageDirectory {
        let ptr = Self::directory_address().as_usize() as *mut PageDirectory;
        // SAFETY: the self-map exposes the active directory at this address.
        unsafe { &mut *ptr }
    }

    unsafe fn table<'a>(&self, slot: DirectoryIndex, _table: PhysicalPage) -> &'a mut PageTable {
        let ptr = Self::table_address(slot).as_usize() as *mut PageTable;
        // SAFETY: the directory entry at `slot` is present, so the self-map exposes its table.
        unsafe { &mut *ptr }
    }
}

/// Window onto any address space via a [`PhysMapper`].
#[derive(Debug, Copy, Clone)]
pub struct PhysicalWindow<M> {
    mapper: M,
}

impl<M: PhysMapper> PhysicalWindow<M> {
    pub const fn new(mapper: M) -> Self {
        Self { mapper }
    }

    pub const fn mapper(&self) -> &M {
        &self.mapper
    }
}

impl<M: PhysMapper> TableWindow for PhysicalWindow<M> {
    unsafe fn directory<'a>(&self, directory: PhysicalPage) -> &'a mut PageDirectory {
        unsafe { self.mapper.phys_to_mut::<PageDirectory>(directory.base()) }
    }

    unsafe fn table<'a>(&self, _slot: DirectoryIndex, table: PhysicalPage) -> &'a mut PageTable {
        unsafe { self.mapper.phys_to_mut::<PageTable>(table.base()) }
    }
}
