//! # x86 Page Directory (PD)
//!
//! This module models the top paging level of 32-bit, non-PAE paging:
//!
//! - [`DirectoryIndex`]: index type for virtual-address bits `[31:22]`.
//! - [`PdEntry`]: a PD entry pointing to a 4 KiB-aligned [`PageTable`](super::pt::PageTable).
//! - [`PageDirectory`]: a 4 KiB-aligned array of 1024 PD entries.
//!
//! ## Invariants & Notes
//!
//! - 4 MiB pages (`PS=1`) are never created; every present entry points to a table.
//! - The last slot ([`RECURSIVE_SLOT`](crate::info::RECURSIVE_SLOT)) of every
//!   directory maps the directory itself.
//! - TLB maintenance is the caller's responsibility after mutating active mappings.

use crate::PageEntryBits;
use kernel_memory_addresses::{ENTRIES_PER_TABLE, PhysicalPage, VirtualAddress};

/// Index into the Page Directory (derived from VA bits `[31:22]`).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DirectoryIndex(u16);

/// A single Page Directory entry (PDE).
#[doc(alias = "PDE")]
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct PdEntry(PageEntryBits);

/// The Page Directory: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PD")]
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PdEntry; ENTRIES_PER_TABLE],
}

impl DirectoryIndex {
    /// Build an index from a virtual address (extracts bits `[31:22]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(va.directory_slot() as u16)
    }

    /// Construct from a raw `u16`.
    ///
    /// ### Debug assertions
    /// - Asserts `v < 1024` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Self {
        debug_assert!(v < 1024);
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// First virtual address covered by this directory slot.
    #[inline]
    #[must_use]
    pub const fn base_address(self) -> VirtualAddress {
        VirtualAddress::new((self.0 as u32) << 22)
    }
}

impl PdEntry {
    /// A not-present entry with the writable bit set.
    ///
    /// Directory slots without a table hold this value (raw `0x2`).
    #[inline]
    #[must_use]
    pub const fn absent() -> Self {
        Self(PageEntryBits::new().with_writable(true))
    }

    /// Create an entry pointing at the table in `table`.
    ///
    /// Sets `present=1` and forces `PS=0`.
    #[inline]
    #[must_use]
    pub const fn make_table(table: PhysicalPage, mut flags: PageEntryBits) -> Self {
        flags.set_large_page(false);
        flags.set_present(true);
        flags.set_physical_page(table);
        Self(flags)
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// If present, the frame holding the next-level table.
    #[inline]
    #[must_use]
    pub const fn table(self) -> Option<PhysicalPage> {
        if self.is_present() {
            Some(self.0.physical_page())
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }
}

impl PageDirectory {
    /// Overwrite every entry with `e`.
    pub fn fill(&mut self, e: PdEntry) {
        self.entries.fill(e);
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: DirectoryIndex) -> PdEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active mappings.
    #[inline]
    pub const fn set(&mut self, i: DirectoryIndex, e: PdEntry) {
        self.entries[i.as_usize()] = e;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kernel_memory_addresses::PhysicalAddress;

    #[test]
    fn absent_entry_is_writable_but_not_present() {
        let e = PdEntry::absent();
        assert_eq!(e.raw(), 2);
        assert!(!e.is_present());
        assert!(e.table().is_none());
    }

    #[test]
    fn table_entry_points_at_its_frame() {
        let page = PhysicalAddress::new(0x0040_1000).page();
        let e = PdEntry::make_table(page, PageEntryBits::new_kernel_rw());
        assert_eq!(e.raw(), 0x0040_1003);
        assert_eq!(e.table(), Some(page));
        assert!(!e.flags().large_page());
    }

    #[test]
    fn index_from_address() {
        let i = DirectoryIndex::from(VirtualAddress::new(0x2000_1234));
        assert_eq!(i.as_usize(), 0x80);
        assert_eq!(i.base_address(), VirtualAddress::new(0x2000_0000));
    }
}
