//! # x86 Page Table (PT)
//!
//! This module models the lowest paging level of 32-bit, non-PAE paging.
//!
//! - [`TableIndex`]: index type for VA bits `[21:12]`.
//! - [`PtEntry`]: a PT entry (PTE). Every present entry maps one 4 KiB page.
//! - [`PageTable`]: a 4 KiB-aligned array of 1024 PTEs.
//!
//! ## Invariants & Notes
//!
//! - The base address stored in a PTE is 4 KiB-aligned (hardware requirement).
//! - [`PtEntry::make_4k`] forces `present=1`.
//! - After modifying active mappings, the caller must perform any required TLB maintenance.

use crate::PageEntryBits;
use kernel_memory_addresses::{ENTRIES_PER_TABLE, PhysicalPage, VirtualAddress};

/// Index into the Page Table (derived from VA bits `[21:12]`).
///
/// Range is `0..1024` (checked in debug builds).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TableIndex(u16);

/// A single Page Table entry (PTE).
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone)]
pub struct PtEntry(PageEntryBits);

/// The Page Table: 1024 entries, 4 KiB-aligned.
#[doc(alias = "PT")]
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PtEntry; ENTRIES_PER_TABLE],
}

impl TableIndex {
    /// Build an index from a virtual address (extracts bits `[21:12]`).
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from(va: VirtualAddress) -> Self {
        Self::new(va.table_slot() as u16)
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
}

impl PtEntry {
    /// Create a zero (non-present) entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    #[inline]
    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0.present()
    }

    /// Expose the underlying bitfield for inspection.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// If present, return the mapped 4 KiB physical page and its flags.
    #[inline]
    #[must_use]
    pub const fn page_4k(self) -> Option<(PhysicalPage, PageEntryBits)> {
        if !self.is_present() {
            return None;
        }
        Some((self.0.physical_page(), self.0))
    }

    /// Create a 4 KiB leaf PTE.
    ///
    /// Sets `present=1` and writes the page base address.
    #[inline]
    #[must_use]
    pub const fn make_4k(page: PhysicalPage, mut flags: PageEntryBits) -> Self {
        flags.set_present(true);
        flags.set_physical_page(page);
        Self(flags)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.into_bits()
    }
}

impl PageTable {
    /// Create a fully zeroed Page Table (all entries non-present).
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            entries: [PtEntry::zero(); ENTRIES_PER_TABLE],
        }
    }

    /// Clear every entry.
    pub fn zero(&mut self) {
        self.entries.fill(PtEntry::zero());
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, i: TableIndex) -> PtEntry {
        self.entries[i.as_usize()]
    }

    /// Write the entry at `i`.
    ///
    /// Caller must handle any required TLB invalidation when changing active mappings.
    #[inline]
    pub const fn set(&mut self, i: TableIndex, e: PtEntry) {
        self.entries[i.as_usize()] = e;
    }

    /// `true` if no entry is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.entries.iter().any(|e| e.is_present())
    }

    /// Present entries together with their index.
    #[allow(clippy::cast_possible_truncation)]
    pub fn present_entries(&self) -> impl Iterator<Item = (TableIndex, PtEntry)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_present())
            .map(|(i, e)| (TableIndex::new(i as u16), *e))
    }
}
