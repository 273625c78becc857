//! # Virtual and Physical Memory Address Types (32-bit)
//!
//! Strongly typed wrappers for raw memory addresses, page bases and frame
//! numbers used by the paging and frame-allocation code of a 32-bit x86 kernel.
//!
//! ## Overview
//!
//! The types prevent mixing virtual and physical addresses (or addresses and
//! frame numbers) at compile time while remaining zero-cost wrappers around
//! `u32` values.
//!
//! | Concept | Description |
//! |----------|-------------|
//! | [`MemoryAddress`] | A raw 32-bit address, either physical or virtual. |
//! | [`PhysicalAddress`] / [`VirtualAddress`] | An address with physical or virtual intent. |
//! | [`PhysicalPage`] / [`VirtualPage`] | A 4 KiB-aligned page base. |
//! | [`FrameNumber`] / [`PageNumber`] | The index of a 4 KiB frame or page (`address >> 12`). |
//!
//! ## Address split
//!
//! With two-level paging every 32-bit virtual address is divided into three
//! fields:
//!
//! ```text
//! | 31‒22     | 21‒12 | 11‒0   |
//! | Directory | Table | Offset |
//! ```
//!
//! The directory and table fields are 10 bits wide (1024 entries per level);
//! the offset selects the byte within the 4 KiB page.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0040_1234);
//! let page = va.page();
//! assert_eq!(page.base().as_u32(), 0x0040_1000);
//! assert_eq!(va.offset(), 0x234);
//! assert_eq!(page.page_number(), PageNumber::new(0x401));
//!
//! let frame = FrameNumber::new(512);
//! assert_eq!(frame.base_address(), PhysicalAddress::new(0x0020_0000));
//! assert_eq!(PhysicalAddress::new(0x0020_0042).frame_number(), frame);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod frame_number;
mod memory_address;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use frame_number::{FrameNumber, PageNumber};
pub use memory_address::MemoryAddress;
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Size of a frame / page in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// `log2(PAGE_SIZE)`: number of low bits holding the in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Mask selecting the in-page offset bits.
pub const PAGE_OFFSET_MASK: u32 = PAGE_SIZE - 1;

/// Number of four-byte entries in a page directory or page table.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Number of pages covered by one page table (one directory entry).
pub const PAGES_PER_TABLE: u32 = 1024;

/// Bytes of virtual address space covered by one directory entry (4 MiB).
pub const BYTES_PER_TABLE: u32 = PAGES_PER_TABLE * PAGE_SIZE;

/// Round `bytes` up to a whole number of pages.
///
/// ```rust
/// # use kernel_memory_addresses::pages_for;
/// assert_eq!(pages_for(0), 0);
/// assert_eq!(pages_for(1), 1);
/// assert_eq!(pages_for(4096), 1);
/// assert_eq!(pages_for(4097), 2);
/// ```
#[inline]
#[must_use]
pub const fn pages_for(bytes: u32) -> u32 {
    bytes.div_ceil(PAGE_SIZE)
}

const _: () = {
    assert!(1 << PAGE_SHIFT == PAGE_SIZE);
    assert!(ENTRIES_PER_TABLE * size_of::<u32>() == PAGE_SIZE as usize);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_virtual() {
        let va = VirtualAddress::new(0xC012_3456);
        let page = va.page();
        assert_eq!(page.base().as_u32(), 0xC012_3000);
        assert_eq!(page.join(va.offset()), va);
    }

    #[test]
    fn frame_numbers_round_trip_through_addresses() {
        let pa = PhysicalAddress::new(0x0040_0FFF);
        let frame = pa.frame_number();
        assert_eq!(frame.as_u32(), 0x400);
        assert_eq!(frame.page().base(), PhysicalAddress::new(0x0040_0000));
    }

    #[test]
    fn page_numbers_split_into_directory_and_table() {
        let page = PageNumber::new((5 << 10) | 17);
        assert_eq!(page.directory_slot(), 5);
        assert_eq!(page.table_slot(), 17);
        assert_eq!(page.base_address(), VirtualAddress::new((5 << 22) | (17 << 12)));
    }
}
