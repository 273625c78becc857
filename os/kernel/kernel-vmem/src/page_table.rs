//! # Memory Page Table

pub mod pd;
pub mod pt;

use crate::page_table::pd::DirectoryIndex;
use crate::page_table::pt::TableIndex;
use kernel_memory_addresses::VirtualAddress;

/// Split a virtual address into its directory and table indices.
#[inline]
#[must_use]
pub const fn split_indices(va: VirtualAddress) -> (DirectoryIndex, TableIndex) {
    (DirectoryIndex::from(va), TableIndex::from(va))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_ok() {
        let (d, t) = split_indices(VirtualAddress::new(0xFFC0_3ABC));
        assert_eq!(d.as_usize(), 1023);
        assert_eq!(t.as_usize(), 3);
    }
}
