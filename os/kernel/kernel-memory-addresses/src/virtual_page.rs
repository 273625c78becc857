use crate::{MemoryAddress, PAGE_SHIFT, PageNumber, VirtualAddress};
use core::fmt;

/// Virtual 4 KiB page base.
///
/// A `VirtualPage` represents the **page-aligned base** of a virtual page.
///
/// ### Invariants
/// - The low 12 bits of the base are always zero (page aligned).
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0x0080_1234);
/// let vp = va.page();
/// assert_eq!(vp.base().as_u32(), 0x0080_1000);
/// assert_eq!(vp.join(va.offset()), va);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(MemoryAddress);

impl VirtualPage {
    /// The page containing `va` (aligns down).
    #[inline]
    #[must_use]
    pub const fn from_addr(va: VirtualAddress) -> Self {
        Self(va.0.align_down())
    }

    #[inline]
    #[must_use]
    pub const fn from_page_number(page: PageNumber) -> Self {
        Self(MemoryAddress::new(page.as_u32() << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn page_number(self) -> PageNumber {
        PageNumber::new(self.0.as_u32() >> PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: u32) -> VirtualAddress {
        debug_assert!(off < crate::PAGE_SIZE);
        VirtualAddress::new(self.0.as_u32() + off)
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage(0x{:08X})", self.0.as_u32())
    }
}

impl From<PageNumber> for VirtualPage {
    #[inline]
    fn from(page: PageNumber) -> Self {
        Self::from_page_number(page)
    }
}
