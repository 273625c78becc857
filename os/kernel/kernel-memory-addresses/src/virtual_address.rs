use crate::{MemoryAddress, PageNumber, VirtualPage};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Virtual memory address.
///
/// A thin wrapper around [`MemoryAddress`] that denotes **virtual** addresses.
/// It only carries the *kind* of address at the type level so you don't
/// accidentally mix virtual and physical values.
///
/// ### Semantics
/// - Use [`VirtualAddress::page`] / [`VirtualAddress::offset`] to derive the
///   page base and the in-page offset.
/// - [`directory_slot`](Self::directory_slot) and [`table_slot`](Self::table_slot)
///   return the raw 10-bit indices of the two-level walk.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let va = VirtualAddress::new(0xFFC0_3ABC);
/// assert_eq!(va.directory_slot(), 0x3FF);
/// assert_eq!(va.table_slot(), 0x003);
/// assert_eq!(va.offset(), 0xABC);
/// assert_eq!(va.page().join(va.offset()), va);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(pub(crate) MemoryAddress);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(MemoryAddress::new(v))
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0.as_u32()
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0.as_usize()
    }

    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPage {
        VirtualPage::from_addr(self)
    }

    #[inline]
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0.offset()
    }

    #[inline]
    #[must_use]
    pub const fn page_number(self) -> PageNumber {
        self.page().page_number()
    }

    /// Bits `[31:22]`: index into the page directory.
    #[inline]
    #[must_use]
    pub const fn directory_slot(self) -> usize {
        (self.as_u32() >> 22) as usize
    }

    /// Bits `[21:12]`: index into the page table.
    #[inline]
    #[must_use]
    pub const fn table_slot(self) -> usize {
        ((self.as_u32() >> 12) & 0x3FF) as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0.is_page_aligned()
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u32) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08X})", self.as_u32())
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl From<VirtualPage> for VirtualAddress {
    fn from(value: VirtualPage) -> Self {
        value.base()
    }
}

impl Add<u32> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}
