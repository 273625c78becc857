use crate::{FrameNumber, MemoryAddress, PhysicalPage};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical memory address.
///
/// A thin wrapper around [`MemoryAddress`] that denotes **physical** addresses
/// (RAM / MMIO). Like [`VirtualAddress`](super::VirtualAddress), this type carries intent and
/// prevents accidental VA/PA mix-ups.
///
/// ### Notes
/// - Translation entries store a **page-aligned** physical base (low 12 bits
///   cleared) plus flag bits; use [`page`](Self::page) and
///   [`offset`](Self::offset) to reason about base vs. offset explicitly.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x0020_0042);
/// assert_eq!(pa.page().base().as_u32(), 0x0020_0000);
/// assert_eq!(pa.offset(), 0x42);
/// assert_eq!(pa.frame_number(), FrameNumber::new(0x200));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(pub(crate) MemoryAddress);

impl PhysicalAddress {
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

    /// The 4 KiB frame containing this address.
    #[inline]
    #[must_use]
    pub const fn page(self) -> PhysicalPage {
        PhysicalPage::from_addr(self)
    }

    /// Offset of this address inside its frame.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0.offset()
    }

    /// Number of the frame containing this address.
    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> FrameNumber {
        self.page().frame_number()
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.0.is_page_aligned()
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:08X})", self.as_u32())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u32> for PhysicalAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalPage> for PhysicalAddress {
    #[inline]
    fn from(value: PhysicalPage) -> Self {
        value.base()
    }
}

impl Add<u32> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}
