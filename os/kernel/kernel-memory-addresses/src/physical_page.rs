use crate::{FrameNumber, MemoryAddress, PAGE_SHIFT, PhysicalAddress};
use core::fmt;

/// Physical 4 KiB frame base.
///
/// A `PhysicalPage` represents the **page-aligned base** of a physical frame.
///
/// ### Semantics
/// - `base()` returns the frame base as a [`PhysicalAddress`].
/// - `join(off)` combines this base with an in-frame offset to form a full
///   [`PhysicalAddress`].
///
/// ### Invariants
/// - The low 12 bits of the base are always zero (page aligned).
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x0012_3456);
/// let pp = pa.page();
/// assert_eq!(pp.base().as_u32() & 0xFFF, 0);
/// assert_eq!(pp.join(pa.offset()), pa);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(MemoryAddress);

impl PhysicalPage {
    /// The frame containing `p` (aligns down).
    #[inline]
    #[must_use]
    pub const fn from_addr(p: PhysicalAddress) -> Self {
        Self(p.0.align_down())
    }

    #[inline]
    #[must_use]
    pub const fn from_frame_number(frame: FrameNumber) -> Self {
        Self(MemoryAddress::new(frame.as_u32() << PAGE_SHIFT))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn frame_number(self) -> FrameNumber {
        FrameNumber::new(self.0.as_u32() >> PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, off: u32) -> PhysicalAddress {
        debug_assert!(off < crate::PAGE_SIZE);
        PhysicalAddress::new(self.0.as_u32() + off)
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage(0x{:08X})", self.0.as_u32())
    }
}

impl From<FrameNumber> for PhysicalPage {
    #[inline]
    fn from(frame: FrameNumber) -> Self {
        Self::from_frame_number(frame)
    }
}
