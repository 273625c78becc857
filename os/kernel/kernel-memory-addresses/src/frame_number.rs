use crate::{PAGE_SHIFT, PhysicalAddress, PhysicalPage, VirtualAddress, VirtualPage};
use core::fmt;
use core::ops::{Add, Sub};

/// Number of a 4 KiB physical frame (`physical address >> 12`).
///
/// Frame allocators hand out and take back frame numbers; the translation
/// entries store them in bits `[31:12]`.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameNumber(u32);

/// Number of a 4 KiB virtual page (`virtual address >> 12`).
///
/// The upper ten bits select the directory slot, the lower ten bits the table slot.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PageNumber(u32);

impl FrameNumber {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn page(self) -> PhysicalPage {
        PhysicalPage::from_frame_number(self)
    }

    #[inline]
    #[must_use]
    pub const fn base_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << PAGE_SHIFT)
    }
}

impl PageNumber {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPage {
        VirtualPage::from_page_number(self)
    }

    #[inline]
    #[must_use]
    pub const fn base_address(self) -> VirtualAddress {
        VirtualAddress::new(self.0 << PAGE_SHIFT)
    }

    /// Upper ten bits: directory slot.
    #[inline]
    #[must_use]
    pub const fn directory_slot(self) -> usize {
        (self.0 >> 10) as usize
    }

    /// Lower ten bits: table slot.
    #[inline]
    #[must_use]
    pub const fn table_slot(self) -> usize {
        (self.0 & 0x3FF) as usize
    }
}

impl fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame#{}", self.0)
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page#{:#X}", self.0)
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

impl Add<u32> for FrameNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub for FrameNumber {
    type Output = u32;
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}

impl Add<u32> for PageNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl From<u32> for FrameNumber {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl From<u32> for PageNumber {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}
