use bitfield_struct::bitfield;
use kernel_memory_addresses::{FrameNumber, PhysicalPage};

/// Represents a single 32-bit x86 paging entry in its raw bitfield form.
///
/// The same layout is used by page-directory entries (PDE) and page-table
/// entries (PTE) of the two-level, non-PAE paging mode.
///
/// ### Bit layout
///
/// | Bits  | Name / Mnemonic | Meaning |
/// |-------|-----------------|---------|
/// | 0     | `P` (present)   | Valid entry if set |
/// | 1     | `RW`            | Writable if set |
/// | 2     | `US`            | User-mode accessible if set |
/// | 3     | `PWT`           | Write-through caching |
/// | 4     | `PCD`           | Disable caching |
/// | 5     | `A`             | Accessed |
/// | 6     | `D`             | Dirty (PTE only) |
/// | 7     | `PS` / `PAT`    | Page size in a PDE, PAT in a PTE |
/// | 8     | `G`             | Global (PTE only) |
/// | 9–11  | OS avail        | Reserved for OS use |
/// | 12–31 | `frame`         | Physical frame number |
///
/// The memory core only ever writes bits 0–2 and the frame field; the
/// remaining bits are exposed for inspection.
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::{FrameNumber, PhysicalPage};
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::new_kernel_rw()
///     .with_physical_page(PhysicalPage::from_frame_number(FrameNumber::new(0x123)));
/// assert!(e.present());
/// assert_eq!(e.into_bits(), 0x0012_3003);
/// ```
#[bitfield(u32)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    ///
    /// Clear implies a not-present entry; any access through it faults.
    pub present: bool,

    /// Writable (RW, bit 1).
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Set to allow user-mode access; clear restricts to supervisor only.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5). Set by the CPU on first access.
    pub accessed: bool,

    /// Dirty (D, bit 6). Set by the CPU on first write through a PTE.
    pub dirty: bool,

    /// Page Size in a PDE (4 MiB pages, unused here), PAT in a PTE.
    pub large_page: bool,

    /// Global (G, bit 8).
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available: u8,

    /// Physical frame number (bits 12..=31).
    #[bits(20)]
    frame: u32,
}

impl PageEntryBits {
    #[inline]
    pub const fn set_physical_page(&mut self, page: PhysicalPage) {
        self.set_frame(page.frame_number().as_u32());
    }

    #[inline]
    #[must_use]
    pub const fn with_physical_page(mut self, page: PhysicalPage) -> Self {
        self.set_physical_page(page);
        self
    }

    #[inline]
    #[must_use]
    pub const fn physical_page(&self) -> PhysicalPage {
        PhysicalPage::from_frame_number(FrameNumber::new(self.frame()))
    }

    /// Present, writable, supervisor-only.
    #[inline]
    #[must_use]
    pub const fn new_kernel_rw() -> Self {
        Self::new()
            .with_present(true)
            .with_writable(true)
            .with_user_access(false)
    }

    /// Access bits derived from a not-present fault: the entry is made
    /// present, and writable/user exactly when the faulting access was.
    #[inline]
    #[must_use]
    pub const fn from_access(write: bool, user: bool) -> Self {
        Self::new()
            .with_present(true)
            .with_writable(write)
            .with_user_access(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_field_occupies_the_upper_twenty_bits() {
        let page = PhysicalPage::from_frame_number(FrameNumber::new(0xF_FFFF));
        let e = PageEntryBits::new().with_physical_page(page);
        assert_eq!(e.into_bits(), 0xFFFF_F000);
        assert_eq!(e.physical_page(), page);
    }

    #[test]
    fn access_bits_follow_the_fault() {
        assert_eq!(PageEntryBits::from_access(false, false).into_bits(), 0b001);
        assert_eq!(PageEntryBits::from_access(true, false).into_bits(), 0b011);
        assert_eq!(PageEntryBits::from_access(true, true).into_bits(), 0b111);
        assert_eq!(PageEntryBits::from_access(false, true).into_bits(), 0b101);
    }
}
