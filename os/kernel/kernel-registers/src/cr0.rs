#[cfg(all(feature = "asm", target_arch = "x86"))]
use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// Architectural model of CR0 in 32-bit protected mode.
///
/// Exposes all architecturally defined control bits as booleans
/// and keeps all reserved bits forced to 0.
#[bitfield(u32)]
pub struct Cr0 {
    /// Bit 0: Protection Enable (PE).
    ///
    /// - 0: Real mode (no paging, no protection).
    /// - 1: Protected mode (required for paging).
    pub pe_protection_enable: bool,

    /// Bit 1: Monitor Coprocessor (MP).
    pub mp_monitor_coprocessor: bool,

    /// Bit 2: Emulation (EM).
    pub em_emulation: bool,

    /// Bit 3: Task Switched (TS).
    pub ts_task_switched: bool,

    /// Bit 4: Extension Type (ET).
    pub et_extension_type: bool,

    /// Bit 5: Numeric Error (NE).
    pub ne_numeric_error: bool,

    /// Bits 6–15: Reserved (must be 0).
    #[bits(10, default = 0)]
    _reserved_6_15: u16,

    /// Bit 16: Write Protect (WP).
    ///
    /// When set, supervisor code must respect read-only pages.
    pub wp_write_protect: bool,

    /// Bit 17: Reserved (must be 0).
    #[bits(default = false)]
    _reserved_17: bool,

    /// Bit 18: Alignment Mask (AM).
    pub am_alignment_mask: bool,

    /// Bits 19–28: Reserved (must be 0).
    #[bits(10, default = 0)]
    _reserved_19_28: u16,

    /// Bit 29: Not-Write-Through (NW).
    pub nw_not_write_through: bool,

    /// Bit 30: Cache Disable (CD).
    pub cd_cache_disable: bool,

    /// Bit 31: Paging (PG).
    ///
    /// - 0: Paging disabled; linear addresses are physical addresses.
    /// - 1: Paging enabled; every address is translated through the directory in CR3.
    pub pg_paging: bool,
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let mut cr0: u32;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let cr0 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_bit_is_bit_31() {
        let cr0 = Cr0::new().with_pg_paging(true);
        assert_eq!(cr0.into_bits(), 0x8000_0000);
        assert!(Cr0::from_bits(0x8000_0011).pg_paging());
        assert!(Cr0::from_bits(0x8000_0011).pe_protection_enable());
    }
}
