//! # Page-Fault Decoding
//!
//! The interrupt-dispatch code hands the memory core a saved register
//! snapshot ([`InterruptFrame`]). The error code the CPU pushed for vector 14
//! is decoded into a [`FaultCause`]; combined with CR2 it forms a [`PageFault`].

use crate::Mmu;
use bitfield_struct::bitfield;
use core::fmt;
use kernel_memory_addresses::VirtualAddress;

/// Interrupt vector of the page-fault exception.
pub const PAGE_FAULT_VECTOR: u32 = 0x0E;

/// Page-fault error code layout (32-bit x86).
///
/// Each bit describes the condition that caused the page fault.
/// Reference: Intel SDM Vol. 3A, §6.15 "Page-Fault Exception (#PF)".
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct FaultCause {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read access.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor mode.
    /// 1 = user mode.
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch.
    pub instruction_fetch: bool, // bit 4

    #[bits(27)]
    __: u32,
}

impl FaultCause {
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "Non-present page (page not mapped)"
        } else if self.instruction_fetch() {
            if self.user() {
                "User-mode instruction fetch on protected page"
            } else {
                "Kernel instruction fetch on protected page"
            }
        } else if self.write() {
            if self.user() {
                "User-mode write access to protected page"
            } else {
                "Write access to protected page"
            }
        } else if self.user() {
            "User-mode read access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}

impl fmt::Display for FaultCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (err={:#x})", self.explain(), self.into_bits())
    }
}

/// Register snapshot saved by the common interrupt entry stub.
///
/// Field order matches the push order of the stub: segment registers,
/// `pusha`, vector number and error code, then the frame the CPU pushed.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct InterruptFrame {
    pub gs: u32,
    pub fs: u32,
    pub es: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

impl InterruptFrame {
    /// A frame for a page fault with error code `err_code`; all other registers zero.
    #[must_use]
    pub fn page_fault(err_code: u32) -> Self {
        Self {
            int_no: PAGE_FAULT_VECTOR,
            err_code,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn fault_cause(&self) -> FaultCause {
        FaultCause::from_bits(self.err_code)
    }
}

/// A decoded page fault: the faulting address and why it faulted.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PageFault {
    pub address: VirtualAddress,
    pub cause: FaultCause,
}

impl PageFault {
    #[must_use]
    pub const fn new(address: VirtualAddress, cause: FaultCause) -> Self {
        Self { address, cause }
    }

    /// Combine the saved error code with the fault address register.
    #[must_use]
    pub fn from_frame<U: Mmu + ?Sized>(frame: &InterruptFrame, mmu: &U) -> Self {
        debug_assert_eq!(frame.int_no, PAGE_FAULT_VECTOR, "not a page-fault frame");
        Self::new(mmu.fault_address(), frame.fault_cause())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_error_code_bits() {
        let c = FaultCause::from_bits(0b110);
        assert!(!c.present());
        assert!(c.write());
        assert!(c.user());
        assert_eq!(c.explain(), "Non-present page (page not mapped)");

        let c = FaultCause::from_bits(0b011);
        assert!(c.present());
        assert_eq!(c.explain(), "Write access to protected page");
    }

    #[test]
    fn frame_carries_error_code() {
        let frame = InterruptFrame::page_fault(0b101);
        assert_eq!(frame.fault_cause().into_bits(), 0b101);
        assert_eq!(size_of::<InterruptFrame>(), 19 * 4);
    }
}
