//! # Typed x86 (32-bit) Control Registers
//!
//! Bit-exact models of the control registers the paging code touches:
//!
//! - [`Cr0`](cr0::Cr0): the paging-enable flag (bit 31).
//! - [`Cr2`](cr2::Cr2): the linear address of the last page fault.
//! - [`Cr3`](cr3::Cr3): the physical base of the active page directory.
//!
//! The register types are plain bit-fields and can be built and inspected on
//! any host. Reading or writing the real registers requires the `asm` feature
//! and an `x86` target.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr0")]
pub mod cr0;

#[cfg(feature = "cr2")]
pub mod cr2;

#[cfg(feature = "cr3")]
pub mod cr3;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}
