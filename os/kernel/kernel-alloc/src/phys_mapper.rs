//! # Identity PhysMapper
//!
//! A [`PhysMapper`] for the memory the kernel can reach at its physical
//! address: all of memory before paging is enabled, and the shared
//! identity-mapped region afterwards.
//!
//! Page tables of the *active* space are not reached this way once paging is
//! on; use [`RecursiveWindow`](kernel_vmem::RecursiveWindow) for those.
//!
//! ## Example
//! ```rust,no_run
//! use kernel_alloc::phys_mapper::IdentityPhysMapper;
//! use kernel_memory_addresses::PhysicalAddress;
//! use kernel_vmem::{PageTable, PhysMapper};
//!
//! let mapper = IdentityPhysMapper;
//! unsafe {
//!     let table: &mut PageTable = mapper.phys_to_mut(PhysicalAddress::new(0x0020_1000));
//!     table.zero();
//! }
//! ```

use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::PhysMapper;

/// [`PhysMapper`] for identity-mapped physical memory.
///
/// # Safety
/// - The referenced frame must be identity-mapped (or paging disabled).
/// - The returned reference must only be used for valid, writable memory.
#[derive(Debug, Default, Copy, Clone)]
pub struct IdentityPhysMapper;

impl PhysMapper for IdentityPhysMapper {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va = pa.as_usize() as *mut T;
        // SAFETY: Caller must ensure the physical address is identity-mapped.
        unsafe { &mut *va }
    }
}
