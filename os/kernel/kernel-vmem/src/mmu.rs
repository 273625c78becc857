//! # MMU Control
//!
//! The [`Mmu`] trait is the seam between the paging code and the three
//! control registers it needs: CR3 (directory base), CR0.PG (paging enable)
//! and CR2 (fault address). [`X86Mmu`] drives the real registers; tests use a
//! recording double.

use kernel_memory_addresses::{PhysicalPage, VirtualAddress};

/// Access to the translation hardware of the current CPU.
pub trait Mmu {
    /// Load `directory` as the active directory (CR3).
    ///
    /// Reloading the active directory flushes all cached translations.
    fn load_directory(&mut self, directory: PhysicalPage);

    /// Set the paging-enable flag (CR0.PG).
    fn enable_paging(&mut self);

    /// Whether the paging-enable flag is set.
    fn paging_enabled(&self) -> bool;

    /// Virtual address of the most recent page fault (CR2).
    fn fault_address(&self) -> VirtualAddress;
}

impl<T: Mmu + ?Sized> Mmu for &mut T {
    fn load_directory(&mut self, directory: PhysicalPage) {
        (**self).load_directory(directory);
    }

    fn enable_paging(&mut self) {
        (**self).enable_paging();
    }

    fn paging_enabled(&self) -> bool {
        (**self).paging_enabled()
    }

    fn fault_address(&self) -> VirtualAddress {
        (**self).fault_address()
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
pub use hardware::X86Mmu;

#[cfg(all(feature = "asm", target_arch = "x86"))]
mod hardware {
    use super::Mmu;
    use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
    use kernel_registers::cr0::Cr0;
    use kernel_registers::cr2::Cr2;
    use kernel_registers::cr3::Cr3;
    use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};

    /// The control registers of the executing CPU.
    pub struct X86Mmu {
        _private: (),
    }

    impl X86Mmu {
        /// # Safety
        /// Must only be constructed and used at CPL0.
        #[must_use]
        pub const unsafe fn new() -> Self {
            Self { _private: () }
        }
    }

    impl Mmu for X86Mmu {
        fn load_directory(&mut self, directory: PhysicalPage) {
            let cr3 = Cr3::from_directory(directory.base());
            // SAFETY: running at CPL0 (see `new`); the directory maps the running code.
            unsafe { cr3.store_unsafe() }
        }

        fn enable_paging(&mut self) {
            // SAFETY: running at CPL0 (see `new`); a directory has been loaded.
            unsafe {
                let cr0 = Cr0::load_unsafe().with_pg_paging(true);
                cr0.store_unsafe();
            }
        }

        fn paging_enabled(&self) -> bool {
            // SAFETY: running at CPL0 (see `new`).
            unsafe { Cr0::load_unsafe() }.pg_paging()
        }

        fn fault_address(&self) -> VirtualAddress {
            // SAFETY: running at CPL0 (see `new`).
            unsafe { Cr2::load_unsafe() }.fault_address()
        }
    }
}
