//! Host-side doubles for physical memory, frame allocation and the MMU.
//!
//! Available in this crate's own tests and, through the `test-support`
//! feature, to dependent crates' tests. Requires `std`.

use crate::{FrameAlloc, Mmu, PhysMapper};
use kernel_memory_addresses::{FrameNumber, PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_registers::cr0::Cr0;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// A 4 KiB-aligned raw frame.
#[repr(align(4096))]
struct Aligned4K([u8; 4096]);

/// Sparse simulated RAM: frames come into existence zeroed on first access.
#[derive(Default)]
pub struct TestPhys {
    frames: RefCell<HashMap<u32, Box<Aligned4K>>>,
}

impl TestPhys {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        assert_eq!(pa.offset(), 0);
        assert!(size_of::<T>() <= 4096);
        let mut frames = self.frames.borrow_mut();
        let frame = frames
            .entry(pa.frame_number().as_u32())
            .or_insert_with(|| Box::new(Aligned4K([0; 4096])));
        let ptr = core::ptr::from_mut::<Aligned4K>(frame.as_mut()).cast::<T>();
        // SAFETY: boxed frames never move; the caller promises `T` matches.
        unsafe { &mut *ptr }
    }
}

/// Hands out consecutive frames and records every frame given back.
pub struct BumpAlloc {
    next: u32,
    end: u32,
    pub allocated: Vec<PhysicalPage>,
    pub freed: Vec<PhysicalPage>,
}

impl BumpAlloc {
    #[must_use]
    pub const fn new(first_frame: u32, frames: u32) -> Self {
        Self {
            next: first_frame,
            end: first_frame + frames,
            allocated: Vec::new(),
            freed: Vec::new(),
        }
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.allocated.len() - self.freed.len()
    }
}

impl FrameAlloc for BumpAlloc {
    fn alloc_4k(&mut self) -> Option<PhysicalPage> {
        if self.next >= self.end {
            return None;
        }
        let page = FrameNumber::new(self.next).page();
        self.next += 1;
        self.allocated.push(page);
        Some(page)
    }

    fn free_4k(&mut self, page: PhysicalPage) {
        assert!(self.allocated.contains(&page), "freeing foreign frame {page:?}");
        assert!(!self.freed.contains(&page), "double free of {page:?}");
        self.freed.push(page);
    }
}

/// Records what the paging code asks of the MMU.
#[derive(Default)]
pub struct RecordingMmu {
    pub cr0: Cr0,
    pub cr3: Option<Cr3>,
    pub loads: usize,
    cr2: Cell<Cr2>,
}

impl RecordingMmu {
    /// Latch `va` as the address of the next page fault.
    pub fn fault_at(&self, va: VirtualAddress) {
        self.cr2.set(Cr2::from_bits(va.as_u32()));
    }
}

impl Mmu for RecordingMmu {
    fn load_directory(&mut self, directory: PhysicalPage) {
        self.cr3 = Some(Cr3::from_directory(directory.base()));
        self.loads += 1;
    }

    fn enable_paging(&mut self) {
        self.cr0.set_pg_paging(true);
    }

    fn paging_enabled(&self) -> bool {
        self.cr0.pg_paging()
    }

    fn fault_address(&self) -> VirtualAddress {
        self.cr2.get().fault_address()
    }
}
