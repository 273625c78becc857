//! Minimal Virtual Memory Manager (VMM) for the kernel.
//!
//! The [`Vmm`] owns everything the memory core needs at runtime: the frame
//! pool registry, the kernel's [`AddressSpace`], the MMU and the VM pools
//! carved out of the address space. It is what the interrupt dispatcher and
//! higher-level allocators talk to.
//!
//! # Boot sequence
//!
//! [`Vmm::boot`] follows the classic layout of [`kernel_info::memory`]:
//!
//! 1. The kernel pool (2 MiB..4 MiB) keeps its metadata in its own first frame.
//! 2. The process pool (4 MiB..32 MiB) keeps its metadata in a frame taken
//!    from the kernel pool.
//! 3. The memory hole (15 MiB..16 MiB) is marked inaccessible.
//! 4. The address space is built from kernel-pool frames; faulted-in pages
//!    are backed by process-pool frames.
//!
//! # Example
//! ```no_run
//! use kernel_alloc::phys_mapper::IdentityPhysMapper;
//! use kernel_alloc::vmm::{Vmm, VmmConfig};
//! use kernel_vmem::{Mmu, PhysicalWindow, info};
//! # use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
//! # struct Cpu;
//! # impl Mmu for Cpu {
//! #     fn load_directory(&mut self, _: PhysicalPage) {}
//! #     fn enable_paging(&mut self) {}
//! #     fn paging_enabled(&self) -> bool { true }
//! #     fn fault_address(&self) -> VirtualAddress { VirtualAddress::zero() }
//! # }
//!
//! let mapper = IdentityPhysMapper;
//! // SAFETY: paging is off and memory below 32 MiB is identity-mapped.
//! let mut vmm = unsafe {
//!     Vmm::boot(&mapper, PhysicalWindow::new(IdentityPhysMapper), Cpu, &VmmConfig::default())
//! }
//! .unwrap();
//! vmm.load();
//! vmm.enable_paging();
//!
//! let heap = vmm.create_pool(info::HEAP_POOL_BASE, info::HEAP_POOL_SIZE).unwrap();
//! let buffer = vmm.allocate(heap, 64 * 1024).unwrap();
//! // ... touch `buffer`, let page faults map it in ...
//! vmm.release(heap, buffer).unwrap();
//! ```

use crate::cont_frame_pool::{ContFramePool, FrameInfo, FramePoolError, InfoStorage};
use crate::frame_pools::{FramePools, FramePoolsError, PoolFrames, PoolId};
use crate::vm_pool::{VmPool, VmPoolError};
use kernel_info::memory::{
    KERNEL_POOL_SIZE, KERNEL_POOL_START_FRAME, MEM_HOLE_SIZE, MEM_HOLE_START_FRAME,
    PROCESS_POOL_SIZE, PROCESS_POOL_START_FRAME,
};
use kernel_memory_addresses::{FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_vmem::{
    AddressSpace, AddressSpaceError, InterruptFrame, Mmu, PageFault, PageFaultError,
    PagingConfig, PhysMapper, ServicedFault, TableWindow,
};
use log::{info, warn};

/// Largest number of VM pools one [`Vmm`] manages.
pub const MAX_VM_POOLS: usize = 8;

/// A run of physical frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameRange {
    pub start: FrameNumber,
    pub count: u32,
}

impl FrameRange {
    #[must_use]
    pub const fn new(start: u32, count: u32) -> Self {
        Self {
            start: FrameNumber::new(start),
            count,
        }
    }
}

/// Physical layout and paging options for [`Vmm::boot`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VmmConfig {
    /// Backs page directories, page tables and pool metadata.
    pub kernel_pool: FrameRange,
    /// Backs demand-paged memory.
    pub process_pool: FrameRange,
    /// Frames inside the process pool that must never be handed out.
    pub memory_hole: Option<FrameRange>,
    pub paging: PagingConfig,
}

impl Default for VmmConfig {
    fn default() -> Self {
        Self {
            kernel_pool: FrameRange::new(KERNEL_POOL_START_FRAME, KERNEL_POOL_SIZE),
            process_pool: FrameRange::new(PROCESS_POOL_START_FRAME, PROCESS_POOL_SIZE),
            memory_hole: Some(FrameRange::new(MEM_HOLE_START_FRAME, MEM_HOLE_SIZE)),
            paging: PagingConfig::default(),
        }
    }
}

/// Handle to a VM pool inside a [`Vmm`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VmPoolId(usize);

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmmError {
    #[error(transparent)]
    FramePool(#[from] FramePoolError),
    #[error(transparent)]
    FramePools(#[from] FramePoolsError),
    #[error(transparent)]
    AddressSpace(#[from] AddressSpaceError),
    #[error(transparent)]
    PageFault(#[from] PageFaultError),
    #[error(transparent)]
    VmPool(#[from] VmPoolError),
    #[error("too many VM pools ({MAX_VM_POOLS} at most)")]
    TooManyPools,
    #[error("no VM pool registered as {0:?}")]
    UnknownVmPool(VmPoolId),
}

/// Kernel memory subsystem.
pub struct Vmm<'a, W: TableWindow, U: Mmu> {
    frames: FramePools<'a>,
    kernel_pool: PoolId,
    process_pool: PoolId,
    space: AddressSpace<W>,
    mmu: U,
    vm_pools: [Option<VmPool>; MAX_VM_POOLS],
}

impl<'a, W: TableWindow, U: Mmu> Vmm<'a, W, U> {
    /// Set up frame pools and the kernel address space.
    ///
    /// Paging is not enabled; call [`load`](Self::load) and
    /// [`enable_paging`](Self::enable_paging) afterwards.
    ///
    /// # Safety
    /// `mapper` must reach every frame of the kernel pool for `'a`, and `window`
    /// must reach the structures of the new address space.
    ///
    /// # Errors
    /// If a metadata frame or the paging structures cannot be allocated, or the
    /// two pools overlap.
    ///
    /// # Panics
    /// If a [`FrameRange`] is not a valid pool range, or the memory hole lies
    /// outside the process pool.
    pub unsafe fn boot<M: PhysMapper + ?Sized>(
        mapper: &M,
        window: W,
        mmu: U,
        config: &VmmConfig,
    ) -> Result<Self, VmmError> {
        let mut frames = FramePools::new();

        let kernel = config.kernel_pool;
        // SAFETY: the caller guarantees the kernel pool is reachable.
        let kernel_info: &'a mut FrameInfo = unsafe { mapper.phys_to_mut(kernel.start.base_address()) };
        let kernel_pool = frames.add(ContFramePool::new(
            kernel.start,
            kernel.count,
            InfoStorage::Internal(kernel_info),
        ))?;

        let process = config.process_pool;
        let info_frames = ContFramePool::needed_info_frames(process.count);
        let info_frame = frames.get_mut(kernel_pool)?.get_frames(info_frames)?;
        // SAFETY: `info_frame` was just taken from the kernel pool.
        let process_info: &'a mut FrameInfo = unsafe { mapper.phys_to_mut(info_frame.base_address()) };
        let process_pool = frames.add(ContFramePool::new(
            process.start,
            process.count,
            InfoStorage::External(process_info),
        ))?;

        if let Some(hole) = config.memory_hole {
            frames
                .get_mut(process_pool)?
                .mark_inaccessible(hole.start, hole.count);
        }

        let space = AddressSpace::new(
            mapper,
            &mut frames.frames(kernel_pool, process_pool),
            window,
            config.paging,
        )?;

        info!(
            "VMM ready: kernel pool {:?}, process pool {:?}, directory {}",
            kernel.start,
            process.start,
            space.directory_page()
        );
        Ok(Self {
            frames,
            kernel_pool,
            process_pool,
            space,
            mmu,
            vm_pools: [const { None }; MAX_VM_POOLS],
        })
    }

    /// Make the kernel address space the active one.
    pub fn load(&mut self) {
        self.space.load(&mut self.mmu);
    }

    pub fn enable_paging(&mut self) {
        self.space.enable_paging(&mut self.mmu);
    }

    /// Page-fault entry point for the interrupt dispatcher.
    ///
    /// # Errors
    /// [`VmmError::PageFault`] if the fault could not be serviced. The faulting
    /// access will fault again.
    pub fn handle_fault(&mut self, frame: &InterruptFrame) -> Result<ServicedFault, VmmError> {
        let fault = PageFault::from_frame(frame, &self.mmu);
        let mut frames = self.frames.frames(self.kernel_pool, self.process_pool);
        Ok(self.space.handle_fault(&mut frames, fault)?)
    }

    /// Create a VM pool over `base .. base + size`.
    ///
    /// # Errors
    /// [`VmmError::TooManyPools`] if all slots are taken, or whatever
    /// [`VmPool::new`] reports.
    pub fn create_pool(&mut self, base: VirtualAddress, size: u32) -> Result<VmPoolId, VmmError> {
        let Some(index) = self.vm_pools.iter().position(Option::is_none) else {
            warn!("No slot left for VM pool {base}+{size:#x}");
            return Err(VmmError::TooManyPools);
        };
        self.vm_pools[index] = Some(VmPool::new(base, size, &mut self.space)?);
        Ok(VmPoolId(index))
    }

    /// # Errors
    /// [`VmmError::UnknownVmPool`] or the failure of [`VmPool::allocate`].
    pub fn allocate(&mut self, pool: VmPoolId, size: u32) -> Result<VirtualAddress, VmmError> {
        Ok(self.vm_pool_mut(pool)?.allocate(size)?)
    }

    /// Release a region and every page that was faulted into it.
    /// Returns the number of pages that were mapped.
    ///
    /// # Errors
    /// [`VmmError::UnknownVmPool`] or the failure of [`VmPool::release`].
    pub fn release(&mut self, pool: VmPoolId, address: VirtualAddress) -> Result<u32, VmmError> {
        let vm_pool = self
            .vm_pools
            .get_mut(pool.0)
            .and_then(Option::as_mut)
            .ok_or(VmmError::UnknownVmPool(pool))?;
        let mut frames = self.frames.frames(self.kernel_pool, self.process_pool);
        Ok(vm_pool.release(address, &mut self.space, &mut frames, &mut self.mmu)?)
    }

    /// `true` if `address` lies inside any VM pool.
    #[must_use]
    pub fn is_legitimate(&self, address: VirtualAddress) -> bool {
        self.vm_pools
            .iter()
            .flatten()
            .any(|p| p.is_legitimate(address))
    }

    #[must_use]
    pub fn translate(&self, address: VirtualAddress) -> Option<PhysicalAddress> {
        self.space.translate(address)
    }

    /// # Errors
    /// [`VmmError::UnknownVmPool`] if `pool` is not registered.
    pub fn vm_pool(&self, pool: VmPoolId) -> Result<&VmPool, VmmError> {
        self.vm_pools
            .get(pool.0)
            .and_then(Option::as_ref)
            .ok_or(VmmError::UnknownVmPool(pool))
    }

    fn vm_pool_mut(&mut self, pool: VmPoolId) -> Result<&mut VmPool, VmmError> {
        self.vm_pools
            .get_mut(pool.0)
            .and_then(Option::as_mut)
            .ok_or(VmmError::UnknownVmPool(pool))
    }

    #[must_use]
    pub const fn frame_pools(&self) -> &FramePools<'a> {
        &self.frames
    }

    /// Frame allocation against the pools of this VMM, for callers that need
    /// raw frames outside of demand paging.
    pub const fn frames(&mut self) -> PoolFrames<'_, 'a> {
        self.frames.frames(self.kernel_pool, self.process_pool)
    }

    #[must_use]
    pub const fn kernel_pool(&self) -> PoolId {
        self.kernel_pool
    }

    #[must_use]
    pub const fn process_pool(&self) -> PoolId {
        self.process_pool
    }

    #[must_use]
    pub const fn address_space(&self) -> &AddressSpace<W> {
        &self.space
    }

    #[must_use]
    pub const fn mmu(&self) -> &U {
        &self.mmu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::test_support::{RecordingMmu, TestPhys};
    use kernel_vmem::PhysicalWindow;

    #[test]
    fn default_config_matches_the_layout() {
        let config = VmmConfig::default();
        assert_eq!(config.kernel_pool, FrameRange::new(512, 512));
        assert_eq!(config.process_pool, FrameRange::new(1024, 7168));
        assert_eq!(config.memory_hole, Some(FrameRange::new(3840, 256)));
    }

    #[test]
    fn unknown_vm_pools_are_errors() {
        let phys = TestPhys::default();
        let mut vmm = unsafe {
            Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
        }
        .unwrap();
        assert_eq!(
            vmm.allocate(VmPoolId(3), 4096),
            Err(VmmError::UnknownVmPool(VmPoolId(3)))
        );
        assert!(vmm.vm_pool(VmPoolId(0)).is_err());
    }

    #[test]
    fn pool_slots_are_bounded() {
        let phys = TestPhys::default();
        let mut vmm = unsafe {
            Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
        }
        .unwrap();
        for base in (0x4000_0000_u32..).step_by(0x10_0000).take(MAX_VM_POOLS) {
            vmm.create_pool(VirtualAddress::new(base), 0x10_0000).unwrap();
        }
        assert_eq!(
            vmm.create_pool(VirtualAddress::new(0x8000_0000), 0x10_0000),
            Err(VmmError::TooManyPools)
        );
    }
}
