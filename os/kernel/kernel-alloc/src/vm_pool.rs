//! # Virtual Memory Pool
//!
//! A [`VmPool`] hands out variably-sized regions of one fixed virtual window.
//! Placement is bump-style: each region starts where the previous one ends.
//! Nothing is mapped on allocation; pages come into existence when first
//! touched, through the page-fault handler of the owning address space.
//!
//! ```text
//!  base                                                       base + size
//!  ┌────────┬──────────────┬───────────┬─────────────────────────────┐
//!  │reserved│   region 0   │ region 1  │          unused             │
//!  └────────┴──────────────┴───────────┴─────────────────────────────┘
//!    1 page
//! ```
//!
//! The first page of the window is never handed out. It stays unmapped, so a
//! region never starts at the window base. The region table itself lives
//! inline in the [`VmPool`].

use kernel_info::memory::RECURSIVE_TABLES_BASE;
use kernel_memory_addresses::{PAGE_SIZE, PageNumber, VirtualAddress, pages_for};
use kernel_vmem::{
    AddressSpace, AddressSpaceError, FrameAlloc, FreePageError, Mmu, PoolWindow, TableWindow,
};
use log::{debug, info, warn};

/// One allocated region.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Region {
    pub base: VirtualAddress,
    pub size: u32,
}

impl Region {
    const EMPTY: Self = Self {
        base: VirtualAddress::zero(),
        size: 0,
    };

    /// First address past the region.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.base.as_u32()) + u64::from(self.size)
    }

    /// Every page the region spans.
    pub fn pages(&self) -> impl Iterator<Item = PageNumber> + use<> {
        let first = self.base.page_number().as_u32();
        (first..first + self.size / PAGE_SIZE).map(PageNumber::new)
    }
}

/// Capacity of the region table: as many regions as fit into one page.
pub const MAX_REGIONS: usize = PAGE_SIZE as usize / size_of::<Region>();

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmPoolError {
    #[error("requested a zero-sized region")]
    ZeroSize,
    #[error("pool of {size:#x} bytes is smaller than two pages")]
    TooSmall { size: u32 },
    #[error("pool window {base}+{size:#x} overlaps the shared region or the recursive table window")]
    InvalidWindow { base: VirtualAddress, size: u32 },
    #[error("region table is full ({MAX_REGIONS} regions)")]
    RegionTableFull,
    #[error("requested {requested:#x} bytes, only {available:#x} available")]
    OutOfSpace { requested: u32, available: u32 },
    #[error("no room for {requested:#x} bytes before the end of the window")]
    WindowExhausted { requested: u32 },
    #[error("no region starts at {address}")]
    RegionNotFound { address: VirtualAddress },
    #[error(transparent)]
    Registry(#[from] AddressSpaceError),
}

/// Bump allocator of virtual regions inside one window.
pub struct VmPool {
    base: VirtualAddress,
    size: u32,
    available: u32,
    regions: [Region; MAX_REGIONS],
    len: usize,
}

impl VmPool {
    /// Create a pool over `base .. base + size` and register it with `space`.
    ///
    /// `base` is aligned down to a page boundary.
    ///
    /// # Errors
    /// - [`VmPoolError::TooSmall`] if `size` is below two pages.
    /// - [`VmPoolError::InvalidWindow`] if the window overlaps the shared
    ///   identity-mapped region of `space` or reaches the recursive window.
    /// - [`VmPoolError::Registry`] if `space` cannot register another pool.
    pub fn new<W: TableWindow>(
        base: VirtualAddress,
        size: u32,
        space: &mut AddressSpace<W>,
    ) -> Result<Self, VmPoolError> {
        let base = base.page().base();
        if size < 2 * PAGE_SIZE {
            return Err(VmPoolError::TooSmall { size });
        }
        let end = u64::from(base.as_u32()) + u64::from(size);
        if base.as_u32() < space.config().shared_size
            || end > u64::from(RECURSIVE_TABLES_BASE.as_u32())
        {
            warn!("VM pool window {base}+{size:#x} overlaps a reserved region");
            return Err(VmPoolError::InvalidWindow { base, size });
        }

        space.register_pool(PoolWindow::new(base, size))?;

        info!("Constructed VM pool {base}+{size:#x}");
        Ok(Self {
            base,
            size,
            available: size - PAGE_SIZE,
            regions: [Region::EMPTY; MAX_REGIONS],
            len: 0,
        })
    }

    #[inline]
    #[must_use]
    pub const fn base_address(&self) -> VirtualAddress {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Bytes not yet handed out.
    #[inline]
    #[must_use]
    pub const fn size_available(&self) -> u32 {
        self.available
    }

    /// Allocated regions, in allocation order.
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions[..self.len]
    }

    /// Reserve a region of at least `size` bytes (rounded up to whole pages).
    ///
    /// # Errors
    /// - [`VmPoolError::ZeroSize`] if `size` is zero.
    /// - [`VmPoolError::RegionTableFull`] if the region table is full.
    /// - [`VmPoolError::OutOfSpace`] if `size` exceeds the bytes available.
    /// - [`VmPoolError::WindowExhausted`] if the region would run past the window.
    pub fn allocate(&mut self, size: u32) -> Result<VirtualAddress, VmPoolError> {
        if size == 0 {
            return Err(VmPoolError::ZeroSize);
        }
        let Some(size) = pages_for(size).checked_mul(PAGE_SIZE) else {
            return Err(VmPoolError::OutOfSpace {
                requested: size,
                available: self.available,
            });
        };

        if self.len == MAX_REGIONS {
            warn!("VM pool {}: region table full", self.base);
            return Err(VmPoolError::RegionTableFull);
        }
        if size > self.available {
            warn!(
                "VM pool {}: requested {size:#x} bytes, {:#x} available",
                self.base, self.available
            );
            return Err(VmPoolError::OutOfSpace {
                requested: size,
                available: self.available,
            });
        }

        let start = self
            .regions()
            .last()
            .map_or(u64::from(self.base.as_u32()) + u64::from(PAGE_SIZE), Region::end);
        let window_end = u64::from(self.base.as_u32()) + u64::from(self.size);
        if start + u64::from(size) > window_end {
            warn!("VM pool {}: window exhausted for {size:#x} bytes", self.base);
            return Err(VmPoolError::WindowExhausted { requested: size });
        }

        #[allow(clippy::cast_possible_truncation)]
        let region = Region {
            base: VirtualAddress::new(start as u32),
            size,
        };
        self.regions[self.len] = region;
        self.len += 1;
        self.available -= size;

        debug!("VM pool {}: allocated {}+{size:#x}", self.base, region.base);
        Ok(region.base)
    }

    /// Release the region starting exactly at `address`.
    ///
    /// Every page of the region that was faulted in is freed in `space`, which
    /// returns its frame to the owning pool; the active translation is reloaded
    /// afterwards. Returns the number of pages that were mapped.
    ///
    /// # Errors
    /// [`VmPoolError::RegionNotFound`] if no region starts at `address`.
    ///
    /// # Panics
    /// If the region covers a page `space` does not consider demand-paged.
    pub fn release<W, A, U>(
        &mut self,
        address: VirtualAddress,
        space: &mut AddressSpace<W>,
        frames: &mut A,
        mmu: &mut U,
    ) -> Result<u32, VmPoolError>
    where
        W: TableWindow,
        A: FrameAlloc + ?Sized,
        U: Mmu + ?Sized,
    {
        let Some(index) = self.regions().iter().position(|r| r.base == address) else {
            warn!("VM pool {}: no region starts at {address}", self.base);
            return Err(VmPoolError::RegionNotFound { address });
        };

        let region = self.regions[index];
        self.available += region.size;

        let mut freed = 0;
        for page in region.pages() {
            match space.free_page(frames, page) {
                Ok(_) => freed += 1,
                Err(FreePageError::NotMapped { .. }) => {}
                Err(e) => panic!("VM pool region {region:?} covers a page it cannot own: {e}"),
            }
        }
        space.load(mmu);

        self.regions.copy_within(index + 1..self.len, index);
        self.len -= 1;

        debug!(
            "VM pool {}: released {address}+{:#x} ({freed} mapped page(s))",
            self.base, region.size
        );
        Ok(freed)
    }

    /// `true` if `address` lies inside the pool window.
    ///
    /// Holes between regions and the reserved first page count as inside.
    #[must_use]
    pub fn is_legitimate(&self, address: VirtualAddress) -> bool {
        let a = u64::from(address.as_u32());
        let base = u64::from(self.base.as_u32());
        a >= base && a < base + u64::from(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cont_frame_pool::{ContFramePool, FrameInfo, InfoStorage};
    use crate::frame_pools::FramePools;
    use kernel_vmem::test_support::{RecordingMmu, TestPhys};
    use kernel_memory_addresses::FrameNumber;
    use kernel_vmem::{FaultCause, PageFault, PagingConfig, PhysicalWindow};

    const BASE: u32 = 0x2000_0000;

    #[test]
    fn bump_placement_and_rounding() {
        let phys = TestPhys::default();
        let mut info = Box::new(FrameInfo::zeroed());
        let mut pools = FramePools::new();
        let id = pools
            .add(ContFramePool::new(FrameNumber::new(1024), 64, InfoStorage::External(&mut info)))
            .unwrap();
        let mut frames = pools.frames(id, id);
        let mut space =
            AddressSpace::new(&phys, &mut frames, PhysicalWindow::new(&phys), PagingConfig::default())
                .unwrap();

        let mut pool = VmPool::new(VirtualAddress::new(BASE + 0x10), 0x10_0000, &mut space).unwrap();
        assert_eq!(pool.base_address(), VirtualAddress::new(BASE));
        assert_eq!(pool.size_available(), 0x10_0000 - PAGE_SIZE);

        let a = pool.allocate(1).unwrap();
        let b = pool.allocate(0x1001).unwrap();
        let c = pool.allocate(PAGE_SIZE).unwrap();
        assert_eq!(a, VirtualAddress::new(BASE + 0x1000));
        assert_eq!(b, VirtualAddress::new(BASE + 0x2000));
        assert_eq!(c, VirtualAddress::new(BASE + 0x4000));
        assert_eq!(pool.size_available(), 0x10_0000 - 5 * PAGE_SIZE);
        assert!(space.is_legitimate(a));
    }

    #[test]
    fn release_restores_space_and_compacts() {
        let phys = TestPhys::default();
        let mut info = Box::new(FrameInfo::zeroed());
        let mut pools = FramePools::new();
        let id = pools
            .add(ContFramePool::new(FrameNumber::new(1024), 64, InfoStorage::External(&mut info)))
            .unwrap();
        let mut frames = pools.frames(id, id);
        let mut space =
            AddressSpace::new(&phys, &mut frames, PhysicalWindow::new(&phys), PagingConfig::default())
                .unwrap();
        let mut mmu = RecordingMmu::default();

        let mut pool = VmPool::new(VirtualAddress::new(BASE), 0x10_0000, &mut space).unwrap();
        let before = pool.size_available();
        let a = pool.allocate(2 * PAGE_SIZE).unwrap();
        let b = pool.allocate(PAGE_SIZE).unwrap();

        // Touch one page of `a`.
        let write = FaultCause::from_bits(0b010);
        space.handle_fault(&mut frames, PageFault::new(a, write)).unwrap();

        assert_eq!(pool.release(a, &mut space, &mut frames, &mut mmu), Ok(1));
        assert_eq!(pool.regions(), &[Region { base: b, size: PAGE_SIZE }]);
        assert_eq!(pool.size_available(), before - PAGE_SIZE);
        assert_eq!(mmu.loads, 1);
        assert!(!space.is_mapped(a));

        assert_eq!(pool.release(b, &mut space, &mut frames, &mut mmu), Ok(0));
        assert_eq!(pool.size_available(), before);
        assert!(pool.regions().is_empty());

        assert_eq!(
            pool.release(b, &mut space, &mut frames, &mut mmu),
            Err(VmPoolError::RegionNotFound { address: b })
        );
    }

    #[test]
    fn limits_are_enforced() {
        let phys = TestPhys::default();
        let mut info = Box::new(FrameInfo::zeroed());
        let mut pools = FramePools::new();
        let id = pools
            .add(ContFramePool::new(FrameNumber::new(1024), 64, InfoStorage::External(&mut info)))
            .unwrap();
        let mut frames = pools.frames(id, id);
        let mut space =
            AddressSpace::new(&phys, &mut frames, PhysicalWindow::new(&phys), PagingConfig::default())
                .unwrap();

        assert_eq!(
            VmPool::new(VirtualAddress::new(BASE), PAGE_SIZE, &mut space).err(),
            Some(VmPoolError::TooSmall { size: PAGE_SIZE })
        );
        assert!(matches!(
            VmPool::new(VirtualAddress::new(0xFFB0_0000), 0x20_0000, &mut space),
            Err(VmPoolError::InvalidWindow { .. })
        ));
        assert_eq!(
            VmPool::new(VirtualAddress::new(0x0010_0000), 0x10_0000, &mut space).err(),
            Some(VmPoolError::InvalidWindow {
                base: VirtualAddress::new(0x0010_0000),
                size: 0x10_0000
            })
        );
        assert!(matches!(
            VmPool::new(VirtualAddress::new(0x003F_F000), 0x2000, &mut space),
            Err(VmPoolError::InvalidWindow { .. })
        ));
        assert_eq!(space.registered_pools().count(), 0);

        let mut pool = VmPool::new(VirtualAddress::new(BASE), 4 * PAGE_SIZE, &mut space).unwrap();
        assert_eq!(pool.allocate(0), Err(VmPoolError::ZeroSize));
        assert_eq!(
            pool.allocate(4 * PAGE_SIZE),
            Err(VmPoolError::OutOfSpace {
                requested: 4 * PAGE_SIZE,
                available: 3 * PAGE_SIZE
            })
        );

        let a = pool.allocate(PAGE_SIZE).unwrap();
        let _b = pool.allocate(2 * PAGE_SIZE).unwrap();
        let mut mmu = RecordingMmu::default();
        pool.release(a, &mut space, &mut frames, &mut mmu).unwrap();
        // One page is available again, but it sits before `_b`.
        assert_eq!(
            pool.allocate(PAGE_SIZE),
            Err(VmPoolError::WindowExhausted { requested: PAGE_SIZE })
        );
    }

    #[test]
    fn legitimacy_is_a_range_check() {
        let phys = TestPhys::default();
        let mut info = Box::new(FrameInfo::zeroed());
        let mut pools = FramePools::new();
        let id = pools
            .add(ContFramePool::new(FrameNumber::new(1024), 64, InfoStorage::External(&mut info)))
            .unwrap();
        let mut frames = pools.frames(id, id);
        let mut space =
            AddressSpace::new(&phys, &mut frames, PhysicalWindow::new(&phys), PagingConfig::default())
                .unwrap();
        let pool = VmPool::new(VirtualAddress::new(BASE), 0x10_0000, &mut space).unwrap();

        assert!(pool.is_legitimate(VirtualAddress::new(BASE)));
        assert!(pool.is_legitimate(VirtualAddress::new(BASE + 0xF_FFFF)));
        assert!(!pool.is_legitimate(VirtualAddress::new(BASE + 0x10_0000)));
        assert!(!pool.is_legitimate(VirtualAddress::new(BASE - 1)));
    }

    #[test]
    fn region_table_fits_one_page() {
        assert_eq!(MAX_REGIONS, 512);
    }
}
