//! # Frame Pool Registry
//!
//! Frames are released by number alone, without saying which pool they came
//! from. [`FramePools`] is the directory that resolves a frame number to its
//! owning [`ContFramePool`]. Pools are kept in insertion order and may not
//! overlap.
//!
//! [`PoolFrames`] adapts the registry to the [`FrameAlloc`] interface of the
//! paging code: paging structures come from one pool, demand-paged memory
//! from another, and frees go to whichever pool owns the frame.

use crate::cont_frame_pool::{ContFramePool, FrameState};
use kernel_memory_addresses::{FrameNumber, PhysicalPage};
use kernel_vmem::FrameAlloc;
use log::{debug, warn};

/// Largest number of frame pools the registry holds.
pub const MAX_FRAME_POOLS: usize = 8;

/// Handle to a pool inside a [`FramePools`] registry.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PoolId(usize);

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FramePoolsError {
    #[error("frame pool registry is full ({MAX_FRAME_POOLS} pools)")]
    RegistryFull,
    #[error("pool {first:?}..={last:?} overlaps registered pool {existing:?}")]
    Overlaps {
        first: FrameNumber,
        last: FrameNumber,
        existing: PoolId,
    },
    #[error("no frame pool registered as {0:?}")]
    UnknownPool(PoolId),
}

/// Registry of every live frame pool.
pub struct FramePools<'a> {
    pools: [Option<ContFramePool<'a>>; MAX_FRAME_POOLS],
}

impl Default for FramePools<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FramePools<'a> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pools: [const { None }; MAX_FRAME_POOLS],
        }
    }

    /// Register `pool`.
    ///
    /// # Errors
    /// - [`FramePoolsError::Overlaps`] if it shares a frame with a registered pool.
    /// - [`FramePoolsError::RegistryFull`] if no slot is left.
    pub fn add(&mut self, pool: ContFramePool<'a>) -> Result<PoolId, FramePoolsError> {
        if let Some(existing) = self
            .iter()
            .find(|(_, p)| p.overlaps(pool.base_frame_no(), pool.frame_count()))
            .map(|(id, _)| id)
        {
            warn!(
                "Frame pool {:?}..={:?} overlaps {existing:?}",
                pool.base_frame_no(),
                pool.frame_end()
            );
            return Err(FramePoolsError::Overlaps {
                first: pool.base_frame_no(),
                last: pool.frame_end(),
                existing,
            });
        }

        let Some(index) = self.pools.iter().position(Option::is_none) else {
            warn!("Frame pool registry is full");
            return Err(FramePoolsError::RegistryFull);
        };

        debug!(
            "Registered frame pool {:?}..={:?} as #{index}",
            pool.base_frame_no(),
            pool.frame_end()
        );
        self.pools[index] = Some(pool);
        Ok(PoolId(index))
    }

    /// # Errors
    /// [`FramePoolsError::UnknownPool`] if `id` is not registered.
    pub fn get(&self, id: PoolId) -> Result<&ContFramePool<'a>, FramePoolsError> {
        self.pools
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(FramePoolsError::UnknownPool(id))
    }

    /// # Errors
    /// [`FramePoolsError::UnknownPool`] if `id` is not registered.
    pub fn get_mut(&mut self, id: PoolId) -> Result<&mut ContFramePool<'a>, FramePoolsError> {
        self.pools
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(FramePoolsError::UnknownPool(id))
    }

    /// Registered pools in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &ContFramePool<'a>)> {
        self.pools
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (PoolId(i), p)))
    }

    /// The pool whose range contains `frame`.
    #[must_use]
    pub fn owner_of(&self, frame: FrameNumber) -> Option<PoolId> {
        self.iter().find(|(_, p)| p.contains(frame)).map(|(id, _)| id)
    }

    /// State of `frame` in its owning pool.
    #[must_use]
    pub fn frame_state(&self, frame: FrameNumber) -> Option<FrameState> {
        self.iter().find_map(|(_, p)| p.state(frame))
    }

    /// Release the run starting at `first`, whichever pool owns it.
    /// Returns the number of frames freed.
    ///
    /// # Panics
    /// If no pool owns `first`, or `first` is not the head of an allocated run.
    pub fn release_frames(&mut self, first: FrameNumber) -> u32 {
        let owner = self
            .pools
            .iter_mut()
            .flatten()
            .find(|p| p.contains(first));
        match owner {
            Some(pool) => pool.release_frames(first),
            None => panic!("release of frame {first:?}, which belongs to no frame pool"),
        }
    }

    /// A [`FrameAlloc`] taking paging structures from `tables` and
    /// demand-paged frames from `data`.
    pub const fn frames(&mut self, tables: PoolId, data: PoolId) -> PoolFrames<'_, 'a> {
        PoolFrames {
            pools: self,
            tables,
            data,
        }
    }
}

/// Single-frame allocation from a [`FramePools`] registry.
pub struct PoolFrames<'p, 'a> {
    pools: &'p mut FramePools<'a>,
    tables: PoolId,
    data: PoolId,
}

impl PoolFrames<'_, '_> {
    fn alloc_from(&mut self, id: PoolId) -> Option<PhysicalPage> {
        let pool = self.pools.get_mut(id).ok()?;
        pool.get_frames(1).ok().map(FrameNumber::page)
    }
}

impl FrameAlloc for PoolFrames<'_, '_> {
    fn alloc_4k(&mut self) -> Option<PhysicalPage> {
        self.alloc_from(self.tables)
    }

    fn alloc_data_4k(&mut self) -> Option<PhysicalPage> {
        self.alloc_from(self.data)
    }

    fn free_4k(&mut self, page: PhysicalPage) {
        self.pools.release_frames(page.frame_number());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cont_frame_pool::{FrameInfo, InfoStorage};

    #[test]
    fn release_finds_the_owning_pool() {
        let mut a = Box::new(FrameInfo::zeroed());
        let mut b = Box::new(FrameInfo::zeroed());
        let mut pools = FramePools::new();
        let ka = pools
            .add(ContFramePool::new(FrameNumber::new(512), 512, InfoStorage::External(&mut a)))
            .unwrap();
        let kb = pools
            .add(ContFramePool::new(FrameNumber::new(1024), 1024, InfoStorage::External(&mut b)))
            .unwrap();

        let fa = pools.get_mut(ka).unwrap().get_frames(4).unwrap();
        let fb = pools.get_mut(kb).unwrap().get_frames(2).unwrap();
        assert_eq!(pools.owner_of(fb), Some(kb));
        assert_eq!(pools.frame_state(fa + 3), Some(FrameState::AllocatedBody));

        assert_eq!(pools.release_frames(fb), 2);
        assert_eq!(pools.release_frames(fa), 4);
        assert_eq!(pools.get(ka).unwrap().free_frames(), 512);
        assert_eq!(pools.get(kb).unwrap().free_frames(), 1024);
        assert_eq!(pools.owner_of(FrameNumber::new(100)), None);
    }

    #[test]
    fn overlapping_pools_are_rejected() {
        let mut a = Box::new(FrameInfo::zeroed());
        let mut b = Box::new(FrameInfo::zeroed());
        let mut pools = FramePools::new();
        let first = pools
            .add(ContFramePool::new(FrameNumber::new(512), 512, InfoStorage::External(&mut a)))
            .unwrap();
        let err = pools
            .add(ContFramePool::new(FrameNumber::new(1016), 16, InfoStorage::External(&mut b)))
            .unwrap_err();
        assert_eq!(
            err,
            FramePoolsError::Overlaps {
                first: FrameNumber::new(1016),
                last: FrameNumber::new(1031),
                existing: first
            }
        );
    }

    #[test]
    fn pool_frames_split_tables_and_data() {
        let mut a = Box::new(FrameInfo::zeroed());
        let mut b = Box::new(FrameInfo::zeroed());
        let mut pools = FramePools::new();
        let tables = pools
            .add(ContFramePool::new(FrameNumber::new(512), 8, InfoStorage::External(&mut a)))
            .unwrap();
        let data = pools
            .add(ContFramePool::new(FrameNumber::new(1024), 8, InfoStorage::External(&mut b)))
            .unwrap();

        let mut frames = pools.frames(tables, data);
        let t = frames.alloc_4k().unwrap();
        let d = frames.alloc_data_4k().unwrap();
        assert_eq!(t.frame_number(), FrameNumber::new(512));
        assert_eq!(d.frame_number(), FrameNumber::new(1024));
        frames.free_4k(d);
        assert_eq!(pools.get(data).unwrap().free_frames(), 8);
        assert_eq!(pools.get(tables).unwrap().free_frames(), 7);
    }

    #[test]
    fn unknown_pool_ids_are_errors() {
        let pools = FramePools::new();
        assert_eq!(
            pools.get(PoolId(3)).err(),
            Some(FramePoolsError::UnknownPool(PoolId(3)))
        );
    }

    #[test]
    #[should_panic(expected = "belongs to no frame pool")]
    fn releasing_a_foreign_frame_is_fatal() {
        let mut pools = FramePools::new();
        pools.release_frames(FrameNumber::new(42));
    }
}
