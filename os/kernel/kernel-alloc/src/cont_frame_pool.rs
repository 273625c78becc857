//! # Contiguous Frame Pool
//!
//! A [`ContFramePool`] owns a fixed range of physical frames and hands out
//! runs of *contiguous* frames. A run is released by naming only its first
//! frame; the pool finds the end of the run on its own.
//!
//! ## Bookkeeping
//!
//! Every frame is in one of three [`FrameState`]s, encoded as two bits kept in
//! two parallel bitmaps inside a [`FrameInfo`] frame:
//!
//! | free bit | head bit | state |
//! |:--------:|:--------:|-------|
//! | 1        | –        | [`FrameState::Free`] |
//! | 0        | 0        | [`FrameState::AllocatedHead`] |
//! | 0        | 1        | [`FrameState::AllocatedBody`] |
//!
//! Bits are packed most-significant first: frame `i` of the pool is bit
//! `0x80 >> (i % 8)` of byte `i / 8`.
//!
//! ```text
//!  frame:   512 513 514 515 516 517 ...
//!  state:    H   B   B   H   B   F
//!  free:     0   0   0   0   0   1
//!  head:     0   1   1   0   1   1
//! ```
//!
//! Releasing frame 512 frees 512..=514 and stops at 515, the head of the
//! next run.

use kernel_info::memory::{MAX_POOL_FRAMES, MIN_POOL_FRAME};
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE};
use log::{debug, info, warn};

/// Bytes per bitmap; enough for [`MAX_POOL_FRAMES`] frames.
pub const MAX_MAPINDEX_BOUND: usize = (MAX_POOL_FRAMES / 8) as usize;

/// Number of frames whose state one [`FrameInfo`] frame can hold.
pub const FRAMES_PER_INFO_FRAME: u32 = MAX_POOL_FRAMES;

/// The metadata frame of a pool: free bitmap followed by the head bitmap.
#[repr(C, align(4096))]
pub struct FrameInfo {
    free: [u8; MAX_MAPINDEX_BOUND],
    head: [u8; MAX_MAPINDEX_BOUND],
    _unused: [u8; PAGE_SIZE as usize - 2 * MAX_MAPINDEX_BOUND],
}

const _: () = assert!(size_of::<FrameInfo>() == PAGE_SIZE as usize);

impl FrameInfo {
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            free: [0; MAX_MAPINDEX_BOUND],
            head: [0; MAX_MAPINDEX_BOUND],
            _unused: [0; PAGE_SIZE as usize - 2 * MAX_MAPINDEX_BOUND],
        }
    }
}

/// State of a single frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameState {
    Free,
    /// First frame of an allocated run.
    AllocatedHead,
    /// Any later frame of an allocated run.
    AllocatedBody,
}

/// Where a pool keeps its [`FrameInfo`].
pub enum InfoStorage<'a> {
    /// In the pool's own first frame, which the caller maps here. That frame
    /// is marked allocated, shrinking the allocatable count by one.
    Internal(&'a mut FrameInfo),
    /// In a frame outside the pool, typically taken from another pool.
    External(&'a mut FrameInfo),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FramePoolError {
    #[error("requested zero frames")]
    ZeroFrames,
    #[error("requested {requested} frames, but only {available} are free")]
    ExceedsTrackedCapacity { requested: u32, available: u32 },
    #[error("no run of {requested} contiguous free frames")]
    NoContiguousRun { requested: u32 },
}

/// Allocator of contiguous frame runs over one physical frame range.
pub struct ContFramePool<'a> {
    base: FrameNumber,
    count: u32,
    free: u32,
    info: &'a mut FrameInfo,
}

impl<'a> ContFramePool<'a> {
    /// Create a pool over frames `base .. base + count`.
    ///
    /// # Panics
    /// If `count` is zero, not a multiple of 8, or larger than
    /// [`MAX_POOL_FRAMES`], or if `base` is below [`MIN_POOL_FRAME`].
    pub fn new(base: FrameNumber, count: u32, info: InfoStorage<'a>) -> Self {
        assert!(count > 0 && count % 8 == 0, "pool size {count} is not a positive multiple of 8");
        assert!(count <= MAX_POOL_FRAMES, "pool size {count} exceeds {MAX_POOL_FRAMES}");
        assert!(
            base.as_u32() >= MIN_POOL_FRAME,
            "pool base {base:?} is below frame {MIN_POOL_FRAME}"
        );

        let (info, internal) = match info {
            InfoStorage::Internal(info) => (info, true),
            InfoStorage::External(info) => (info, false),
        };

        let used = (count / 8) as usize;
        info.free[..used].fill(0xFF);
        info.free[used..].fill(0);
        info.head.fill(0xFF);

        let mut pool = Self {
            base,
            count,
            free: count,
            info,
        };
        if internal {
            pool.claim(0, 1);
        }

        info!(
            "Constructed frame pool {base:?}..={:?} ({} frames, {} free)",
            pool.frame_end(),
            count,
            pool.free
        );
        pool
    }

    /// Number of info frames needed to track `n` frames.
    ///
    /// ```rust
    /// # use kernel_alloc::cont_frame_pool::ContFramePool;
    /// assert_eq!(ContFramePool::needed_info_frames(1), 1);
    /// assert_eq!(ContFramePool::needed_info_frames(8192), 1);
    /// assert_eq!(ContFramePool::needed_info_frames(8193), 2);
    /// ```
    #[must_use]
    pub const fn needed_info_frames(n: u32) -> u32 {
        n.div_ceil(FRAMES_PER_INFO_FRAME)
    }

    #[inline]
    #[must_use]
    pub const fn base_frame_no(&self) -> FrameNumber {
        self.base
    }

    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.count
    }

    /// Last frame of the pool (inclusive).
    #[inline]
    #[must_use]
    pub const fn frame_end(&self) -> FrameNumber {
        FrameNumber::new(self.base.as_u32() + self.count - 1)
    }

    /// Frames currently available for allocation.
    #[inline]
    #[must_use]
    pub const fn free_frames(&self) -> u32 {
        self.free
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, frame: FrameNumber) -> bool {
        frame.as_u32() >= self.base.as_u32() && frame.as_u32() - self.base.as_u32() < self.count
    }

    /// `true` if any frame of `first .. first + count` belongs to this pool.
    #[must_use]
    pub fn overlaps(&self, first: FrameNumber, count: u32) -> bool {
        let start = u64::from(first.as_u32());
        let end = start + u64::from(count);
        let own_start = u64::from(self.base.as_u32());
        let own_end = own_start + u64::from(self.count);
        start < own_end && own_start < end
    }

    /// State of `frame`, or `None` if it does not belong to this pool.
    #[must_use]
    pub fn state(&self, frame: FrameNumber) -> Option<FrameState> {
        self.contains(frame).then(|| self.state_at(frame - self.base))
    }

    /// Allocate `n` contiguous frames, first fit.
    ///
    /// # Errors
    /// - [`FramePoolError::ZeroFrames`] if `n` is zero.
    /// - [`FramePoolError::ExceedsTrackedCapacity`] if fewer than `n` frames are free.
    /// - [`FramePoolError::NoContiguousRun`] if the free frames are too fragmented.
    pub fn get_frames(&mut self, n: u32) -> Result<FrameNumber, FramePoolError> {
        if n == 0 {
            return Err(FramePoolError::ZeroFrames);
        }
        if n > self.free {
            warn!(
                "Frame pool {:?}: requested {n} frames, {} free",
                self.base, self.free
            );
            return Err(FramePoolError::ExceedsTrackedCapacity {
                requested: n,
                available: self.free,
            });
        }

        let mut start = 0;
        'scan: while start + n <= self.count {
            for i in start..start + n {
                if !self.is_free(i) {
                    start = i + 1;
                    continue 'scan;
                }
            }

            self.claim(start, n);
            let first = self.base + start;
            debug!("Frame pool {:?}: allocated {n} frame(s) at {first:?}", self.base);
            return Ok(first);
        }

        warn!(
            "Frame pool {:?}: no run of {n} contiguous free frames",
            self.base
        );
        Err(FramePoolError::NoContiguousRun { requested: n })
    }

    /// [`get_frames`](Self::get_frames) with the raw contract: the first frame
    /// number on success, `0` on any failure.
    #[must_use]
    pub fn get_frames_or_zero(&mut self, n: u32) -> u32 {
        self.get_frames(n).map_or(0, FrameNumber::as_u32)
    }

    /// Permanently take `base .. base + n` out of circulation.
    ///
    /// # Panics
    /// If any frame lies outside the pool or is not free.
    pub fn mark_inaccessible(&mut self, base: FrameNumber, n: u32) {
        assert!(n > 0, "marking zero frames inaccessible");
        assert!(
            self.contains(base) && self.contains(base + (n - 1)),
            "frames {base:?}+{n} are not inside pool {:?}..={:?}",
            self.base,
            self.frame_end()
        );

        let start = base - self.base;
        for i in start..start + n {
            assert!(
                self.is_free(i),
                "frame {:?} is not free and cannot be marked inaccessible",
                self.base + i
            );
        }

        self.claim(start, n);
        info!("Frame pool {:?}: marked {n} frame(s) at {base:?} inaccessible", self.base);
    }

    /// Release the run starting at `first`. Returns the number of frames freed.
    ///
    /// # Panics
    /// If `first` is outside the pool or not the head of an allocated run.
    pub fn release_frames(&mut self, first: FrameNumber) -> u32 {
        assert!(
            self.contains(first),
            "frame {first:?} is not inside pool {:?}..={:?}",
            self.base,
            self.frame_end()
        );

        let start = first - self.base;
        assert_eq!(
            self.state_at(start),
            FrameState::AllocatedHead,
            "frame {first:?} is not the head of an allocated run"
        );

        self.set_free(start);
        let mut released = 1;
        let mut i = start + 1;
        while i < self.count && self.state_at(i) == FrameState::AllocatedBody {
            self.set_free(i);
            released += 1;
            i += 1;
        }

        self.free += released;
        debug!("Frame pool {:?}: released {released} frame(s) at {first:?}", self.base);
        released
    }

    /// Mark `start .. start + n` (pool-relative) as one allocated run.
    fn claim(&mut self, start: u32, n: u32) {
        let (byte, mask) = bit(start);
        self.info.free[byte] &= !mask;
        self.info.head[byte] &= !mask;
        for i in start + 1..start + n {
            let (byte, mask) = bit(i);
            self.info.free[byte] &= !mask;
            self.info.head[byte] |= mask;
        }
        self.free -= n;
    }

    fn set_free(&mut self, i: u32) {
        let (byte, mask) = bit(i);
        self.info.free[byte] |= mask;
        self.info.head[byte] |= mask;
    }

    fn is_free(&self, i: u32) -> bool {
        let (byte, mask) = bit(i);
        self.info.free[byte] & mask != 0
    }

    fn state_at(&self, i: u32) -> FrameState {
        let (byte, mask) = bit(i);
        if self.info.free[byte] & mask != 0 {
            FrameState::Free
        } else if self.info.head[byte] & mask == 0 {
            FrameState::AllocatedHead
        } else {
            FrameState::AllocatedBody
        }
    }
}

/// Byte index and MSB-first mask of pool-relative frame `i`.
#[inline]
const fn bit(i: u32) -> (usize, u8) {
    ((i / 8) as usize, 0x80 >> (i % 8))
}
