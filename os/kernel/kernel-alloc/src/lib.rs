//! # Kernel Memory Allocation and Virtual Memory Management
//!
//! Physical frame pools, virtual memory pools, and the [`Vmm`](vmm::Vmm) that
//! ties both to the kernel's address space.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Virtual Memory Manager (Vmm)         │
//! │    • boot-time pool setup                           │
//! │    • page-fault entry point                         │
//! │    • VM pools: allocate / release regions           │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │        AddressSpace (kernel-vmem)                   │
//! │    • directory + tables, demand paging              │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ FrameAlloc
//! ┌─────────────────▼───────────────────────────────────┐
//! │         FramePools → ContFramePool                  │
//! │    • contiguous runs of 4 KiB frames                │
//! │    • release by frame number alone                  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Contiguous frame pools ([`cont_frame_pool`], [`frame_pools`])
//!
//! A [`ContFramePool`](cont_frame_pool::ContFramePool) tracks a fixed frame
//! range in two bitmaps and allocates contiguous runs first-fit. The
//! [`FramePools`](frame_pools::FramePools) registry finds the owning pool when
//! a run is released by its first frame.
//!
//! ### Virtual memory pools ([`vm_pool`])
//!
//! A [`VmPool`](vm_pool::VmPool) hands out page-granular regions of a virtual
//! window. Nothing is mapped up front; the address space maps pages on the
//! first fault and [`VmPool::release`](vm_pool::VmPool::release) unmaps them.
//!
//! ### Physical mapper ([`phys_mapper`])
//!
//! [`IdentityPhysMapper`](phys_mapper::IdentityPhysMapper) reaches frames at
//! their physical address, which holds before paging and for the shared
//! identity-mapped region afterwards.
//!
//! ## Usage
//!
//! ### Contiguous allocation
//! ```rust
//! use kernel_alloc::cont_frame_pool::{ContFramePool, FrameInfo, InfoStorage};
//! use kernel_memory_addresses::FrameNumber;
//!
//! let mut info = Box::new(FrameInfo::zeroed());
//! let mut pool = ContFramePool::new(FrameNumber::new(512), 1024, InfoStorage::External(&mut info));
//!
//! let a = pool.get_frames(3).unwrap();
//! let b = pool.get_frames(2).unwrap();
//! assert_eq!((a.as_u32(), b.as_u32()), (512, 515));
//!
//! assert_eq!(pool.release_frames(a), 3);
//! assert_eq!(pool.get_frames(3).unwrap(), a);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cont_frame_pool;
pub mod frame_pools;
pub mod phys_mapper;
pub mod vm_pool;
pub mod vmm;
