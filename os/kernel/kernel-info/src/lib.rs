//! # Kernel Memory Layout
//!
//! This crate is the single source of truth for the physical and virtual
//! memory layout of the kernel. The frame pools, the page-table code and the
//! boot sequence all read their ranges from here, so the layout cannot drift
//! between components.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  Low memory + kernel image      │ identity mapped, never pooled
//! 0x0020_0000 ├─────────────────────────────────┤ KERNEL_POOL_START_FRAME (512)
//!             │  Kernel frame pool (2 MiB)      │ page directories, tables, info frames
//! 0x0040_0000 ├─────────────────────────────────┤ PROCESS_POOL_START_FRAME (1024)
//!             │  Process frame pool             │ demand-paged data frames
//! 0x00F0_0000 ├─────────────────────────────────┤ MEM_HOLE_START_FRAME (3840)
//!             │  Memory hole (1 MiB, ISA)       │ marked inaccessible
//! 0x0100_0000 ├─────────────────────────────────┤
//!             │  Process frame pool (cont.)     │
//! 0x0200_0000 └─────────────────────────────────┘ 32 MiB
//! ```
//!
//! ## Virtual Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  Shared identity map (4 MiB)    │ SHARED_SIZE
//! 0x0040_0000 ├─────────────────────────────────┤
//!             │  demand paged                   │
//! 0x2000_0000 ├─────────────────────────────────┤ CODE_POOL_BASE
//!             │  code VM pool (256 MiB)         │
//! 0x4000_0000 ├─────────────────────────────────┤ HEAP_POOL_BASE
//!             │  heap VM pool (256 MiB)         │
//!             ├─────────────────────────────────┤
//!             │  demand paged                   │
//! 0xFFC0_0000 ├─────────────────────────────────┤ RECURSIVE_TABLES_BASE
//!             │  recursive window onto tables   │ directory slot 1023
//! 0xFFFF_F000 │  (the directory itself)         │ RECURSIVE_DIRECTORY_ADDRESS
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! All constants are checked for consistency at compile time.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
