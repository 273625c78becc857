//! # Memory Layout

use kernel_memory_addresses::{BYTES_PER_TABLE, ENTRIES_PER_TABLE, PAGE_SIZE, VirtualAddress};

/// Frame numbers below this value are never handed out by a pool; frame `0`
/// is therefore free to act as the allocation-failure sentinel.
pub const MIN_POOL_FRAME: u32 = 512;

/// Largest number of frames a single pool may manage.
pub const MAX_POOL_FRAMES: u32 = 8192;

/// First frame of the kernel pool (2 MiB).
pub const KERNEL_POOL_START_FRAME: u32 = (2 * 1024 * 1024) / PAGE_SIZE;

/// Number of frames in the kernel pool (2 MiB worth).
pub const KERNEL_POOL_SIZE: u32 = (2 * 1024 * 1024) / PAGE_SIZE;

/// First frame of the process pool (4 MiB).
pub const PROCESS_POOL_START_FRAME: u32 = (4 * 1024 * 1024) / PAGE_SIZE;

/// Number of frames in the process pool (28 MiB worth).
pub const PROCESS_POOL_SIZE: u32 = (28 * 1024 * 1024) / PAGE_SIZE;

/// First frame of the ISA memory hole at 15 MiB.
pub const MEM_HOLE_START_FRAME: u32 = (15 * 1024 * 1024) / PAGE_SIZE;

/// Number of frames in the memory hole (1 MiB worth).
pub const MEM_HOLE_SIZE: u32 = (1024 * 1024) / PAGE_SIZE;

/// Size of the identity-mapped region every address space shares (4 MiB).
pub const SHARED_SIZE: u32 = 4 * 1024 * 1024;

/// Directory slot reserved for the recursive self-map.
pub const RECURSIVE_SLOT: usize = ENTRIES_PER_TABLE - 1;

/// Virtual address at which the active directory is visible through the recursive slot.
pub const RECURSIVE_DIRECTORY_ADDRESS: VirtualAddress = VirtualAddress::new(0xFFFF_F000);

/// Base of the window through which the active address space's page tables are visible.
/// Table `d` lives at `RECURSIVE_TABLES_BASE + d * 4096`.
pub const RECURSIVE_TABLES_BASE: VirtualAddress = VirtualAddress::new(0xFFC0_0000);

/// Base of the kernel code VM pool (512 MiB).
pub const CODE_POOL_BASE: VirtualAddress = VirtualAddress::new(512 * 1024 * 1024);

/// Size of the kernel code VM pool.
pub const CODE_POOL_SIZE: u32 = 256 * 1024 * 1024;

/// Base of the kernel heap VM pool (1 GiB).
pub const HEAP_POOL_BASE: VirtualAddress = VirtualAddress::new(1024 * 1024 * 1024);

/// Size of the kernel heap VM pool.
pub const HEAP_POOL_SIZE: u32 = 256 * 1024 * 1024;

const _: () = {
    assert!(KERNEL_POOL_START_FRAME >= MIN_POOL_FRAME);
    assert!(KERNEL_POOL_START_FRAME + KERNEL_POOL_SIZE <= PROCESS_POOL_START_FRAME);
    assert!(KERNEL_POOL_SIZE % 8 == 0 && KERNEL_POOL_SIZE <= MAX_POOL_FRAMES);
    assert!(PROCESS_POOL_SIZE % 8 == 0 && PROCESS_POOL_SIZE <= MAX_POOL_FRAMES);
    assert!(MEM_HOLE_START_FRAME >= PROCESS_POOL_START_FRAME);
    assert!(
        MEM_HOLE_START_FRAME + MEM_HOLE_SIZE <= PROCESS_POOL_START_FRAME + PROCESS_POOL_SIZE
    );
    assert!(SHARED_SIZE % BYTES_PER_TABLE == 0);
    assert!(RECURSIVE_TABLES_BASE.as_u32() == (RECURSIVE_SLOT as u32) << 22);
    assert!(
        RECURSIVE_DIRECTORY_ADDRESS.as_u32()
            == RECURSIVE_TABLES_BASE.as_u32() | ((RECURSIVE_SLOT as u32) << 12)
    );
    assert!(CODE_POOL_BASE.as_u32() + CODE_POOL_SIZE <= HEAP_POOL_BASE.as_u32());
    assert!(HEAP_POOL_BASE.as_u32() + HEAP_POOL_SIZE <= RECURSIVE_TABLES_BASE.as_u32());
};
