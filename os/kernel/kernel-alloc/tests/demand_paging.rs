use kernel_alloc::vm_pool::VmPoolError;
use kernel_alloc::vmm::{Vmm, VmmConfig, VmmError};
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, VirtualAddress};
use kernel_vmem::test_support::{RecordingMmu, TestPhys};
use kernel_vmem::{
    FaultPolicy, InterruptFrame, PageFaultError, PagingConfig, PhysicalWindow, TableWindow,
};

const HEAP: VirtualAddress = VirtualAddress::new(0x4000_0000);
const HEAP_SIZE: u32 = 0x10_0000;

/// Error code of a not-present write from supervisor mode.
const WRITE_NOT_PRESENT: u32 = 0b010;

fn touch<W: TableWindow>(vmm: &mut Vmm<'_, W, RecordingMmu>, va: VirtualAddress, err_code: u32) {
    vmm.mmu().fault_at(va);
    vmm.handle_fault(&InterruptFrame::page_fault(err_code)).unwrap();
}

#[test]
fn first_touch_maps_one_table_and_one_frame() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    let heap = vmm.create_pool(HEAP, HEAP_SIZE).unwrap();
    let buffer = vmm.allocate(heap, 3 * PAGE_SIZE).unwrap();
    assert_eq!(buffer, VirtualAddress::new(0x4000_1000));

    let kernel_free = vmm.frame_pools().get(vmm.kernel_pool()).unwrap().free_frames();
    let process_free = vmm.frame_pools().get(vmm.process_pool()).unwrap().free_frames();

    vmm.mmu().fault_at(buffer + 0x10);
    let serviced = vmm
        .handle_fault(&InterruptFrame::page_fault(WRITE_NOT_PRESENT))
        .unwrap();
    assert_eq!(serviced.frame.frame_number(), FrameNumber::new(1024));
    assert_eq!(serviced.table.map(|t| t.frame_number()), Some(FrameNumber::new(516)));

    let pools = vmm.frame_pools();
    assert_eq!(pools.get(vmm.kernel_pool()).unwrap().free_frames(), kernel_free - 1);
    assert_eq!(pools.get(vmm.process_pool()).unwrap().free_frames(), process_free - 1);
    assert_eq!(
        vmm.translate(buffer + 0x10).map(|pa| pa.as_u32()),
        Some(1024 * PAGE_SIZE + 0x10)
    );

    // A second page in the same 4 MiB slot reuses the table.
    vmm.mmu().fault_at(buffer + PAGE_SIZE);
    let serviced = vmm
        .handle_fault(&InterruptFrame::page_fault(WRITE_NOT_PRESENT))
        .unwrap();
    assert_eq!(serviced.table, None);
    assert_eq!(serviced.frame.frame_number(), FrameNumber::new(1025));
}

#[test]
fn release_returns_frames_and_reuses_space() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    let heap = vmm.create_pool(HEAP, HEAP_SIZE).unwrap();
    let available = vmm.vm_pool(heap).unwrap().size_available();
    let kernel_free = vmm.frame_pools().get(vmm.kernel_pool()).unwrap().free_frames();
    let process_free = vmm.frame_pools().get(vmm.process_pool()).unwrap().free_frames();

    let buffer = vmm.allocate(heap, 4 * PAGE_SIZE).unwrap();
    touch(&mut vmm, buffer, WRITE_NOT_PRESENT);
    touch(&mut vmm, buffer + 3 * PAGE_SIZE, WRITE_NOT_PRESENT);
    let loads = vmm.mmu().loads;

    assert_eq!(vmm.release(heap, buffer), Ok(2));
    assert_eq!(vmm.mmu().loads, loads + 1);
    assert!(vmm.translate(buffer).is_none());
    assert_eq!(vmm.vm_pool(heap).unwrap().size_available(), available);
    assert!(vmm.vm_pool(heap).unwrap().regions().is_empty());

    // The emptied table went back to the kernel pool.
    let pools = vmm.frame_pools();
    assert_eq!(pools.get(vmm.kernel_pool()).unwrap().free_frames(), kernel_free);
    assert_eq!(pools.get(vmm.process_pool()).unwrap().free_frames(), process_free);

    // Bump placement restarts at the freed spot.
    assert_eq!(vmm.allocate(heap, PAGE_SIZE).unwrap(), buffer);
}

#[test]
fn releasing_an_unknown_region_is_reported() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    let heap = vmm.create_pool(HEAP, HEAP_SIZE).unwrap();
    let buffer = vmm.allocate(heap, PAGE_SIZE).unwrap();

    let inside = buffer + 0x800;
    assert_eq!(
        vmm.release(heap, inside),
        Err(VmmError::VmPool(VmPoolError::RegionNotFound { address: inside }))
    );
    assert_eq!(vmm.vm_pool(heap).unwrap().regions().len(), 1);
}

#[test]
fn protection_faults_are_not_serviced() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    let heap = vmm.create_pool(HEAP, HEAP_SIZE).unwrap();
    let buffer = vmm.allocate(heap, PAGE_SIZE).unwrap();
    touch(&mut vmm, buffer, 0b000);

    let process_free = vmm.frame_pools().get(vmm.process_pool()).unwrap().free_frames();
    vmm.mmu().fault_at(buffer);
    let err = vmm
        .handle_fault(&InterruptFrame::page_fault(0b111))
        .unwrap_err();
    assert!(matches!(err, VmmError::PageFault(PageFaultError::Protection { .. })));
    assert_eq!(
        vmm.frame_pools().get(vmm.process_pool()).unwrap().free_frames(),
        process_free
    );
}

#[test]
fn legitimacy_follows_pool_windows() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    vmm.create_pool(HEAP, HEAP_SIZE).unwrap();

    assert!(vmm.is_legitimate(HEAP));
    assert!(vmm.is_legitimate(HEAP + (HEAP_SIZE - 1)));
    assert!(!vmm.is_legitimate(HEAP + HEAP_SIZE));
    assert!(!vmm.is_legitimate(VirtualAddress::new(0x3FFF_FFFF)));
}

#[test]
fn faults_outside_pools_are_serviced_by_default() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    let stray = VirtualAddress::new(0x0080_0000);
    touch(&mut vmm, stray, WRITE_NOT_PRESENT);
    assert!(vmm.translate(stray).is_some());
}

#[test]
fn strict_policy_rejects_faults_outside_pools() {
    let phys = TestPhys::default();
    let config = VmmConfig {
        paging: PagingConfig {
            fault_policy: FaultPolicy::RequireLegitimate,
            ..PagingConfig::default()
        },
        ..VmmConfig::default()
    };
    let mut vmm =
        unsafe { Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &config) }
            .unwrap();
    vmm.create_pool(HEAP, HEAP_SIZE).unwrap();

    let stray = VirtualAddress::new(0x0080_0000);
    vmm.mmu().fault_at(stray);
    assert_eq!(
        vmm.handle_fault(&InterruptFrame::page_fault(WRITE_NOT_PRESENT)),
        Err(VmmError::PageFault(PageFaultError::Illegitimate { address: stray }))
    );

    touch(&mut vmm, HEAP + PAGE_SIZE, WRITE_NOT_PRESENT);
    assert!(vmm.translate(HEAP + PAGE_SIZE).is_some());
}

#[test]
fn faults_in_the_shared_region_leave_the_identity_map_alone() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    let low = VirtualAddress::new(0x1000);
    let process_free = vmm.frame_pools().get(vmm.process_pool()).unwrap().free_frames();

    vmm.mmu().fault_at(low);
    assert_eq!(
        vmm.handle_fault(&InterruptFrame::page_fault(0b000)),
        Err(VmmError::PageFault(PageFaultError::SharedRegion { address: low }))
    );
    assert_eq!(vmm.translate(low).map(|pa| pa.as_u32()), Some(0x1000));
    assert_eq!(
        vmm.frame_pools().get(vmm.process_pool()).unwrap().free_frames(),
        process_free
    );
}

#[test]
fn pools_may_not_overlap_the_shared_region() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    let base = VirtualAddress::new(0x0010_0000);
    assert_eq!(
        vmm.create_pool(base, 0x10_0000),
        Err(VmmError::VmPool(VmPoolError::InvalidWindow {
            base,
            size: 0x10_0000
        }))
    );
    assert!(!vmm.is_legitimate(base));
}
