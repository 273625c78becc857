use kernel_alloc::cont_frame_pool::FrameState;
use kernel_alloc::vmm::{FrameRange, Vmm, VmmConfig, VmmError};
use kernel_alloc::frame_pools::FramePoolsError;
use kernel_memory_addresses::{FrameNumber, PhysicalAddress, VirtualAddress};
use kernel_vmem::test_support::{RecordingMmu, TestPhys};
use kernel_vmem::{FrameAlloc, Mmu, PhysicalWindow};

#[test]
fn boot_lays_out_the_classic_pools() {
    let phys = TestPhys::default();
    let vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();

    let pools = vmm.frame_pools();
    let kernel = pools.get(vmm.kernel_pool()).unwrap();
    let process = pools.get(vmm.process_pool()).unwrap();

    // Own info frame, process info frame, directory, one shared table.
    assert_eq!(kernel.free_frames(), 508);
    assert_eq!(process.free_frames(), 7168 - 256);

    for frame in 512..516 {
        assert_eq!(
            pools.frame_state(FrameNumber::new(frame)),
            Some(FrameState::AllocatedHead),
            "frame {frame}"
        );
    }
    assert_eq!(pools.frame_state(FrameNumber::new(516)), Some(FrameState::Free));
    assert_eq!(vmm.address_space().directory_page(), FrameNumber::new(514).page());

    assert_eq!(pools.frame_state(FrameNumber::new(3840)), Some(FrameState::AllocatedHead));
    assert_eq!(pools.frame_state(FrameNumber::new(4095)), Some(FrameState::AllocatedBody));
    assert_eq!(pools.frame_state(FrameNumber::new(4096)), Some(FrameState::Free));
    assert_eq!(pools.owner_of(FrameNumber::new(100)), None);
}

#[test]
fn shared_region_is_identity_mapped() {
    let phys = TestPhys::default();
    let vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();

    for va in [0, 0x1234, 0x20_0000, 0x3F_FFFF] {
        assert_eq!(vmm.translate(VirtualAddress::new(va)), Some(PhysicalAddress::new(va)));
    }
    assert_eq!(vmm.translate(VirtualAddress::new(0x40_0000)), None);
}

#[test]
fn load_and_enable_reach_the_mmu() {
    let phys = TestPhys::default();
    let mut vmm = unsafe {
        Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &VmmConfig::default())
    }
    .unwrap();
    vmm.load();
    vmm.enable_paging();

    assert_eq!(vmm.mmu().loads, 1);
    assert_eq!(
        vmm.mmu().cr3.map(|cr3| cr3.directory()),
        Some(vmm.address_space().directory_page().base())
    );
    assert!(vmm.mmu().paging_enabled());
}

#[test]
fn process_frames_are_handed_out_around_the_hole() {
    let phys = TestPhys::default();
    let config = VmmConfig {
        process_pool: FrameRange::new(1024, 64),
        memory_hole: Some(FrameRange::new(1028, 8)),
        ..VmmConfig::default()
    };
    let mut vmm =
        unsafe { Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &config) }
            .unwrap();

    let mut frames = vmm.frames();
    let data: Vec<_> = (0..6).map(|_| frames.alloc_data_4k().unwrap().frame_number()).collect();
    let expected: Vec<_> = [1024, 1025, 1026, 1027, 1036, 1037]
        .into_iter()
        .map(FrameNumber::new)
        .collect();
    assert_eq!(data, expected);
}

#[test]
fn overlapping_pools_fail_boot() {
    let phys = TestPhys::default();
    let config = VmmConfig {
        process_pool: FrameRange::new(1016, 64),
        memory_hole: None,
        ..VmmConfig::default()
    };
    let result =
        unsafe { Vmm::boot(&phys, PhysicalWindow::new(&phys), RecordingMmu::default(), &config) };
    assert!(matches!(
        result.err(),
        Some(VmmError::FramePools(FramePoolsError::Overlaps { .. }))
    ));
}
