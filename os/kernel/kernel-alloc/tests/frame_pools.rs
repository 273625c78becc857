use kernel_alloc::cont_frame_pool::{ContFramePool, FrameInfo, FramePoolError, FrameState, InfoStorage};
use kernel_alloc::frame_pools::FramePools;
use kernel_memory_addresses::FrameNumber;

#[test]
fn first_fit_reuses_released_runs() {
    let mut info = Box::new(FrameInfo::zeroed());
    let mut pool = ContFramePool::new(FrameNumber::new(512), 1024, InfoStorage::External(&mut info));

    assert_eq!(pool.get_frames(3), Ok(FrameNumber::new(512)));
    assert_eq!(pool.get_frames(2), Ok(FrameNumber::new(515)));
    assert_eq!(pool.release_frames(FrameNumber::new(512)), 3);
    assert_eq!(pool.get_frames(3), Ok(FrameNumber::new(512)));
    assert_eq!(pool.free_frames(), 1024 - 5);
}

#[test]
fn inaccessible_frames_are_never_handed_out() {
    let mut info = Box::new(FrameInfo::zeroed());
    let mut pool = ContFramePool::new(FrameNumber::new(1024), 16, InfoStorage::External(&mut info));
    pool.mark_inaccessible(FrameNumber::new(1028), 4);

    assert_eq!(pool.get_frames(5), Ok(FrameNumber::new(1032)));
    assert_eq!(pool.get_frames(4), Ok(FrameNumber::new(1024)));
    assert_eq!(pool.get_frames(3), Ok(FrameNumber::new(1037)));
    assert_eq!(
        pool.get_frames(1),
        Err(FramePoolError::ExceedsTrackedCapacity {
            requested: 1,
            available: 0
        })
    );
}

#[test]
fn registry_releases_by_frame_number_alone() {
    let mut kernel_info = Box::new(FrameInfo::zeroed());
    let mut process_info = Box::new(FrameInfo::zeroed());
    let mut pools = FramePools::new();
    let kernel = pools
        .add(ContFramePool::new(FrameNumber::new(512), 512, InfoStorage::Internal(&mut kernel_info)))
        .unwrap();
    let process = pools
        .add(ContFramePool::new(FrameNumber::new(1024), 1024, InfoStorage::External(&mut process_info)))
        .unwrap();

    let k = pools.get_mut(kernel).unwrap().get_frames(2).unwrap();
    let p = pools.get_mut(process).unwrap().get_frames(8).unwrap();
    assert_eq!(k, FrameNumber::new(513));
    assert_eq!(pools.frame_state(p + 7), Some(FrameState::AllocatedBody));

    assert_eq!(pools.release_frames(p), 8);
    assert_eq!(pools.release_frames(k), 2);
    assert_eq!(pools.get(kernel).unwrap().free_frames(), 511);
    assert_eq!(pools.get(process).unwrap().free_frames(), 1024);
}

#[test]
#[should_panic(expected = "not the head")]
fn double_release_is_fatal() {
    let mut info = Box::new(FrameInfo::zeroed());
    let mut pools = FramePools::new();
    let id = pools
        .add(ContFramePool::new(FrameNumber::new(512), 64, InfoStorage::External(&mut info)))
        .unwrap();
    let f = pools.get_mut(id).unwrap().get_frames(4).unwrap();
    pools.release_frames(f);
    pools.release_frames(f);
}
