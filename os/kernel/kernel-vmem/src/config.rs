//! # Paging Configuration

use crate::info::SHARED_SIZE;

/// Decides whether a not-present fault is checked against the registered
/// VM-pool windows before it is serviced.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum FaultPolicy {
    /// Service every not-present fault outside the recursive window.
    #[default]
    ServiceAll,
    /// Only service faults that fall inside a registered VM-pool window.
    RequireLegitimate,
}

/// Runtime configuration of an [`AddressSpace`](crate::AddressSpace).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PagingConfig {
    /// Bytes at the bottom of the address space that are identity-mapped
    /// (supervisor, read/write) at construction and shared by every space.
    pub shared_size: u32,
    /// How not-present faults are screened.
    pub fault_policy: FaultPolicy,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            shared_size: SHARED_SIZE,
            fault_policy: FaultPolicy::ServiceAll,
        }
    }
}
