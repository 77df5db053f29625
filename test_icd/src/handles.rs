//! Test ICD - Handle Allocation
//!
//! Handles are opaque 64-bit values: the upper 32 bits are the allocator's
//! namespace, the lower 32 bits a counter starting at 1. A value is never
//! handed out twice until `reset()`.
//!
//! There is no global counter. Whoever owns a set of drivers (see the
//! harness registry) gives each one its own namespace and decides when to
//! reset.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Instance,
    PhysicalDevice,
    Device,
    Surface,
    Swapchain,
    DebugMessenger,
}

impl HandleKind {
    /// Dispatchable handles carry a loader dispatch table in a real driver.
    pub fn is_dispatchable(self) -> bool {
        matches!(
            self,
            HandleKind::Instance | HandleKind::PhysicalDevice | HandleKind::Device
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle {
    pub kind: HandleKind,
    pub raw: u64,
}

impl Handle {
    pub fn namespace(&self) -> u32 {
        (self.raw >> 32) as u32
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#x})", self.kind, self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleAllocator {
    namespace: u32,
    next: u32,
}

impl HandleAllocator {
    pub fn new(namespace: u32) -> Self {
        Self { namespace, next: 1 }
    }

    pub fn namespace(&self) -> u32 {
        self.namespace
    }

    /// Number of handles handed out since construction or the last reset.
    pub fn allocated(&self) -> u32 {
        self.next - 1
    }

    pub fn allocate(&mut self, kind: HandleKind) -> Handle {
        let counter = self.next;
        self.next = match self.next.checked_add(1) {
            Some(n) => n,
            None => panic!(
                "Handle namespace {} exhausted after {} allocations",
                self.namespace, counter
            ),
        };
        let handle = Handle {
            kind,
            raw: (u64::from(self.namespace) << 32) | u64::from(counter),
        };
        tracing::trace!(%handle, "handle allocated");
        handle
    }

    /// Start counting from 1 again. Only valid once every handle from the
    /// previous generation has been dropped by its owner.
    pub fn reset(&mut self) {
        self.next = 1;
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}
