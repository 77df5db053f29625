//! Error types for the non-panicking driver APIs.

use thiserror::Error;

use crate::handles::Handle;
use crate::record::DiscoveryPath;

#[derive(Debug, Error)]
pub enum IcdError {
    #[error("interface version range invalid: min={min} max={max} ceiling={ceiling} (need min <= max <= ceiling)")]
    InvalidVersionRange { min: u32, max: u32, ceiling: u32 },

    #[error("physical device group {group} references device index {index}, only {count} devices configured")]
    InvalidDeviceGroup { group: usize, index: usize, count: usize },

    #[error("discovery path already recorded as {existing}, attempted {attempted}")]
    DiscoveryAlreadyRecorded {
        existing: DiscoveryPath,
        attempted: DiscoveryPath,
    },

    #[error("cannot record {} as a discovery path", DiscoveryPath::NotCalled)]
    DiscoveryPathNotCalled,

    #[error("[INVARIANT:{tag}] {detail}")]
    Invariant { tag: &'static str, detail: String },

    #[error("unknown handle {0}")]
    UnknownHandle(Handle),
}

impl IcdError {
    pub(crate) fn invariant(tag: &'static str, detail: impl Into<String>) -> Self {
        IcdError::Invariant {
            tag,
            detail: detail.into(),
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, IcdError>;
