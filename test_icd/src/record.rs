//! Test ICD - Negotiation Record
//!
//! The audit trail of how a loader obtained entry points from the driver and
//! which interface version the two sides agreed on.
//!
//! `negotiate` is total over `u32` and never fails; the only hard failure in
//! this module is recording a discovery path twice.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IcdError, Result};

/// Lowest interface version the driver accepts unless configured otherwise.
pub const DEFAULT_MIN_ICD_INTERFACE_VERSION: u32 = 0;

/// Highest interface version the driver accepts unless configured otherwise.
pub const DEFAULT_MAX_ICD_INTERFACE_VERSION: u32 = 7;

/// Highest interface version the driver's own code can interpret.
/// Proposals above this are `LoaderTooNew` regardless of the supported range.
pub const DEFAULT_INTERFACE_VERSION_CEILING: u32 = 255;

// ---------------------------------------------------------------------------
// Observables
// ---------------------------------------------------------------------------

/// Which proc-address entry point the loader used first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryPath {
    #[default]
    NotCalled,
    ViaIcdGetInstanceProcAddr,
    ViaGetInstanceProcAddr,
}

/// Which of the two legal negotiation sequences the loader followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiatePath {
    #[default]
    NotCalled,
    ExplicitInterfaceCall,
    GetInstanceProcAddrFirst,
}

/// Result of comparing the loader's proposal against the supported range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOutcome {
    #[default]
    NotCalled,
    LoaderTooOld,
    LoaderTooNew,
    DriverTooNew,
    Supported,
}

impl VersionOutcome {
    /// Outcomes after which the loader must not use the driver.
    pub fn is_incompatible(self) -> bool {
        matches!(self, VersionOutcome::LoaderTooOld | VersionOutcome::LoaderTooNew)
    }
}

impl fmt::Display for DiscoveryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryPath::NotCalled => "not_called",
            DiscoveryPath::ViaIcdGetInstanceProcAddr => "vk_icd_gipa",
            DiscoveryPath::ViaGetInstanceProcAddr => "vk_gipa",
        };
        write!(f, "DiscoveryPath::{}", name)
    }
}

impl fmt::Display for NegotiatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiatePath::NotCalled => "not_called",
            NegotiatePath::ExplicitInterfaceCall => "vk_icd_negotiate",
            NegotiatePath::GetInstanceProcAddrFirst => "vk_icd_gipa_first",
        };
        write!(f, "NegotiatePath::{}", name)
    }
}

impl fmt::Display for VersionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VersionOutcome::NotCalled => "not_called",
            VersionOutcome::LoaderTooOld => "loader_version_too_old",
            VersionOutcome::LoaderTooNew => "loader_version_too_new",
            VersionOutcome::DriverTooNew => "icd_version_too_new",
            VersionOutcome::Supported => "version_is_supported",
        };
        write!(f, "VersionOutcome::{}", name)
    }
}

/// Where a driver instance is in its handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Fresh,
    DiscoveryRecorded,
    NegotiationRecorded,
    Finalized,
}

// ---------------------------------------------------------------------------
// Version range
// ---------------------------------------------------------------------------

/// Closed interval of accepted interface versions plus the ceiling the driver
/// understands. Always satisfies `min <= max <= ceiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVersionRange")]
pub struct InterfaceVersionRange {
    min: u32,
    max: u32,
    ceiling: u32,
}

#[derive(Deserialize)]
struct RawVersionRange {
    min: u32,
    max: u32,
    ceiling: u32,
}

impl TryFrom<RawVersionRange> for InterfaceVersionRange {
    type Error = IcdError;

    fn try_from(raw: RawVersionRange) -> std::result::Result<Self, Self::Error> {
        InterfaceVersionRange::new(raw.min, raw.max, raw.ceiling)
    }
}

impl InterfaceVersionRange {
    pub fn new(min: u32, max: u32, ceiling: u32) -> Result<Self> {
        if min > max || max > ceiling {
            return Err(IcdError::InvalidVersionRange { min, max, ceiling });
        }
        Ok(Self { min, max, ceiling })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn contains(&self, version: u32) -> bool {
        self.min <= version && version <= self.max
    }

    /// Pure classification of a loader proposal. Boundaries are inclusive.
    pub fn classify(&self, proposed: u32) -> VersionOutcome {
        if proposed < self.min {
            VersionOutcome::LoaderTooOld
        } else if proposed > self.ceiling {
            VersionOutcome::LoaderTooNew
        } else if proposed > self.max {
            VersionOutcome::DriverTooNew
        } else {
            VersionOutcome::Supported
        }
    }

    /// The version written back to the loader for a given proposal.
    pub fn reported_version(&self, proposed: u32) -> u32 {
        match self.classify(proposed) {
            VersionOutcome::LoaderTooOld => self.min,
            VersionOutcome::LoaderTooNew | VersionOutcome::DriverTooNew => self.max,
            _ => proposed.min(self.max),
        }
    }
}

impl Default for InterfaceVersionRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_ICD_INTERFACE_VERSION,
            max: DEFAULT_MAX_ICD_INTERFACE_VERSION,
            ceiling: DEFAULT_INTERFACE_VERSION_CEILING,
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Per-driver record of discovery and negotiation. Owned by exactly one driver
/// instance; the loader only sees the values `negotiate` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationRecord {
    pub discovery_path: DiscoveryPath,
    pub negotiate_path: NegotiatePath,
    pub version_outcome: VersionOutcome,
    pub range: InterfaceVersionRange,
    pub negotiated_version: u32,
    /// The version the loader proposed in its latest negotiation, kept even
    /// when the proposal was rejected. 0 until the first negotiation.
    pub received_version: u32,
}

impl NegotiationRecord {
    pub fn new(range: InterfaceVersionRange) -> Self {
        Self {
            discovery_path: DiscoveryPath::NotCalled,
            negotiate_path: NegotiatePath::NotCalled,
            version_outcome: VersionOutcome::NotCalled,
            range,
            negotiated_version: 0,
            received_version: 0,
        }
    }

    pub fn min_supported_version(&self) -> u32 {
        self.range.min()
    }

    pub fn max_supported_version(&self) -> u32 {
        self.range.max()
    }

    pub fn state(&self) -> NegotiationState {
        if self.version_outcome != VersionOutcome::NotCalled {
            NegotiationState::Finalized
        } else if self.negotiate_path != NegotiatePath::NotCalled {
            NegotiationState::NegotiationRecorded
        } else if self.discovery_path != DiscoveryPath::NotCalled {
            NegotiationState::DiscoveryRecorded
        } else {
            NegotiationState::Fresh
        }
    }

    /// Classify `proposed` and store the outcome. Each call overwrites the
    /// previous outcome; `negotiated_version` is only non-zero while the
    /// outcome is `Supported`.
    pub fn negotiate(&mut self, proposed: u32) -> VersionOutcome {
        if self.state() == NegotiationState::Finalized {
            tracing::warn!(
                previous = %self.version_outcome,
                proposed,
                "interface negotiated again after the handshake finished"
            );
        }

        let outcome = self.range.classify(proposed);
        self.version_outcome = outcome;
        self.received_version = proposed;
        self.negotiated_version = match outcome {
            VersionOutcome::Supported => proposed.min(self.range.max()),
            _ => 0,
        };

        tracing::debug!(
            proposed,
            min = self.range.min(),
            max = self.range.max(),
            outcome = %outcome,
            "interface version negotiated"
        );
        outcome
    }

    /// Note that the loader entered the explicit negotiation entry point.
    /// Only the first entry is recorded.
    pub fn mark_negotiate_entry(&mut self) {
        if self.negotiate_path != NegotiatePath::NotCalled {
            return;
        }
        self.negotiate_path = if self.discovery_path == DiscoveryPath::NotCalled {
            NegotiatePath::ExplicitInterfaceCall
        } else {
            NegotiatePath::GetInstanceProcAddrFirst
        };
    }

    /// Record how the loader discovered entry points. Panics when a path was
    /// already recorded: two discovery strategies in one session is a loader
    /// or harness bug.
    pub fn record_discovery(&mut self, path: DiscoveryPath) {
        if let Err(e) = self.try_record_discovery(path) {
            panic!("Invariant violation: [INVARIANT:discovery_set_once] {}", e);
        }
    }

    pub fn try_record_discovery(&mut self, path: DiscoveryPath) -> Result<()> {
        if path == DiscoveryPath::NotCalled {
            return Err(IcdError::DiscoveryPathNotCalled);
        }
        if self.discovery_path != DiscoveryPath::NotCalled {
            return Err(IcdError::DiscoveryAlreadyRecorded {
                existing: self.discovery_path,
                attempted: path,
            });
        }
        tracing::debug!(path = %path, "entry point discovery recorded");
        self.discovery_path = path;
        Ok(())
    }
}

impl Default for NegotiationRecord {
    fn default() -> Self {
        Self::new(InterfaceVersionRange::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(min: u32, max: u32) -> NegotiationRecord {
        NegotiationRecord::new(
            InterfaceVersionRange::new(min, max, DEFAULT_INTERFACE_VERSION_CEILING).unwrap(),
        )
    }

    #[test]
    fn fresh_record_is_not_called() {
        let r = NegotiationRecord::default();
        assert_eq!(r.discovery_path, DiscoveryPath::NotCalled);
        assert_eq!(r.negotiate_path, NegotiatePath::NotCalled);
        assert_eq!(r.version_outcome, VersionOutcome::NotCalled);
        assert_eq!(r.negotiated_version, 0);
        assert_eq!(r.received_version, 0);
        assert_eq!(r.state(), NegotiationState::Fresh);
    }

    #[test]
    fn proposal_inside_range_is_supported() {
        let mut r = record(0, 7);
        assert_eq!(r.negotiate(5), VersionOutcome::Supported);
        assert_eq!(r.negotiated_version, 5);
        assert_eq!(r.state(), NegotiationState::Finalized);
    }

    #[test]
    fn proposal_below_min_is_loader_too_old() {
        let mut r = record(2, 7);
        assert_eq!(r.negotiate(1), VersionOutcome::LoaderTooOld);
        assert_eq!(r.negotiated_version, 0);
    }

    #[test]
    fn rejected_proposals_keep_received_version() {
        let mut r = record(2, 7);
        assert_eq!(r.negotiate(1), VersionOutcome::LoaderTooOld);
        assert_eq!(r.received_version, 1);

        let mut r = NegotiationRecord::new(InterfaceVersionRange::new(0, 3, 5).unwrap());
        assert_eq!(r.negotiate(40), VersionOutcome::LoaderTooNew);
        assert_eq!(r.received_version, 40);
        assert_eq!(r.negotiated_version, 0);

        assert_eq!(r.negotiate(2), VersionOutcome::Supported);
        assert_eq!(r.received_version, 2);
    }

    #[test]
    fn proposal_above_max_is_driver_too_new() {
        let mut r = record(0, 3);
        assert_eq!(r.negotiate(9), VersionOutcome::DriverTooNew);
        assert_eq!(r.negotiated_version, 0);
    }

    #[test]
    fn proposal_above_ceiling_is_loader_too_new() {
        let range = InterfaceVersionRange::new(0, 3, 5).unwrap();
        let mut r = NegotiationRecord::new(range);
        assert_eq!(r.negotiate(5), VersionOutcome::DriverTooNew);
        assert_eq!(r.negotiate(6), VersionOutcome::LoaderTooNew);
        assert_eq!(r.negotiate(u32::MAX), VersionOutcome::LoaderTooNew);
    }

    #[test]
    fn boundaries_are_inclusive() {
        let mut r = record(2, 6);
        assert_eq!(r.negotiate(2), VersionOutcome::Supported);
        assert_eq!(r.negotiated_version, 2);
        assert_eq!(r.negotiate(6), VersionOutcome::Supported);
        assert_eq!(r.negotiated_version, 6);
    }

    #[test]
    fn renegotiation_clears_stale_version() {
        let mut r = record(2, 6);
        r.negotiate(4);
        assert_eq!(r.negotiate(0), VersionOutcome::LoaderTooOld);
        assert_eq!(r.negotiated_version, 0);
    }

    #[test]
    fn reported_version_counter_proposals() {
        let range = InterfaceVersionRange::new(2, 5, 10).unwrap();
        assert_eq!(range.reported_version(1), 2);
        assert_eq!(range.reported_version(4), 4);
        assert_eq!(range.reported_version(7), 5);
        assert_eq!(range.reported_version(11), 5);
    }

    #[test]
    fn invalid_range_rejected() {
        assert!(InterfaceVersionRange::new(4, 3, 10).is_err());
        assert!(InterfaceVersionRange::new(0, 11, 10).is_err());
        assert!(InterfaceVersionRange::new(3, 3, 3).is_ok());
    }

    #[test]
    fn range_deserialization_is_validated() {
        let bad = serde_json::from_str::<InterfaceVersionRange>(r#"{"min":5,"max":1,"ceiling":9}"#);
        assert!(bad.is_err());
        let good: InterfaceVersionRange =
            serde_json::from_str(r#"{"min":1,"max":5,"ceiling":9}"#).unwrap();
        assert_eq!(good.max(), 5);
    }

    #[test]
    fn negotiate_first_is_explicit_path() {
        let mut r = NegotiationRecord::default();
        r.mark_negotiate_entry();
        assert_eq!(r.negotiate_path, NegotiatePath::ExplicitInterfaceCall);
        assert_eq!(r.state(), NegotiationState::NegotiationRecorded);
    }

    #[test]
    fn discovery_first_is_gipa_first_path() {
        let mut r = NegotiationRecord::default();
        r.record_discovery(DiscoveryPath::ViaGetInstanceProcAddr);
        assert_eq!(r.state(), NegotiationState::DiscoveryRecorded);
        r.mark_negotiate_entry();
        assert_eq!(r.negotiate_path, NegotiatePath::GetInstanceProcAddrFirst);
    }

    #[test]
    fn negotiate_path_is_kept_from_first_entry() {
        let mut r = NegotiationRecord::default();
        r.mark_negotiate_entry();
        r.record_discovery(DiscoveryPath::ViaIcdGetInstanceProcAddr);
        r.mark_negotiate_entry();
        assert_eq!(r.negotiate_path, NegotiatePath::ExplicitInterfaceCall);
    }

    #[test]
    #[should_panic(expected = "[INVARIANT:discovery_set_once]")]
    fn second_discovery_panics() {
        let mut r = NegotiationRecord::default();
        r.record_discovery(DiscoveryPath::ViaGetInstanceProcAddr);
        r.mark_negotiate_entry();
        r.record_discovery(DiscoveryPath::ViaGetInstanceProcAddr);
    }

    #[test]
    fn try_second_discovery_is_err() {
        let mut r = NegotiationRecord::default();
        r.try_record_discovery(DiscoveryPath::ViaIcdGetInstanceProcAddr).unwrap();
        let err = r
            .try_record_discovery(DiscoveryPath::ViaGetInstanceProcAddr)
            .unwrap_err();
        assert!(matches!(err, IcdError::DiscoveryAlreadyRecorded { .. }));
        assert_eq!(r.discovery_path, DiscoveryPath::ViaIcdGetInstanceProcAddr);
    }

    #[test]
    fn recording_not_called_is_err() {
        let mut r = NegotiationRecord::default();
        assert!(matches!(
            r.try_record_discovery(DiscoveryPath::NotCalled),
            Err(IcdError::DiscoveryPathNotCalled)
        ));
    }

    #[test]
    fn display_matches_legacy_names() {
        assert_eq!(
            VersionOutcome::DriverTooNew.to_string(),
            "VersionOutcome::icd_version_too_new"
        );
        assert_eq!(
            NegotiatePath::GetInstanceProcAddrFirst.to_string(),
            "NegotiatePath::vk_icd_gipa_first"
        );
    }
}
