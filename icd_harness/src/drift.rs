//! Determinism verification and record comparison.

use serde::{Deserialize, Serialize};

use test_icd::calls::CallEnvelope;
use test_icd::domain::IcdConfig;
use test_icd::{DiscoveryPath, NegotiatePath, NegotiationRecord, VersionOutcome};

use crate::error::Result;
use crate::replay;

/// Verify determinism by replaying the same calls twice and asserting
/// identical hashes. Panics on failure.
pub fn verify_determinism(config: &IcdConfig, calls: &[CallEnvelope]) -> Result<String> {
    let hash1 = replay::rebuild_hash(config, calls)?;
    let hash2 = replay::rebuild_hash(config, calls)?;

    if hash1 != hash2 {
        panic!(
            "DETERMINISM FAILURE: two replays produced different hashes.\n\
             Run 1: {}\n\
             Run 2: {}",
            hash1, hash2
        );
    }
    Ok(hash1)
}

/// What a test expects a driver to have recorded. Unset fields are not
/// compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedRecord {
    #[serde(default)]
    pub discovery_path: Option<DiscoveryPath>,
    #[serde(default)]
    pub negotiate_path: Option<NegotiatePath>,
    #[serde(default)]
    pub version_outcome: Option<VersionOutcome>,
    #[serde(default)]
    pub negotiated_version: Option<u32>,
    #[serde(default)]
    pub received_version: Option<u32>,
}

impl ExpectedRecord {
    /// Expect exactly what `record` holds.
    pub fn exact(record: &NegotiationRecord) -> Self {
        Self {
            discovery_path: Some(record.discovery_path),
            negotiate_path: Some(record.negotiate_path),
            version_outcome: Some(record.version_outcome),
            negotiated_version: Some(record.negotiated_version),
            received_version: Some(record.received_version),
        }
    }
}

/// One field that differs between expectation and observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub field: &'static str,
    pub expected: String,
    pub observed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDiff {
    pub mismatches: Vec<FieldMismatch>,
}

impl RecordDiff {
    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// One line per mismatching field.
    pub fn describe(&self) -> String {
        self.mismatches
            .iter()
            .map(|m| format!("{}: expected {}, observed {}", m.field, m.expected, m.observed))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn check<T: PartialEq + std::fmt::Display>(
    mismatches: &mut Vec<FieldMismatch>,
    field: &'static str,
    expected: Option<T>,
    observed: T,
) {
    if let Some(expected) = expected {
        if expected != observed {
            mismatches.push(FieldMismatch {
                field,
                expected: expected.to_string(),
                observed: observed.to_string(),
            });
        }
    }
}

/// Structured comparison of an expectation against an observed record.
pub fn compare_records(expected: &ExpectedRecord, observed: &NegotiationRecord) -> RecordDiff {
    let mut mismatches = Vec::new();
    check(&mut mismatches, "discovery_path", expected.discovery_path, observed.discovery_path);
    check(&mut mismatches, "negotiate_path", expected.negotiate_path, observed.negotiate_path);
    check(&mut mismatches, "version_outcome", expected.version_outcome, observed.version_outcome);
    check(
        &mut mismatches,
        "negotiated_version",
        expected.negotiated_version,
        observed.negotiated_version,
    );
    check(
        &mut mismatches,
        "received_version",
        expected.received_version,
        observed.received_version,
    );
    RecordDiff { mismatches }
}
