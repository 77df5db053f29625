//! Test ICD - Invariant Checks
//!
//! Hard-fail validation run after every loader call. A violation means the
//! harness or the loader under test is broken, so the panicking variant is
//! the default.

use std::collections::BTreeSet;

use crate::domain::IcdState;
use crate::error::{IcdError, Result};
use crate::record::{DiscoveryPath, NegotiatePath, VersionOutcome};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run all checks. Panics on the first failure.
pub fn validate_invariants(state: &IcdState) {
    if let Err(e) = try_validate_invariants(state) {
        panic!("Invariant violation: {}", e);
    }
}

/// Non-panicking variant of `validate_invariants`.
pub fn try_validate_invariants(state: &IcdState) -> Result<()> {
    check_version_range(state)?;
    check_negotiated_version(state)?;
    check_negotiate_path(state)?;
    check_icd_wsi(state)?;
    check_unique_handles(state)?;
    check_call_sequence(state)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

fn check_version_range(state: &IcdState) -> Result<()> {
    let range = state.record.range;
    if range.min() > range.max() || range.max() > range.ceiling() {
        return Err(IcdError::invariant(
            "version_range",
            format!(
                "min={} max={} ceiling={} violates min <= max <= ceiling",
                range.min(),
                range.max(),
                range.ceiling()
            ),
        ));
    }
    Ok(())
}

/// negotiated_version is meaningful only while the outcome is Supported.
fn check_negotiated_version(state: &IcdState) -> Result<()> {
    let r = &state.record;
    match r.version_outcome {
        VersionOutcome::Supported => {
            if !r.range.contains(r.negotiated_version) {
                return Err(IcdError::invariant(
                    "negotiated_version",
                    format!(
                        "negotiated version {} outside [{}, {}]",
                        r.negotiated_version,
                        r.range.min(),
                        r.range.max()
                    ),
                ));
            }
        }
        outcome => {
            if r.negotiated_version != 0 {
                return Err(IcdError::invariant(
                    "negotiated_version",
                    format!(
                        "negotiated version {} set while outcome is {}",
                        r.negotiated_version, outcome
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_negotiate_path(state: &IcdState) -> Result<()> {
    let r = &state.record;
    let path_set = r.negotiate_path != NegotiatePath::NotCalled;
    let outcome_set = r.version_outcome != VersionOutcome::NotCalled;
    if path_set != outcome_set {
        return Err(IcdError::invariant(
            "negotiate_path",
            format!("{} recorded alongside {}", r.negotiate_path, r.version_outcome),
        ));
    }
    if r.negotiate_path == NegotiatePath::GetInstanceProcAddrFirst
        && r.discovery_path == DiscoveryPath::NotCalled
    {
        return Err(IcdError::invariant(
            "negotiate_path",
            "proc-address-first negotiation without a recorded discovery",
        ));
    }
    Ok(())
}

fn check_icd_wsi(state: &IcdState) -> Result<()> {
    if state.is_using_icd_wsi && !state.config.enable_icd_wsi {
        return Err(IcdError::invariant(
            "icd_wsi",
            "driver-side WSI in use but enable_icd_wsi is false",
        ));
    }
    Ok(())
}

fn check_unique_handles(state: &IcdState) -> Result<()> {
    let mut seen = BTreeSet::new();
    for handle in state.live_handles() {
        if !seen.insert(handle.raw) {
            return Err(IcdError::invariant(
                "unique_handles",
                format!("handle value {:#x} is live more than once", handle.raw),
            ));
        }
    }
    Ok(())
}

fn check_call_sequence(state: &IcdState) -> Result<()> {
    for (i, env) in state.call_log.iter().enumerate() {
        let expected = i as u64 + 1;
        if env.sequence != expected {
            return Err(IcdError::invariant(
                "sequence",
                format!("call log entry {} has sequence {}", expected, env.sequence),
            ));
        }
    }
    Ok(())
}
