//! Replay orchestrator: rebuild a driver from its configuration and a
//! recorded call stream.
//!
//! All dispatch is delegated to the driver; nothing is cached here.

use test_icd::calls::CallEnvelope;
use test_icd::domain::{IcdConfig, IcdState};
use test_icd::hashing::canonical_hash;
use test_icd::TestIcd;

use crate::error::Result;

/// Rebuild the driver state from a sequence of calls.
///
/// 1. Create a fresh driver from `config`
/// 2. Apply each call in order
/// 3. Return (final_state, canonical_hash)
pub fn rebuild_state(
    config: &IcdConfig,
    calls: &[CallEnvelope],
) -> Result<(IcdState, String)> {
    let mut icd = TestIcd::new(config.clone())?;
    icd.apply_sequence(calls);
    let state = icd.state().clone();
    let hash = canonical_hash(&state);
    Ok((state, hash))
}

/// Rebuild state and return only the canonical hash.
pub fn rebuild_hash(config: &IcdConfig, calls: &[CallEnvelope]) -> Result<String> {
    let (_, hash) = rebuild_state(config, calls)?;
    Ok(hash)
}
