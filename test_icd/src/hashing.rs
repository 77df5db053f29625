//! Test ICD - Canonical Hashing
//!
//! Deterministic canonical serialization + SHA-256 of what a driver observed.
//!
//! Rules:
//!   - Fixed top-level field order
//!   - Handles as raw integers, physical devices in configuration order
//!   - Call log reduced to (sequence, entry point) pairs
//!   - UTF-8 JSON, no whitespace

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::IcdState;
use crate::handles::Handle;

/// Bumped whenever the canonical layout changes.
pub const CANONICAL_FORMAT_VERSION: u32 = 1;

/// Canonical serialization of IcdState to UTF-8 JSON bytes.
pub fn canonical_serialize(state: &IcdState) -> Vec<u8> {
    build_canonical_value(state).to_string().into_bytes()
}

/// SHA-256 of canonical serialization. Lowercase hex string.
pub fn canonical_hash(state: &IcdState) -> String {
    let digest = Sha256::digest(canonical_serialize(state));
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn raw_list(handles: &[Handle]) -> Value {
    Value::Array(handles.iter().map(|h| Value::from(h.raw)).collect())
}

/// Field order: format_version, record, instance, physical_devices,
/// surfaces, swapchains, messengers, flags, calls
fn build_canonical_value(state: &IcdState) -> Value {
    let r = &state.record;

    let mut record = Map::new();
    record.insert("discovery_path".into(), json!(r.discovery_path));
    record.insert("negotiate_path".into(), json!(r.negotiate_path));
    record.insert("version_outcome".into(), json!(r.version_outcome));
    record.insert("min_supported_version".into(), json!(r.range.min()));
    record.insert("max_supported_version".into(), json!(r.range.max()));
    record.insert("negotiated_version".into(), json!(r.negotiated_version));
    record.insert("received_version".into(), json!(r.received_version));

    let physical_devices: Vec<Value> = state
        .physical_devices
        .iter()
        .map(|p| {
            let mut m = Map::new();
            m.insert("name".into(), Value::String(p.config.name.clone()));
            m.insert("handle".into(), Value::from(p.handle.raw));
            m.insert("devices".into(), raw_list(&p.device_handles));
            Value::Object(m)
        })
        .collect();

    let calls: Vec<Value> = state
        .call_log
        .iter()
        .map(|c| json!([c.sequence, c.call.entry_point()]))
        .collect();

    let mut flags = Map::new();
    flags.insert(
        "instance_create_flags".into(),
        json!(state.passed_in_instance_create_flags),
    );
    flags.insert(
        "called_enumerate_adapter_physical_devices".into(),
        json!(state.called_enumerate_adapter_physical_devices),
    );
    flags.insert("is_using_icd_wsi".into(), json!(state.is_using_icd_wsi));

    let mut root = Map::new();
    root.insert("format_version".into(), json!(CANONICAL_FORMAT_VERSION));
    root.insert("record".into(), Value::Object(record));
    root.insert(
        "instance".into(),
        state.instance_handle.map(|h| Value::from(h.raw)).unwrap_or(Value::Null),
    );
    root.insert("physical_devices".into(), Value::Array(physical_devices));
    root.insert("surfaces".into(), raw_list(&state.surface_handles));
    root.insert("swapchains".into(), raw_list(&state.swapchain_handles));
    root.insert("messengers".into(), raw_list(&state.messenger_handles));
    root.insert("flags".into(), Value::Object(flags));
    root.insert("calls".into(), Value::Array(calls));

    Value::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IcdConfig;
    use crate::state::create_initial_state;

    #[test]
    fn hash_is_lowercase_hex_sha256() {
        let s = create_initial_state(IcdConfig::default(), 0).unwrap();
        let h = canonical_hash(&s);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn serialization_starts_with_format_version() {
        let s = create_initial_state(IcdConfig::default(), 0).unwrap();
        let text = String::from_utf8(canonical_serialize(&s)).unwrap();
        assert!(text.starts_with(r#"{"format_version":1,"record":{"discovery_path":"not_called""#));
    }

    #[test]
    fn record_changes_change_hash() {
        let a = create_initial_state(IcdConfig::default(), 0).unwrap();
        let mut b = a.clone();
        b.record.mark_negotiate_entry();
        b.record.negotiate(4);
        assert_ne!(canonical_hash(&a), canonical_hash(&b));
    }

    #[test]
    fn rejected_proposals_hash_apart() {
        let mut a = create_initial_state(IcdConfig::default(), 0).unwrap();
        a.record.mark_negotiate_entry();
        let mut b = a.clone();
        a.record.negotiate(300);
        b.record.negotiate(400);
        assert_eq!(a.record.version_outcome, b.record.version_outcome);
        assert_ne!(canonical_hash(&a), canonical_hash(&b));
    }
}
