//! Test ICD - Driver Instance
//!
//! Stateful wrapper around the pure dispatch layer. Enforces call ordering,
//! validates invariants after every call, and keeps the call log.

use crate::calls::{CallEnvelope, LoaderCall};
use crate::domain::{CallOutcome, IcdConfig, IcdState, InstanceCreateInfo, PhysicalDeviceState};
use crate::error::{IcdError, Result};
use crate::handles::Handle;
use crate::invariants::validate_invariants;
use crate::record::{DiscoveryPath, NegotiationRecord, VersionOutcome};
use crate::state::create_initial_state;
use crate::transitions::apply_call as transition_apply;

/// One simulated driver. Every instance is independent; nothing is shared
/// with other drivers.
#[derive(Debug, Clone)]
pub struct TestIcd {
    state: IcdState,
}

impl TestIcd {
    /// Driver with handle namespace 0.
    pub fn new(config: IcdConfig) -> Result<Self> {
        Self::with_namespace(config, 0)
    }

    pub fn with_namespace(config: IcdConfig, namespace: u32) -> Result<Self> {
        Ok(Self {
            state: create_initial_state(config, namespace)?,
        })
    }

    pub fn state(&self) -> &IcdState {
        &self.state
    }

    pub fn config(&self) -> &IcdConfig {
        &self.state.config
    }

    pub fn record(&self) -> &NegotiationRecord {
        &self.state.record
    }

    pub fn call_log(&self) -> &[CallEnvelope] {
        &self.state.call_log
    }

    pub fn last_sequence(&self) -> u64 {
        self.state.last_sequence()
    }

    /// Apply a single call:
    ///   1. Validate sequence (strictly increasing, no gaps, starting at 1)
    ///   2. Delegate to transitions::apply_call
    ///   3. Append to the call log
    ///   4. Validate invariants on the new state
    ///   5. Store and return
    pub fn apply_call(&mut self, envelope: &CallEnvelope) -> CallOutcome {
        let expected = self.last_sequence() + 1;
        if envelope.sequence != expected {
            panic!(
                "Sequence violation: expected {}, got {}",
                expected, envelope.sequence
            );
        }

        let (mut new_state, outcome) = transition_apply(&self.state, &envelope.call);
        new_state.call_log.push(envelope.clone());
        validate_invariants(&new_state);

        tracing::debug!(
            sequence = envelope.sequence,
            entry_point = envelope.call.entry_point(),
            result = ?outcome.result(),
            "loader call applied"
        );

        self.state = new_state;
        outcome
    }

    /// Apply a call as the next one in the stream.
    pub fn call(&mut self, call: LoaderCall) -> CallOutcome {
        let envelope = CallEnvelope::new(self.last_sequence() + 1, call);
        self.apply_call(&envelope)
    }

    /// Apply an ordered sequence of calls, returning each outcome.
    pub fn apply_sequence(&mut self, calls: &[CallEnvelope]) -> Vec<CallOutcome> {
        calls.iter().map(|c| self.apply_call(c)).collect()
    }

    /// Reset to a fresh driver with the same configuration and namespace,
    /// then apply `calls`.
    pub fn replay(&mut self, calls: &[CallEnvelope]) -> &IcdState {
        let config = self.state.config.clone();
        let namespace = self.state.handles.namespace();
        // The configuration was validated when this driver was built.
        self.state = match create_initial_state(config, namespace) {
            Ok(state) => state,
            Err(e) => panic!("replay: configuration no longer valid: {}", e),
        };
        for call in calls {
            self.apply_call(call);
        }
        &self.state
    }

    // -- Negotiation ------------------------------------------------------

    /// The loader enters `vk_icdNegotiateLoaderICDInterfaceVersion` with
    /// `loader_proposed_version`. Never fails; the outcome carries the
    /// verdict.
    pub fn negotiate(&mut self, loader_proposed_version: u32) -> VersionOutcome {
        self.call(LoaderCall::NegotiateInterfaceVersion {
            proposed_version: loader_proposed_version,
        });
        self.state.record.version_outcome
    }

    /// Record the discovery path directly. Logged like any other call so a
    /// replay reproduces it. Panics if one was already recorded, including
    /// by an earlier proc-address call.
    pub fn record_discovery(&mut self, path: DiscoveryPath) {
        self.call(LoaderCall::RecordDiscovery { path });
    }

    /// Like `record_discovery`, but a rejected path leaves the driver and
    /// its call log untouched.
    pub fn try_record_discovery(&mut self, path: DiscoveryPath) -> Result<()> {
        self.state.record.clone().try_record_discovery(path)?;
        self.call(LoaderCall::RecordDiscovery { path });
        Ok(())
    }

    // -- Lookups ----------------------------------------------------------

    /// Panics when the handle is not one of this driver's physical devices.
    pub fn get_phys_device(&self, physical_device: Handle) -> &PhysicalDeviceState {
        match self.state.find_physical_device(physical_device) {
            Some(p) => p,
            None => panic!("physical device {} not found", physical_device),
        }
    }

    pub fn find_physical_device(&self, physical_device: Handle) -> Result<&PhysicalDeviceState> {
        self.state
            .find_physical_device(physical_device)
            .ok_or(IcdError::UnknownHandle(physical_device))
    }

    pub fn lookup_device(&self, device: Handle) -> crate::domain::FindDevice {
        self.state.lookup_device(device)
    }

    pub fn instance_handle(&self) -> Option<Handle> {
        self.state.instance_handle
    }

    /// Create info enabling every configured layer and instance extension.
    pub fn instance_create_info(&self) -> InstanceCreateInfo {
        InstanceCreateInfo {
            enabled_layers: self
                .state
                .config
                .instance_layers
                .iter()
                .map(|l| l.name.clone())
                .collect(),
            enabled_extensions: self
                .state
                .config
                .instance_extensions
                .iter()
                .map(|e| e.name.clone())
                .collect(),
        }
    }
}
