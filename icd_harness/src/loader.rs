//! Simulated loader startup.
//!
//! Drives a `TestIcd` through one of the call sequences a real loader uses
//! when it first opens a driver, and reports what the loader would conclude.

use serde::{Deserialize, Serialize};

use test_icd::calls::LoaderCall;
use test_icd::domain::{CallOutcome, IcdResult};
use test_icd::entry_points::NEGOTIATE_INTERFACE_VERSION_FUNCTION;
use test_icd::{TestIcd, VersionOutcome};

/// Interface version current loaders propose.
pub const CURRENT_LOADER_ICD_INTERFACE_VERSION: u32 = 7;

/// Version a loader assumes for a driver that exports
/// `vk_icdGetInstanceProcAddr` but never negotiates.
pub const UNNEGOTIATED_ICD_GIPA_INTERFACE_VERSION: u32 = 1;

pub const NEGOTIATE_FUNCTION: &str = NEGOTIATE_INTERFACE_VERSION_FUNCTION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupOrder {
    /// Call the exported negotiate function before anything else.
    NegotiateFirst,
    /// Look the negotiate function up through `vk_icdGetInstanceProcAddr`,
    /// then call it.
    IcdProcAddrFirst,
    /// Pre-negotiation driver: only `vkGetInstanceProcAddr` is used.
    LegacyProcAddrOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderProfile {
    pub interface_version: u32,
    pub startup: StartupOrder,
}

impl LoaderProfile {
    pub fn new(startup: StartupOrder) -> Self {
        Self {
            interface_version: CURRENT_LOADER_ICD_INTERFACE_VERSION,
            startup,
        }
    }

    pub fn with_interface_version(mut self, version: u32) -> Self {
        self.interface_version = version;
        self
    }
}

/// What the loader concluded about the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    pub accepted: bool,
    pub agreed_version: u32,
    pub outcome: VersionOutcome,
}

/// The calls a loader with `profile` issues when opening a driver.
pub fn startup_calls(profile: &LoaderProfile) -> Vec<LoaderCall> {
    let negotiate = LoaderCall::NegotiateInterfaceVersion {
        proposed_version: profile.interface_version,
    };
    match profile.startup {
        StartupOrder::NegotiateFirst => vec![
            negotiate,
            LoaderCall::IcdGetInstanceProcAddr {
                name: "vkCreateInstance".to_string(),
            },
        ],
        StartupOrder::IcdProcAddrFirst => vec![
            LoaderCall::IcdGetInstanceProcAddr {
                name: NEGOTIATE_FUNCTION.to_string(),
            },
            negotiate,
        ],
        StartupOrder::LegacyProcAddrOnly => vec![LoaderCall::GetInstanceProcAddr {
            name: "vkCreateInstance".to_string(),
        }],
    }
}

/// Apply the startup sequence for `profile` to `icd`.
pub fn run_startup(icd: &mut TestIcd, profile: &LoaderProfile) -> StartupReport {
    let mut negotiate_exported = true;
    let mut negotiated: Option<(IcdResult, u32)> = None;

    for call in startup_calls(profile) {
        // A loader only calls negotiate when it found the function.
        if matches!(call, LoaderCall::NegotiateInterfaceVersion { .. }) && !negotiate_exported {
            continue;
        }
        let is_negotiate_lookup = matches!(
            &call,
            LoaderCall::IcdGetInstanceProcAddr { name } if name == NEGOTIATE_FUNCTION
        );
        match icd.call(call) {
            CallOutcome::ProcAddr(found) if is_negotiate_lookup => {
                negotiate_exported = found.is_some();
            }
            CallOutcome::Negotiated {
                result,
                reported_version,
            } => {
                negotiated = Some((result, reported_version));
                // An incompatible driver is dropped before anything else is called.
                if result == IcdResult::ErrorIncompatibleDriver {
                    break;
                }
            }
            _ => {}
        }
    }

    let outcome = icd.record().version_outcome;
    let report = match (profile.startup, negotiated) {
        (_, Some((IcdResult::ErrorIncompatibleDriver, _))) => StartupReport {
            accepted: false,
            agreed_version: 0,
            outcome,
        },
        (_, Some((_, reported))) => StartupReport {
            accepted: true,
            agreed_version: profile.interface_version.min(reported),
            outcome,
        },
        (StartupOrder::LegacyProcAddrOnly, None) => StartupReport {
            accepted: true,
            agreed_version: 0,
            outcome,
        },
        (_, None) => StartupReport {
            accepted: true,
            agreed_version: UNNEGOTIATED_ICD_GIPA_INTERFACE_VERSION,
            outcome,
        },
    };

    tracing::debug!(
        startup = ?profile.startup,
        proposed = profile.interface_version,
        accepted = report.accepted,
        agreed = report.agreed_version,
        outcome = %report.outcome,
        "simulated loader startup finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_icd::{DiscoveryPath, NegotiatePath, TestIcdBuilder};

    #[test]
    fn negotiate_first_profile() {
        let mut icd = TestIcdBuilder::new().build().unwrap();
        let report = run_startup(&mut icd, &LoaderProfile::new(StartupOrder::NegotiateFirst));
        assert!(report.accepted);
        assert_eq!(report.agreed_version, 7);
        assert_eq!(icd.record().negotiate_path, NegotiatePath::ExplicitInterfaceCall);
        assert_eq!(
            icd.record().discovery_path,
            DiscoveryPath::ViaIcdGetInstanceProcAddr
        );
    }

    #[test]
    fn icd_proc_addr_first_profile() {
        let mut icd = TestIcdBuilder::new().max_icd_interface_version(5).build().unwrap();
        let report = run_startup(&mut icd, &LoaderProfile::new(StartupOrder::IcdProcAddrFirst));
        assert!(report.accepted);
        assert_eq!(report.outcome, VersionOutcome::DriverTooNew);
        assert_eq!(report.agreed_version, 5);
        assert_eq!(icd.record().negotiate_path, NegotiatePath::GetInstanceProcAddrFirst);
    }

    #[test]
    fn driver_without_negotiate_export_gets_gipa_version() {
        let mut icd = TestIcdBuilder::new()
            .exports_negotiate_interface_version(false)
            .build()
            .unwrap();
        let report = run_startup(&mut icd, &LoaderProfile::new(StartupOrder::IcdProcAddrFirst));
        assert!(report.accepted);
        assert_eq!(report.agreed_version, UNNEGOTIATED_ICD_GIPA_INTERFACE_VERSION);
        assert_eq!(report.outcome, VersionOutcome::NotCalled);
        assert_eq!(icd.call_log().len(), 1);
        assert_eq!(
            icd.record().discovery_path,
            DiscoveryPath::ViaIcdGetInstanceProcAddr
        );
        assert_eq!(icd.record().negotiate_path, NegotiatePath::NotCalled);
    }

    #[test]
    fn legacy_profile_never_negotiates() {
        let mut icd = TestIcdBuilder::new().build().unwrap();
        let report = run_startup(&mut icd, &LoaderProfile::new(StartupOrder::LegacyProcAddrOnly));
        assert!(report.accepted);
        assert_eq!(report.agreed_version, 0);
        assert_eq!(report.outcome, VersionOutcome::NotCalled);
        assert_eq!(icd.record().discovery_path, DiscoveryPath::ViaGetInstanceProcAddr);
        assert_eq!(icd.record().negotiate_path, NegotiatePath::NotCalled);
    }

    #[test]
    fn old_loader_is_refused() {
        let mut icd = TestIcdBuilder::new().min_icd_interface_version(5).build().unwrap();
        let profile = LoaderProfile::new(StartupOrder::NegotiateFirst).with_interface_version(4);
        let report = run_startup(&mut icd, &profile);
        assert!(!report.accepted);
        assert_eq!(report.outcome, VersionOutcome::LoaderTooOld);
    }
}
