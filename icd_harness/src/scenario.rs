//! JSON scenario fixtures: a driver configuration, the loader's calls, and
//! what the driver should have recorded afterwards.
//!
//! A fixture file holds an array of scenarios. A scenario may start with a
//! simulated loader startup (`loader`); its explicit `calls` follow, and are
//! only issued when that loader accepted the driver. Explicit calls are
//! numbered from 1 in the fixture and shifted past the startup calls.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use test_icd::calls::CallEnvelope;
use test_icd::domain::IcdConfig;
use test_icd::hashing::canonical_hash;
use test_icd::TestIcd;

use crate::drift::{compare_records, ExpectedRecord, RecordDiff};
use crate::error::{HarnessError, Result};
use crate::loader::{run_startup, LoaderProfile, StartupReport};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub config: IcdConfig,
    #[serde(default)]
    pub loader: Option<LoaderProfile>,
    #[serde(default)]
    pub calls: Vec<CallEnvelope>,
    pub expect: ExpectedRecord,
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub hash: String,
    pub diff: RecordDiff,
    /// Present when the scenario ran a simulated loader startup.
    pub startup: Option<StartupReport>,
    /// Explicit calls actually issued.
    pub calls_applied: usize,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.diff.is_empty()
    }
}

impl Scenario {
    /// Explicit calls must be numbered 1..=n in fixture order.
    pub fn validate(&self) -> Result<()> {
        for (i, env) in self.calls.iter().enumerate() {
            let expected = i as u64 + 1;
            if env.sequence != expected {
                return Err(HarnessError::Scenario {
                    name: self.name.clone(),
                    reason: format!(
                        "call {} has sequence {}, expected {}",
                        i, env.sequence, expected
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn run(&self) -> Result<ScenarioReport> {
        self.validate()?;
        let mut icd = TestIcd::new(self.config.clone())?;

        let startup = self.loader.as_ref().map(|profile| run_startup(&mut icd, profile));
        let accepted = startup.map_or(true, |report| report.accepted);

        let mut calls_applied = 0;
        if accepted {
            for env in &self.calls {
                icd.call(env.call.clone());
                calls_applied += 1;
            }
        } else if !self.calls.is_empty() {
            tracing::debug!(
                scenario = %self.name,
                skipped = self.calls.len(),
                "loader rejected the driver; explicit calls not issued"
            );
        }

        let diff = compare_records(&self.expect, icd.record());
        let report = ScenarioReport {
            name: self.name.clone(),
            hash: canonical_hash(icd.state()),
            diff,
            startup,
            calls_applied,
        };
        if report.passed() {
            tracing::debug!(scenario = %self.name, "scenario passed");
        } else {
            tracing::warn!(scenario = %self.name, diff = %report.diff.describe(), "scenario failed");
        }
        Ok(report)
    }
}

/// Load every scenario in a fixture file.
pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>> {
    let data = fs::read_to_string(path).map_err(|source| HarnessError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let scenarios: Vec<Scenario> =
        serde_json::from_str(&data).map_err(|source| HarnessError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let mut names = std::collections::BTreeSet::new();
    for s in &scenarios {
        s.validate()?;
        if !names.insert(s.name.as_str()) {
            return Err(HarnessError::Scenario {
                name: s.name.clone(),
                reason: "duplicate scenario name".to_string(),
            });
        }
    }
    Ok(scenarios)
}

/// Run every scenario in a fixture file, stopping at the first one that
/// cannot be run at all.
pub fn run_scenarios(path: &Path) -> Result<Vec<ScenarioReport>> {
    load_scenarios(path)?.iter().map(Scenario::run).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_icd::calls::{sequence_calls, LoaderCall};
    use test_icd::{DiscoveryPath, VersionOutcome};

    use crate::loader::StartupOrder;

    #[test]
    fn loader_startup_precedes_explicit_calls() {
        let scenario: Scenario = serde_json::from_value(serde_json::json!({
            "name": "startup then instance",
            "loader": { "interface_version": 6, "startup": "negotiate_first" },
            "calls": [ { "sequence": 1, "call": "create_instance" } ],
            "expect": { "version_outcome": "supported", "negotiated_version": 6 }
        }))
        .unwrap();

        let report = scenario.run().unwrap();
        assert!(report.passed(), "{}", report.diff.describe());
        assert_eq!(report.calls_applied, 1);
        assert!(report.startup.unwrap().accepted);
    }

    #[test]
    fn rejected_driver_matches_direct_startup() {
        let config = IcdConfig {
            max_icd_interface_version: 4,
            interface_version_ceiling: 6,
            ..IcdConfig::default()
        };
        let profile = LoaderProfile::new(StartupOrder::NegotiateFirst).with_interface_version(7);
        let scenario = Scenario {
            name: "ceiling".to_string(),
            config: config.clone(),
            loader: Some(profile),
            calls: sequence_calls(vec![LoaderCall::CreateInstance {
                flags: 0,
                enabled_extensions: Vec::new(),
            }]),
            expect: ExpectedRecord {
                discovery_path: Some(DiscoveryPath::NotCalled),
                version_outcome: Some(VersionOutcome::LoaderTooNew),
                received_version: Some(7),
                ..ExpectedRecord::default()
            },
        };
        let report = scenario.run().unwrap();
        assert!(report.passed(), "{}", report.diff.describe());
        assert_eq!(report.calls_applied, 0);

        let mut icd = TestIcd::new(config).unwrap();
        let direct = run_startup(&mut icd, &profile);
        assert!(!direct.accepted);
        assert_eq!(report.startup, Some(direct));
        assert_eq!(icd.call_log().len(), 1);
        assert_eq!(report.hash, canonical_hash(icd.state()));
    }

    #[test]
    fn misnumbered_calls_are_rejected() {
        let scenario: Scenario = serde_json::from_value(serde_json::json!({
            "name": "gap",
            "calls": [
                { "sequence": 1, "call": "enumerate_instance_version" },
                { "sequence": 3, "call": "enumerate_instance_version" }
            ],
            "expect": {}
        }))
        .unwrap();
        assert!(matches!(
            scenario.run(),
            Err(HarnessError::Scenario { ref name, .. }) if name == "gap"
        ));
    }

    #[test]
    fn failing_expectation_is_reported_not_raised() {
        let scenario = Scenario {
            name: "wrong".to_string(),
            config: IcdConfig::default(),
            loader: None,
            calls: sequence_calls(vec![LoaderCall::NegotiateInterfaceVersion {
                proposed_version: 3,
            }]),
            expect: ExpectedRecord {
                version_outcome: Some(VersionOutcome::LoaderTooOld),
                ..ExpectedRecord::default()
            },
        };
        let report = scenario.run().unwrap();
        assert!(!report.passed());
    }
}
