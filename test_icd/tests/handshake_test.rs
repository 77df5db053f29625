//! Handshake scenarios driven through the driver's entry points.

use test_icd::calls::LoaderCall;
use test_icd::record::NegotiationState;
use test_icd::{DiscoveryPath, NegotiatePath, TestIcd, TestIcdBuilder, VersionOutcome};

fn driver(min: u32, max: u32) -> TestIcd {
    TestIcdBuilder::new()
        .min_icd_interface_version(min)
        .max_icd_interface_version(max)
        .build()
        .expect("valid range")
}

#[test]
fn supported_proposal_is_negotiated() {
    let mut icd = driver(0, 7);
    assert_eq!(icd.negotiate(5), VersionOutcome::Supported);
    assert_eq!(icd.record().negotiated_version, 5);
}

#[test]
fn old_loader_is_rejected() {
    let mut icd = driver(2, 7);
    assert_eq!(icd.negotiate(1), VersionOutcome::LoaderTooOld);
    assert_eq!(icd.record().negotiated_version, 0);
    assert_eq!(icd.record().received_version, 1);
}

#[test]
fn newer_loader_than_driver_range() {
    let mut icd = driver(0, 3);
    assert_eq!(icd.negotiate(9), VersionOutcome::DriverTooNew);
}

#[test]
fn loader_beyond_driver_ceiling() {
    let mut icd = TestIcdBuilder::new()
        .max_icd_interface_version(3)
        .interface_version_ceiling(8)
        .build()
        .unwrap();
    assert_eq!(icd.negotiate(8), VersionOutcome::DriverTooNew);
    assert_eq!(icd.negotiate(9), VersionOutcome::LoaderTooNew);
    assert_eq!(icd.record().received_version, 9);
}

#[test]
fn lookup_then_negotiate_is_gipa_first() {
    let mut icd = driver(0, 7);
    icd.record_discovery(DiscoveryPath::ViaGetInstanceProcAddr);
    assert_eq!(icd.record().state(), NegotiationState::DiscoveryRecorded);
    icd.negotiate(7);
    assert_eq!(icd.record().negotiate_path, NegotiatePath::GetInstanceProcAddrFirst);
    assert_eq!(icd.record().state(), NegotiationState::Finalized);
}

#[test]
#[should_panic(expected = "[INVARIANT:discovery_set_once]")]
fn recording_discovery_twice_is_fatal() {
    let mut icd = driver(0, 7);
    icd.record_discovery(DiscoveryPath::ViaGetInstanceProcAddr);
    icd.negotiate(7);
    icd.record_discovery(DiscoveryPath::ViaGetInstanceProcAddr);
}

#[test]
fn icd_gipa_lookup_then_negotiate() {
    let mut icd = driver(0, 7);
    icd.call(LoaderCall::IcdGetInstanceProcAddr {
        name: "vk_icdNegotiateLoaderICDInterfaceVersion".into(),
    });
    icd.negotiate(6);
    let r = icd.record();
    assert_eq!(r.discovery_path, DiscoveryPath::ViaIcdGetInstanceProcAddr);
    assert_eq!(r.negotiate_path, NegotiatePath::GetInstanceProcAddrFirst);
    assert_eq!(r.negotiated_version, 6);
}

#[test]
fn drivers_do_not_share_state() {
    let mut a = driver(0, 7);
    let b = driver(0, 7);
    a.negotiate(4);
    assert_eq!(b.record().version_outcome, VersionOutcome::NotCalled);
    assert!(b.call_log().is_empty());
}
