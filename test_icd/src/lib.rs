#![forbid(unsafe_code)]

//! Mock installable client driver.
//!
//! Records how a loader discovered the driver's entry points, which
//! negotiation sequence it followed and what interface version the two
//! sides agreed on, so tests can assert on loader behaviour across
//! version-skew scenarios.

pub mod version;
pub mod error;
pub mod handles;
pub mod record;
pub mod domain;
pub mod calls;
pub mod state;
pub mod entry_points;
pub mod transitions;
pub mod invariants;
pub mod hashing;
pub mod engine;
pub mod builder;

pub use builder::TestIcdBuilder;
pub use engine::TestIcd;
pub use record::{DiscoveryPath, NegotiatePath, NegotiationRecord, VersionOutcome};
