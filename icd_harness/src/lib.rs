#![forbid(unsafe_code)]

//! Test-side collaborators for the mock ICD.
//!
//! Holds the process-wide driver registry, a simulated loader that walks a
//! driver through the startup handshake, replay and comparison helpers, and
//! JSON scenario fixtures. No driver behaviour lives here; everything is
//! delegated to `test_icd`.

pub mod error;
pub mod logging;
pub mod registry;
pub mod loader;
pub mod replay;
pub mod drift;
pub mod scenario;
