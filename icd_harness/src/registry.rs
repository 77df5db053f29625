//! Driver registry: the process-wide set of mock drivers a loader test sees.
//!
//! Each registered driver gets its own handle namespace (`index + 1`), so
//! handles never collide across drivers without any global counter.
//!
//! Lifecycle:
//!   1. a test calls `reset_test_icds()` (or builds its own `IcdRegistry`)
//!   2. registers drivers with `add_icd`
//!   3. lets the loader under test drive them
//!   4. asserts on each driver's record
//!
//! The shared registry is only locked for the duration of one access; it is
//! not meant for concurrent loader simulations.

use std::sync::{Mutex, MutexGuard, OnceLock};

use test_icd::{TestIcd, TestIcdBuilder};

use crate::error::{HarnessError, Result};

/// An isolated set of drivers. Dropping or resetting it discards every
/// driver and every handle they allocated.
#[derive(Debug, Default)]
pub struct IcdRegistry {
    drivers: Vec<TestIcd>,
}

impl IcdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register a driver. Returns its index.
    pub fn add_icd(&mut self, builder: TestIcdBuilder) -> Result<usize> {
        let index = self.drivers.len();
        let namespace = namespace_for(index)?;
        let icd = builder.namespace(namespace).build()?;
        tracing::debug!(index, namespace, "test ICD registered");
        self.drivers.push(icd);
        Ok(index)
    }

    pub fn get_test_icd(&self, index: usize) -> Result<&TestIcd> {
        self.drivers.get(index).ok_or(HarnessError::NoSuchDriver(index))
    }

    pub fn get_test_icd_mut(&mut self, index: usize) -> Result<&mut TestIcd> {
        self.drivers
            .get_mut(index)
            .ok_or(HarnessError::NoSuchDriver(index))
    }

    pub fn drivers(&self) -> &[TestIcd] {
        &self.drivers
    }

    pub fn drivers_mut(&mut self) -> &mut [TestIcd] {
        &mut self.drivers
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Discard all drivers. Namespaces start again at 1.
    pub fn reset(&mut self) {
        tracing::debug!(dropped = self.drivers.len(), "test ICD registry reset");
        self.drivers.clear();
    }
}

/// Thread-safe registry handle using Mutex.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    inner: Mutex<IcdRegistry>,
}

impl SharedRegistry {
    pub fn new(registry: IcdRegistry) -> Self {
        Self {
            inner: Mutex::new(registry),
        }
    }

    /// Lock the registry. A test that panicked while holding the lock (for
    /// instance on a deliberate invariant violation) does not poison it for
    /// the next test.
    pub fn lock(&self) -> MutexGuard<'_, IcdRegistry> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_icd(&self, builder: TestIcdBuilder) -> Result<usize> {
        self.lock().add_icd(builder)
    }

    /// Run `f` against one driver under lock.
    pub fn with_test_icd<R>(
        &self,
        index: usize,
        f: impl FnOnce(&mut TestIcd) -> R,
    ) -> Result<R> {
        let mut registry = self.lock();
        let icd = registry.get_test_icd_mut(index)?;
        Ok(f(icd))
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Handle namespace of the driver at `index`. Namespace 0 is left to
/// drivers built outside a registry.
fn namespace_for(index: usize) -> Result<u32> {
    index
        .checked_add(1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(HarnessError::TooManyDrivers(index))
}

/// The process-wide registry. Created empty on first use.
pub fn shared_registry() -> &'static SharedRegistry {
    static REGISTRY: OnceLock<SharedRegistry> = OnceLock::new();
    REGISTRY.get_or_init(SharedRegistry::default)
}

/// Per-test reset point for the process-wide registry.
pub fn reset_test_icds() {
    shared_registry().reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_icd::VersionOutcome;

    #[test]
    fn namespaces_follow_registration_order() {
        let mut registry = IcdRegistry::new();
        let a = registry.add_icd(TestIcdBuilder::new()).unwrap();
        let b = registry.add_icd(TestIcdBuilder::new()).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(registry.get_test_icd(1).unwrap().state().handles.namespace(), 2);
    }

    #[test]
    fn namespace_space_is_bounded() {
        assert_eq!(namespace_for(0).unwrap(), 1);
        let last = u32::MAX as usize - 1;
        assert_eq!(namespace_for(last).unwrap(), u32::MAX);
        assert!(matches!(
            namespace_for(last + 1),
            Err(HarnessError::TooManyDrivers(i)) if i == last + 1
        ));
    }

    #[test]
    fn reset_discards_drivers() {
        let mut registry = IcdRegistry::new();
        registry.add_icd(TestIcdBuilder::new()).unwrap();
        registry.reset();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get_test_icd(0),
            Err(HarnessError::NoSuchDriver(0))
        ));
    }

    #[test]
    fn invalid_builder_is_not_registered() {
        let mut registry = IcdRegistry::new();
        let err = registry
            .add_icd(TestIcdBuilder::new().min_icd_interface_version(9))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Icd(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_access_mutates_in_place() {
        let shared = SharedRegistry::default();
        let index = shared.add_icd(TestIcdBuilder::new()).unwrap();
        let outcome = shared.with_test_icd(index, |icd| icd.negotiate(3)).unwrap();
        assert_eq!(outcome, VersionOutcome::Supported);
        let recorded = shared
            .with_test_icd(index, |icd| icd.record().negotiated_version)
            .unwrap();
        assert_eq!(recorded, 3);
    }
}
