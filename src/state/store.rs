//! Latest-value store for probe results.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::models::ProbeResult;

/// Thread-safe mapping from target host to its most recent probe result.
///
/// Entries are replaced whole, so a reader never sees a result that is half
/// from one cycle and half from another. Nothing is accumulated across
/// cycles.
#[derive(Debug, Default)]
pub struct MetricState {
    entries: RwLock<BTreeMap<String, ProbeResult>>,
}

impl MetricState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the result's host.
    pub fn update(&self, result: ProbeResult) {
        self.write().insert(result.host.clone(), result);
    }

    /// Copy of every current entry, ordered by host.
    pub fn snapshot(&self) -> BTreeMap<String, ProbeResult> {
        self.read().clone()
    }

    pub fn get(&self, host: &str) -> Option<ProbeResult> {
        self.read().get(host).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    // A writer that panicked mid-insert cannot leave a torn entry behind, so
    // the map stays usable after poisoning.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ProbeResult>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ProbeResult>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
