//! Memoization of resolved kernels by operand vector.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::signature::TypeVector;

use super::types::LoopEntry;

/// Maps the original operand vector of a call to the kernel entry it
/// resolved to.
///
/// Entries are never evicted or replaced. Only kernel entries are stored;
/// callers must not insert results the legacy path marked non-cacheable.
///
/// The key is the operand vector alone. Which signature slots the caller
/// fixed is not part of it, so a hit may name a loop that contradicts the
/// current signature; the orchestrator treats such a hit as a miss.
#[derive(Debug, Default)]
pub struct DispatchCache {
    entries: RwLock<FxHashMap<TypeVector, Arc<LoopEntry>>>,
}

impl DispatchCache {
    pub fn get(&self, key: &TypeVector) -> Option<Arc<LoopEntry>> {
        self.entries.read().get(key).cloned()
    }

    /// Insert if absent and return the stored entry.
    ///
    /// A concurrent caller may have stored the same key first; resolution is
    /// deterministic, so the first stored value wins and is returned.
    pub fn insert(&self, key: TypeVector, entry: Arc<LoopEntry>) -> Arc<LoopEntry> {
        debug_assert!(entry.implementation.is_kernel());
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(key).or_insert(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
