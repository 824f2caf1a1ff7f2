//! Loop registration.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::dtype::DType;
use crate::error::{DispatchError, DispatchResult};
use crate::operation::Operation;
use crate::signature::{display_tuple, Slot};

use super::types::{Implementation, Kernel, LoopEntry};

/// The ordered loops of one operation.
///
/// Append-only: entries are never removed or replaced. Readers take a short
/// read lock; promoters may register while a call is in flight because the
/// lock is never held across a promoter call.
#[derive(Debug, Default)]
pub struct LoopRegistry {
    entries: RwLock<Vec<Arc<LoopEntry>>>,
}

impl LoopRegistry {
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// A point-in-time copy of the registered entries.
    pub fn snapshot(&self) -> Vec<Arc<LoopEntry>> {
        self.entries.read().clone()
    }

    pub(crate) fn has_kernels(&self) -> bool {
        self.entries
            .read()
            .iter()
            .any(|entry| entry.implementation.is_kernel())
    }

    /// Run `f` over the entries under the read lock.
    pub(crate) fn with_entries<R>(&self, f: impl FnOnce(&[Arc<LoopEntry>]) -> R) -> R {
        f(&self.entries.read())
    }

    /// Append `entry` unless an entry with the same tuple exists, in which
    /// case the existing entry is returned as the error.
    fn insert(&self, entry: LoopEntry) -> Result<Arc<LoopEntry>, Arc<LoopEntry>> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter().find(|e| e.tuple == entry.tuple) {
            return Err(Arc::clone(existing));
        }
        let entry = Arc::new(entry);
        entries.push(Arc::clone(&entry));
        Ok(entry)
    }
}

impl Operation {
    /// Register a loop or promoter for `tuple`.
    ///
    /// Duplicates are detected by exact slot identity. With
    /// `ignore_duplicate` a duplicate is a silent no-op; otherwise it is a
    /// `DuplicateLoop` error.
    pub fn register(
        &self,
        tuple: &[Slot],
        implementation: impl Into<Implementation>,
        ignore_duplicate: bool,
    ) -> DispatchResult<()> {
        self.register_entry(tuple, implementation.into(), ignore_duplicate)
            .map(|_| ())
    }

    fn register_entry(
        &self,
        tuple: &[Slot],
        implementation: Implementation,
        ignore_duplicate: bool,
    ) -> DispatchResult<Arc<LoopEntry>> {
        self.validate_tuple(tuple)?;

        let entry = LoopEntry {
            tuple: tuple.into(),
            implementation,
        };
        match self.loops.insert(entry) {
            Ok(entry) => {
                debug!(
                    operation = %self.name,
                    tuple = %display_tuple(&entry.tuple, &self.dtypes),
                    implementation = entry.implementation.name(),
                    "registered loop"
                );
                Ok(entry)
            }
            Err(existing) if ignore_duplicate => Ok(existing),
            Err(existing) => Err(DispatchError::DuplicateLoop {
                operation: self.name.clone(),
                tuple: display_tuple(&existing.tuple, &self.dtypes).to_string(),
            }),
        }
    }

    fn validate_tuple(&self, tuple: &[Slot]) -> DispatchResult<()> {
        let malformed = |reason: String| DispatchError::MalformedRegistration {
            operation: self.name.clone(),
            reason,
        };
        if self.nargs() == 0 {
            return Err(malformed("operation has no operands to dispatch on".to_string()));
        }
        if tuple.len() != self.nargs() {
            return Err(malformed(format!(
                "dtype tuple has {} entries but the operation has {} operands",
                tuple.len(),
                self.nargs()
            )));
        }
        for (i, slot) in tuple.iter().enumerate() {
            if let Slot::Fixed(dtype) = slot {
                if !self.dtypes.contains(*dtype) {
                    return Err(malformed(format!(
                        "slot {i} holds a dtype from a different table"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Wrap a loop known to the legacy resolver and register it.
    ///
    /// Returns the registered entry, or the existing one when a duplicate is
    /// ignored.
    pub fn add_legacy_wrapping_loop(
        &self,
        dtypes: &[DType],
        ignore_duplicate: bool,
    ) -> DispatchResult<Arc<LoopEntry>> {
        let tuple: Vec<Slot> = dtypes.iter().copied().map(Slot::Fixed).collect();
        if let Some(i) = dtypes.iter().position(|d| self.dtypes.is_abstract(*d)) {
            return Err(DispatchError::MalformedRegistration {
                operation: self.name.clone(),
                reason: format!("legacy loops must be concrete, slot {i} is abstract"),
            });
        }
        let names: Vec<&str> = dtypes.iter().map(|d| self.dtypes.name(*d)).collect();
        let kernel = Kernel::legacy(format!("{}_legacy_{}", self.name, names.join("_")));
        self.register_entry(&tuple, Implementation::Kernel(kernel), ignore_duplicate)
    }

    /// All registered loops, in registration order.
    pub fn loops(&self) -> Vec<Arc<LoopEntry>> {
        self.loops.snapshot()
    }

    /// Whether at least one concrete kernel is registered.
    pub fn has_kernels(&self) -> bool {
        self.loops.has_kernels()
    }
}
