//! The operation descriptor.
//!
//! An [`Operation`] owns everything dispatch needs for one polymorphic
//! operation: its arity, the classifier table, its registered loops, its
//! dispatch cache and the optional collaborators (join, legacy resolver).
//! Registration, resolution and promotion are implemented as `impl
//! Operation` blocks in the `dispatch` submodules.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::common::CommonDType;
use crate::config::DispatchConfig;
use crate::dispatch::{DispatchCache, LegacyResolver, LoopRegistry};
use crate::dtype::DTypeTable;

bitflags! {
    /// Behavioural hints consumed by the default promoters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperationFlags: u8 {
        /// A binary comparison whose legacy resolver warns when only a
        /// non-boolean output is requested. The homogeneous promoter bails
        /// out in that case so the legacy path can run.
        const BINARY_COMPARISON = 1 << 0;
    }
}

/// A polymorphic operation with `nin` inputs and `nout` outputs.
pub struct Operation {
    /// Name used in diagnostics.
    pub(crate) name: String,
    /// Number of inputs.
    pub(crate) nin: usize,
    /// Number of outputs.
    pub(crate) nout: usize,
    pub(crate) flags: OperationFlags,
    /// The closed classifier set all loops and calls draw from.
    pub(crate) dtypes: Arc<DTypeTable>,
    /// Join collaborator for the homogeneous promoter.
    pub(crate) common: Option<Arc<dyn CommonDType>>,
    /// Value-dependent fallback resolver.
    pub(crate) legacy: Option<Arc<dyn LegacyResolver>>,
    pub(crate) config: DispatchConfig,
    pub(crate) loops: LoopRegistry,
    pub(crate) cache: DispatchCache,
}

impl Operation {
    /// Create an operation with no loops and no collaborators.
    pub fn new(name: impl Into<String>, nin: usize, nout: usize, dtypes: Arc<DTypeTable>) -> Self {
        Self {
            name: name.into(),
            nin,
            nout,
            flags: OperationFlags::empty(),
            dtypes,
            common: None,
            legacy: None,
            config: DispatchConfig::default(),
            loops: LoopRegistry::default(),
            cache: DispatchCache::default(),
        }
    }

    pub fn with_flags(mut self, flags: OperationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_common_dtype(mut self, common: Arc<dyn CommonDType>) -> Self {
        self.common = Some(common);
        self
    }

    pub fn with_legacy_resolver(mut self, legacy: Arc<dyn LegacyResolver>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nin(&self) -> usize {
        self.nin
    }

    pub fn nout(&self) -> usize {
        self.nout
    }

    /// Total operand count, `nin + nout`.
    pub fn nargs(&self) -> usize {
        self.nin + self.nout
    }

    pub fn flags(&self) -> OperationFlags {
        self.flags
    }

    pub fn dtypes(&self) -> &DTypeTable {
        &self.dtypes
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn has_legacy_resolver(&self) -> bool {
        self.legacy.is_some()
    }

    /// Number of memoized operand vectors.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("nin", &self.nin)
            .field("nout", &self.nout)
            .field("flags", &self.flags)
            .field("loops", &self.loops.len())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}
