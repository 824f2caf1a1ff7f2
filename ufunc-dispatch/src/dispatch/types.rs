//! Core type definitions for dispatch resolution.

use std::fmt;
use std::sync::Arc;

use crate::dtype::DType;
use crate::error::DispatchResult;
use crate::operation::Operation;
use crate::signature::{Signature, Slot, TypeVector};

/// An opaque handle to a concrete, directly executable implementation.
///
/// Kernels are compared by identity (`Arc::ptr_eq`); the name is only for
/// diagnostics.
#[derive(Debug)]
pub struct Kernel {
    name: String,
    legacy: bool,
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            legacy: false,
        })
    }

    /// A kernel wrapping a loop known to the legacy resolver.
    pub fn legacy(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            legacy: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }
}

/// The single promoter calling convention.
///
/// Receives the operation (which it may register loops on), the current
/// operand vector and the caller's signature. Returns the refined vector, or
/// `None` when the promoter does not apply.
pub type PromoterFn =
    dyn Fn(&Operation, &TypeVector, &Signature) -> DispatchResult<Option<TypeVector>> + Send + Sync;

/// A callback that refines an operand vector and triggers re-resolution.
#[derive(Clone)]
pub struct Promoter {
    name: Arc<str>,
    func: Arc<PromoterFn>,
}

impl Promoter {
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&Operation, &TypeVector, &Signature) -> DispatchResult<Option<TypeVector>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(
        &self,
        operation: &Operation,
        operands: &TypeVector,
        signature: &Signature,
    ) -> DispatchResult<Option<TypeVector>> {
        (self.func)(operation, operands, signature)
    }
}

impl fmt::Debug for Promoter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Promoter").field(&self.name).finish()
    }
}

/// What a registered loop dispatches to.
#[derive(Debug, Clone)]
pub enum Implementation {
    Kernel(Arc<Kernel>),
    Promoter(Promoter),
}

impl Implementation {
    pub fn is_kernel(&self) -> bool {
        matches!(self, Implementation::Kernel(_))
    }

    pub fn as_kernel(&self) -> Option<&Arc<Kernel>> {
        match self {
            Implementation::Kernel(kernel) => Some(kernel),
            Implementation::Promoter(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Implementation::Kernel(kernel) => kernel.name(),
            Implementation::Promoter(promoter) => promoter.name(),
        }
    }
}

impl From<Arc<Kernel>> for Implementation {
    fn from(kernel: Arc<Kernel>) -> Self {
        Implementation::Kernel(kernel)
    }
}

impl From<Promoter> for Implementation {
    fn from(promoter: Promoter) -> Self {
        Implementation::Promoter(promoter)
    }
}

/// A registered `(tuple, implementation)` pair. Never mutated.
#[derive(Debug)]
pub struct LoopEntry {
    pub(crate) tuple: Box<[Slot]>,
    pub(crate) implementation: Implementation,
}

impl LoopEntry {
    pub fn tuple(&self) -> &[Slot] {
        &self.tuple
    }

    pub fn implementation(&self) -> &Implementation {
        &self.implementation
    }

    pub fn kernel(&self) -> Option<&Arc<Kernel>> {
        self.implementation.as_kernel()
    }
}

/// Casting policy handed to the legacy resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Casting {
    No,
    Equiv,
    Safe,
    SameKind,
    Unsafe,
}

/// A concrete operand value as seen by the legacy resolver.
///
/// Legacy resolution may special-case zero-dimensional operands by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Operand {
    pub dtype: DType,
    pub ndim: usize,
    pub value: Option<f64>,
}

impl Operand {
    pub fn array(dtype: DType, ndim: usize) -> Self {
        Self {
            dtype,
            ndim,
            value: None,
        }
    }

    pub fn scalar(dtype: DType, value: f64) -> Self {
        Self {
            dtype,
            ndim: 0,
            value: Some(value),
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.ndim == 0
    }
}
