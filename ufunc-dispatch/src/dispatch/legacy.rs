//! Bridge to the value-dependent legacy type resolver.
//!
//! The legacy resolver sees actual operand values (so it can special-case
//! scalars) and always wins: signature slots that disagree with its answer
//! are overwritten. Because its answer may depend on values rather than
//! types, any such override makes the result non-cacheable.

use thiserror::Error;
use tracing::{debug, warn};

use crate::dtype::DType;
use crate::error::{DispatchError, DispatchResult};
use crate::operation::Operation;
use crate::signature::{Signature, TypeVector};

use super::types::{Casting, Operand};

/// Failure reported by a legacy resolver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LegacyError(pub String);

impl LegacyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An external, possibly value-dependent type resolver.
///
/// `type_tuple` is the signature in legacy form, or `None` when the caller
/// fixed nothing. The answer holds one classifier per operand.
pub trait LegacyResolver: Send + Sync {
    fn resolve(
        &self,
        type_tuple: Option<&[Option<DType>]>,
        operands: &[Option<Operand>],
        casting: Casting,
    ) -> Result<Vec<DType>, LegacyError>;
}

impl<F> LegacyResolver for F
where
    F: Fn(Option<&[Option<DType>]>, &[Option<Operand>], Casting) -> Result<Vec<DType>, LegacyError>
        + Send
        + Sync,
{
    fn resolve(
        &self,
        type_tuple: Option<&[Option<DType>]>,
        operands: &[Option<Operand>],
        casting: Casting,
    ) -> Result<Vec<DType>, LegacyError> {
        self(type_tuple, operands, casting)
    }
}

/// Result of one legacy resolution.
#[derive(Debug, Clone)]
pub(crate) struct LegacyPromotion {
    pub(crate) operands: TypeVector,
    pub(crate) cacheable: bool,
}

impl Operation {
    /// Convert the signature into the type tuple understood by the legacy
    /// resolver. Abstract or non-legacy classifiers cannot be expressed.
    pub(crate) fn legacy_type_tuple(
        &self,
        signature: &Signature,
    ) -> DispatchResult<Option<Vec<Option<DType>>>> {
        if signature.is_unconstrained() {
            return Ok(None);
        }
        for dtype in signature.iter().flatten() {
            if !self.dtypes.is_legacy(dtype) || self.dtypes.is_abstract(dtype) {
                return Err(DispatchError::LegacyUnsupportedSignature {
                    operation: self.name.clone(),
                    signature: signature.display(&self.dtypes).to_string(),
                });
            }
        }
        Ok(Some(signature.as_slice().to_vec()))
    }

    /// Ask the legacy resolver for the operation dtypes.
    ///
    /// Overwrites disagreeing signature slots and reports whether the result
    /// may be cached.
    pub(crate) fn legacy_promote(
        &self,
        operands: &[Option<Operand>],
        signature: &mut Signature,
    ) -> DispatchResult<LegacyPromotion> {
        let failed = |source: LegacyError| DispatchError::LegacyResolverFailed {
            operation: self.name.clone(),
            source,
        };
        let Some(resolver) = self.legacy.as_deref() else {
            return Err(failed(LegacyError::new("operation has no legacy type resolver")));
        };

        let type_tuple = self.legacy_type_tuple(signature)?;
        // Casting safety does not matter for choosing a loop; the real casts
        // are checked later by the caller.
        let answer = resolver
            .resolve(type_tuple.as_deref(), operands, Casting::Unsafe)
            .map_err(failed)?;

        if answer.len() != self.nargs() {
            return Err(failed(LegacyError::new(format!(
                "legacy resolver returned {} dtypes for {} operands",
                answer.len(),
                self.nargs()
            ))));
        }
        if let Some(foreign) = answer.iter().find(|d| !self.dtypes.contains(**d)) {
            return Err(failed(LegacyError::new(format!(
                "legacy resolver returned unknown dtype {foreign:?}"
            ))));
        }

        let mut cacheable = true;
        for (i, dtype) in answer.iter().enumerate() {
            if signature[i].is_some_and(|fixed| fixed != *dtype) {
                signature.set(i, Some(*dtype));
                cacheable = false;
            }
        }
        if !cacheable {
            warn!(
                operation = %self.name,
                signature = %signature.display(&self.dtypes),
                "legacy resolver overrode the signature; result will not be cached"
            );
        }

        let operands = TypeVector::of(&answer);
        debug!(
            operation = %self.name,
            resolved = %operands.display(&self.dtypes),
            cacheable,
            "legacy promotion"
        );
        Ok(LegacyPromotion {
            operands,
            cacheable,
        })
    }
}
