//! Dispatch and promotion errors.
//!
//! Tuples and operand vectors are rendered to text when an error is built,
//! so errors stay meaningful without the classifier table at hand.

use thiserror::Error;

use crate::dispatch::LegacyError;

/// Result alias used across the dispatch engine.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised while registering loops or resolving a call.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed loop registration for `{operation}`: {reason}")]
    MalformedRegistration { operation: String, reason: String },

    #[error("a loop/promoter has already been registered with `{operation}` for {tuple}")]
    DuplicateLoop { operation: String, tuple: String },

    #[error(
        "could not find a loop for `{operation}` with inputs {given}: \
         {first} and {second} matched equally well; \
         promoters must be designed to be unambiguous"
    )]
    AmbiguousPromotion {
        operation: String,
        given: String,
        first: String,
        second: String,
    },

    #[error(
        "deciding which one of two abstract dtypes is a better match is not \
         supported ({first} vs {second} in `{operation}`)"
    )]
    UnsupportedAbstractComparison {
        operation: String,
        first: String,
        second: String,
    },

    #[error("promoter `{promoter}` for `{operation}` returned an invalid vector: {reason}")]
    InvalidPromotion {
        operation: String,
        promoter: String,
        reason: String,
    },

    #[error("promotion for `{operation}` exceeded the recursion limit of {limit}")]
    RecursionLimitExceeded { operation: String, limit: usize },

    #[error("`{operation}` did not contain a loop with signature matching types {given}")]
    NoLoopFound { operation: String, given: String },

    #[error("legacy type resolution failed for `{operation}`")]
    LegacyResolverFailed {
        operation: String,
        #[source]
        source: LegacyError,
    },

    #[error("signature {signature} of `{operation}` cannot be expressed for the legacy resolver")]
    LegacyUnsupportedSignature { operation: String, signature: String },

    #[error("signature {signature} of `{operation}` conflicts with the resolved loop {tuple}")]
    SignatureConflict {
        operation: String,
        signature: String,
        tuple: String,
    },

    #[error("`{operation}` expects {expected} operands but the call supplied {found}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        found: usize,
    },

    #[error("`{operation}` requires a `{kind}` dtype, but none is declared")]
    MissingDType { operation: String, kind: &'static str },
}

impl DispatchError {
    /// Errors that indicate a defect in registered loops or promoters rather
    /// than an unsupported call.
    pub fn is_registration_defect(&self) -> bool {
        matches!(
            self,
            DispatchError::AmbiguousPromotion { .. }
                | DispatchError::UnsupportedAbstractComparison { .. }
                | DispatchError::InvalidPromotion { .. }
                | DispatchError::SignatureConflict { .. }
        )
    }
}
