//! The common-dtype ("join") collaborator used by the homogeneous promoter.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::dtype::DType;

/// Failure to find a common dtype. Treated as "not applicable" by promoters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no common dtype for {dtypes:?}")]
pub struct JoinError {
    pub dtypes: Vec<DType>,
}

/// Computes the common supertype of a sequence of classifiers.
pub trait CommonDType: Send + Sync {
    fn common_dtype(&self, dtypes: &[DType]) -> Result<DType, JoinError>;
}

/// A symmetric pairwise promotion table folded left to right.
///
/// Equal classifiers always join to themselves; any other pair must be
/// declared.
#[derive(Debug, Default, Clone)]
pub struct PromotionTable {
    pairs: FxHashMap<(DType, DType), DType>,
}

impl PromotionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `join(a, b) == join(b, a) == result`.
    pub fn insert(&mut self, a: DType, b: DType, result: DType) -> &mut Self {
        self.pairs.insert((a, b), result);
        self.pairs.insert((b, a), result);
        self
    }

    pub fn join(&self, a: DType, b: DType) -> Option<DType> {
        if a == b {
            return Some(a);
        }
        self.pairs.get(&(a, b)).copied()
    }
}

impl CommonDType for PromotionTable {
    fn common_dtype(&self, dtypes: &[DType]) -> Result<DType, JoinError> {
        let fail = || JoinError {
            dtypes: dtypes.to_vec(),
        };
        let (first, rest) = dtypes.split_first().ok_or_else(fail)?;
        rest.iter()
            .try_fold(*first, |acc, next| self.join(acc, *next))
            .ok_or_else(fail)
    }
}
