//! Multiple-dispatch matching and specificity.
//!
//! # Algorithm Overview
//!
//! 1. **Filter applicable**: a loop matches when every slot accepts the
//!    corresponding operand (wildcards, identity, or subclass of an abstract
//!    slot; unset outputs always match).
//! 2. **Keep the best**: each new match is compared against the current best
//!    slot by slot. Inputs decide first; outputs only break ties.
//! 3. **Disambiguate**: if two matches cannot be ordered, the whole pass is
//!    redone over promoters only. Promoters must be designed so that this
//!    second pass has a unique winner.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::operation::Operation;
use crate::signature::{display_tuple, Slot, TypeVector};

use super::types::LoopEntry;

/// Outcome of one resolver run.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A unique best loop or promoter.
    Found(Arc<LoopEntry>),
    /// Nothing matched.
    NoMatch,
    /// Two kernels tied and no promoter matched to break the tie.
    Ambiguous {
        first: Arc<LoopEntry>,
        second: Arc<LoopEntry>,
    },
}

enum Pass {
    Done(Option<Arc<LoopEntry>>),
    Tied(Arc<LoopEntry>, Arc<LoopEntry>),
}

impl Operation {
    /// Find the best registered entry for `given`.
    ///
    /// Fails only for defects that cannot be resolved locally: two abstract
    /// slots that would need ordering, or a tie between promoters.
    pub fn resolve_implementation(&self, given: &TypeVector) -> DispatchResult<Resolution> {
        promotion_trace!(
            self,
            operation = %self.name,
            given = %given.display(&self.dtypes),
            "resolving implementation"
        );
        match self.resolve_pass(given, false)? {
            Pass::Done(Some(entry)) => Ok(Resolution::Found(entry)),
            Pass::Done(None) => Ok(Resolution::NoMatch),
            Pass::Tied(first, second) => {
                debug!(
                    operation = %self.name,
                    first = %display_tuple(&first.tuple, &self.dtypes),
                    second = %display_tuple(&second.tuple, &self.dtypes),
                    "ambiguous loops, retrying with promoters only"
                );
                match self.resolve_pass(given, true)? {
                    Pass::Done(Some(entry)) => Ok(Resolution::Found(entry)),
                    Pass::Done(None) => Ok(Resolution::Ambiguous { first, second }),
                    Pass::Tied(first, second) => Err(self.ambiguity_error(given, &first, &second)),
                }
            }
        }
    }

    fn resolve_pass(&self, given: &TypeVector, only_promoters: bool) -> DispatchResult<Pass> {
        self.loops.with_entries(|entries| -> DispatchResult<Pass> {
            let mut best: Option<&Arc<LoopEntry>> = None;
            for entry in entries {
                if only_promoters && entry.implementation.is_kernel() {
                    continue;
                }
                if !self.loop_matches(&entry.tuple, given) {
                    continue;
                }
                if let Some(prev) = best {
                    match self.compare_specificity(&prev.tuple, &entry.tuple, given)? {
                        Ordering::Less => continue,
                        Ordering::Greater => {}
                        Ordering::Equal => {
                            return Ok(Pass::Tied(Arc::clone(prev), Arc::clone(entry)));
                        }
                    }
                }
                best = Some(entry);
            }
            Ok(Pass::Done(best.cloned()))
        })
    }

    /// Whether a registered tuple accepts the operand vector.
    pub fn loop_matches(&self, tuple: &[Slot], given: &TypeVector) -> bool {
        let nargs = self.nargs();
        if tuple.len() != nargs || given.len() != nargs {
            return false;
        }
        for (i, slot) in tuple.iter().enumerate() {
            let Some(operand) = given[i] else {
                if i >= self.nin {
                    // Unspecified outputs always match.
                    continue;
                }
                // Reduce-like calls have the shape (result, operand, result)
                // with the first input omitted.
                if tuple[0] == tuple[nargs - 1] || slot.is_wildcard() {
                    continue;
                }
                return false;
            };
            match *slot {
                Slot::Wildcard => continue,
                Slot::Fixed(dtype) if dtype == operand => continue,
                Slot::Fixed(dtype) if !self.dtypes.is_abstract(dtype) => return false,
                Slot::Fixed(dtype) => {
                    if !self.dtypes.is_subclass_of(operand, dtype) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Compare two matching tuples for `given`.
    ///
    /// Returns:
    /// - `Ordering::Less` if `prev` is more specific
    /// - `Ordering::Greater` if `curr` is more specific
    /// - `Ordering::Equal` if neither can be preferred (ambiguity)
    pub fn compare_specificity(
        &self,
        prev: &[Slot],
        curr: &[Slot],
        given: &TypeVector,
    ) -> DispatchResult<Ordering> {
        let mut decided: Option<Ordering> = None;

        for i in 0..self.nargs() {
            if i == self.nin && decided.is_some() {
                // Inputs prefer one loop; outputs only break ties.
                break;
            }
            let (p, c) = (prev[i], curr[i]);
            if p == c {
                continue;
            }
            let Some(operand) = given[i] else {
                // An unset slot matches both equally.
                continue;
            };

            let vote = match (p, c) {
                (Slot::Wildcard, _) => Some(Ordering::Greater),
                (_, Slot::Wildcard) => Some(Ordering::Less),
                (Slot::Fixed(pd), Slot::Fixed(cd)) => {
                    match (self.dtypes.is_abstract(pd), self.dtypes.is_abstract(cd)) {
                        (false, false) if pd == operand => Some(Ordering::Less),
                        (false, false) if cd == operand => Some(Ordering::Greater),
                        (false, false) => None,
                        (false, true) => Some(Ordering::Less),
                        (true, false) => Some(Ordering::Greater),
                        (true, true) => {
                            return Err(DispatchError::UnsupportedAbstractComparison {
                                operation: self.name.clone(),
                                first: display_tuple(prev, &self.dtypes).to_string(),
                                second: display_tuple(curr, &self.dtypes).to_string(),
                            });
                        }
                    }
                }
            };

            let Some(vote) = vote else {
                continue;
            };
            promotion_trace!(self, slot = i, ?vote, "specificity vote");
            match decided {
                Some(previous) if previous != vote => return Ok(Ordering::Equal),
                _ => decided = Some(vote),
            }
        }

        Ok(decided.unwrap_or(Ordering::Equal))
    }

    pub(crate) fn ambiguity_error(
        &self,
        given: &TypeVector,
        first: &LoopEntry,
        second: &LoopEntry,
    ) -> DispatchError {
        DispatchError::AmbiguousPromotion {
            operation: self.name.clone(),
            given: given.display(&self.dtypes).to_string(),
            first: display_tuple(&first.tuple, &self.dtypes).to_string(),
            second: display_tuple(&second.tuple, &self.dtypes).to_string(),
        }
    }
}
