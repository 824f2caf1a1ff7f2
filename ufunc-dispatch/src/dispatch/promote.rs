//! Promotion orchestration and the public dispatch entry point.

use std::sync::Arc;

use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::operation::Operation;
use crate::signature::{display_tuple, Signature, Slot, TypeVector};

use super::resolver::Resolution;
use super::types::{Implementation, Kernel, LoopEntry, Operand, Promoter};

/// Per-call switches for [`Operation::promote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromoteOptions {
    /// Ask the legacy resolver before anything else and dispatch on its
    /// answer.
    pub force_legacy: bool,
    /// Permit the legacy fallback at the top level.
    pub allow_legacy: bool,
    /// Prefer a loop whose first input equals its output, so the kernel can
    /// be used for reductions.
    pub ensure_reduce_compatible: bool,
}

impl PromoteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_legacy(mut self, force_legacy: bool) -> Self {
        self.force_legacy = force_legacy;
        self
    }

    pub fn allow_legacy(mut self, allow_legacy: bool) -> Self {
        self.allow_legacy = allow_legacy;
        self
    }

    pub fn ensure_reduce_compatible(mut self, ensure: bool) -> Self {
        self.ensure_reduce_compatible = ensure;
        self
    }
}

impl Default for PromoteOptions {
    fn default() -> Self {
        Self {
            force_legacy: false,
            allow_legacy: true,
            ensure_reduce_compatible: false,
        }
    }
}

impl Operation {
    /// Select the kernel for a call.
    ///
    /// `operand_dtypes` holds the classifiers of the passed operands (outputs
    /// may be unset). `signature` holds the classifiers the caller fixed.
    /// On success both are updated: the operand vector reflects what was
    /// dispatched on and every unfixed signature slot the kernel pins down is
    /// filled in.
    pub fn promote(
        &self,
        operands: &[Option<Operand>],
        signature: &mut Signature,
        operand_dtypes: &mut TypeVector,
        options: PromoteOptions,
    ) -> DispatchResult<Arc<Kernel>> {
        self.check_arity(signature.len())?;
        self.check_arity(operand_dtypes.len())?;
        if operands.len() > self.nargs() {
            return Err(self.arity_mismatch(operands.len()));
        }

        // Fixed signature slots replace the operand classifiers; unfixed
        // outputs are dropped so that passed output arrays do not steer
        // dispatch.
        for i in 0..self.nargs() {
            match signature[i] {
                Some(fixed) => operand_dtypes.set(i, Some(fixed)),
                None if i >= self.nin => operand_dtypes.set(i, None),
                None => {}
            }
        }

        if options.force_legacy {
            *operand_dtypes = self.legacy_promote(operands, signature)?.operands;
        }

        let entry = self
            .promote_and_resolve_at(operands, signature, operand_dtypes, options.allow_legacy, 0)?
            .ok_or_else(|| self.no_loop_found(operand_dtypes))?;
        let kernel = entry
            .kernel()
            .cloned()
            .ok_or_else(|| self.no_loop_found(operand_dtypes))?;

        let nargs = self.nargs();
        if options.ensure_reduce_compatible
            && nargs > 0
            && signature[0].is_none()
            && entry.tuple[0] != entry.tuple[nargs - 1]
        {
            if let Some(output) = entry.tuple[nargs - 1].dtype() {
                debug!(
                    operation = %self.name,
                    tuple = %display_tuple(&entry.tuple, &self.dtypes),
                    "loop is not reduce compatible, retrying with the first input fixed"
                );
                signature.set(0, Some(output));
                return self.promote(
                    operands,
                    signature,
                    operand_dtypes,
                    options.ensure_reduce_compatible(false),
                );
            }
        }

        self.backfill_signature(signature, operand_dtypes, &entry.tuple)?;
        debug!(
            operation = %self.name,
            kernel = kernel.name(),
            signature = %signature.display(&self.dtypes),
            "dispatched"
        );
        Ok(kernel)
    }

    /// Resolve `operand_dtypes` to a kernel entry without touching the
    /// operand overlay or the signature backfill.
    ///
    /// Returns `Ok(None)` when nothing applies.
    pub fn promote_and_resolve(
        &self,
        operands: &[Option<Operand>],
        signature: &mut Signature,
        operand_dtypes: &TypeVector,
        allow_legacy: bool,
    ) -> DispatchResult<Option<Arc<LoopEntry>>> {
        self.check_arity(signature.len())?;
        self.check_arity(operand_dtypes.len())?;
        self.promote_and_resolve_at(operands, signature, operand_dtypes, allow_legacy, 0)
    }

    fn promote_and_resolve_at(
        &self,
        operands: &[Option<Operand>],
        signature: &mut Signature,
        given: &TypeVector,
        allow_legacy: bool,
        depth: usize,
    ) -> DispatchResult<Option<Arc<LoopEntry>>> {
        // The key ignores the signature, so a hit whose loop contradicts a
        // fixed slot is resolved afresh and the answer is not stored.
        let mut cacheable = true;
        if let Some(hit) = self.cache.get(given) {
            if !self.contradicts_signature(&hit.tuple, signature) {
                promotion_trace!(
                    self,
                    operation = %self.name,
                    given = %given.display(&self.dtypes),
                    "dispatch cache hit"
                );
                return Ok(Some(hit));
            }
            debug!(
                operation = %self.name,
                given = %given.display(&self.dtypes),
                signature = %signature.display(&self.dtypes),
                "cached loop contradicts the signature, resolving again"
            );
            cacheable = false;
        }
        let remember = |entry: Arc<LoopEntry>| {
            if cacheable {
                self.cache.insert(given.clone(), entry)
            } else {
                entry
            }
        };

        let mut ambiguity = None;
        match self.resolve_implementation(given)? {
            Resolution::Found(entry) => {
                if entry.implementation.is_kernel() {
                    return Ok(Some(remember(entry)));
                }
                if let Implementation::Promoter(promoter) = &entry.implementation {
                    let resolved = self.run_promoter(promoter, operands, signature, given, depth)?;
                    if let Some(resolved) = resolved {
                        return Ok(Some(remember(resolved)));
                    }
                }
            }
            Resolution::NoMatch => {}
            Resolution::Ambiguous { first, second } => ambiguity = Some((first, second)),
        }

        let ambiguous = |ambiguity: Option<(Arc<LoopEntry>, Arc<LoopEntry>)>| {
            match ambiguity {
                Some((first, second)) => Err(self.ambiguity_error(given, &first, &second)),
                None => Ok::<_, DispatchError>(None),
            }
        };
        if !(allow_legacy && self.has_legacy_resolver() && self.has_kernels()) {
            return ambiguous(ambiguity);
        }

        let promotion = self.legacy_promote(operands, signature)?;
        let depth = self.descend(depth)?;
        let resolved =
            self.promote_and_resolve_at(operands, signature, &promotion.operands, false, depth)?;
        match resolved {
            Some(entry) if promotion.cacheable => Ok(Some(remember(entry))),
            Some(entry) => Ok(Some(entry)),
            None => ambiguous(ambiguity),
        }
    }

    /// Call a winning promoter and resolve its refined vector.
    ///
    /// A promoter that does not apply, or that returns its input unchanged,
    /// yields `Ok(None)` so that the caller can fall back to legacy
    /// resolution.
    fn run_promoter(
        &self,
        promoter: &Promoter,
        operands: &[Option<Operand>],
        signature: &mut Signature,
        given: &TypeVector,
        depth: usize,
    ) -> DispatchResult<Option<Arc<LoopEntry>>> {
        let Some(promoted) = promoter.call(self, given, signature)? else {
            promotion_trace!(self, promoter = promoter.name(), "promoter not applicable");
            return Ok(None);
        };
        self.check_promotion(promoter, signature, &promoted)?;
        if promoted == *given {
            debug!(
                operation = %self.name,
                promoter = promoter.name(),
                given = %given.display(&self.dtypes),
                "promoter made no progress"
            );
            return Ok(None);
        }

        promotion_trace!(
            self,
            operation = %self.name,
            promoter = promoter.name(),
            from = %given.display(&self.dtypes),
            to = %promoted.display(&self.dtypes),
            "promoted"
        );
        let depth = self.descend(depth)?;
        self.promote_and_resolve_at(operands, signature, &promoted, false, depth)
    }

    fn check_promotion(
        &self,
        promoter: &Promoter,
        signature: &Signature,
        promoted: &TypeVector,
    ) -> DispatchResult<()> {
        let invalid = |reason: String| DispatchError::InvalidPromotion {
            operation: self.name.clone(),
            promoter: promoter.name().to_string(),
            reason,
        };
        if promoted.len() != self.nargs() {
            return Err(invalid(format!(
                "expected {} entries, got {}",
                self.nargs(),
                promoted.len()
            )));
        }
        for (i, dtype) in promoted.iter().enumerate() {
            if dtype.is_some_and(|d| !self.dtypes.contains(d)) {
                return Err(invalid(format!("slot {i} holds a dtype from a different table")));
            }
            if let Some(fixed) = signature[i] {
                if dtype != Some(fixed) {
                    return Err(invalid(format!(
                        "slot {i} is fixed to {} by the signature",
                        self.dtypes.display(fixed)
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether a concrete slot of `tuple` disagrees with a fixed signature
    /// slot. Abstract slots never contradict, matching the backfill rules.
    fn contradicts_signature(&self, tuple: &[Slot], signature: &Signature) -> bool {
        tuple.iter().zip(signature.iter()).any(|(slot, fixed)| match (*slot, fixed) {
            (Slot::Fixed(dtype), Some(fixed)) => {
                dtype != fixed && !self.dtypes.is_abstract(dtype)
            }
            _ => false,
        })
    }

    fn descend(&self, depth: usize) -> DispatchResult<usize> {
        let depth = depth + 1;
        if depth > self.config.max_promotion_depth {
            return Err(DispatchError::RecursionLimitExceeded {
                operation: self.name.clone(),
                limit: self.config.max_promotion_depth,
            });
        }
        Ok(depth)
    }

    /// Fill unfixed signature slots from the resolved tuple and reject fixed
    /// slots the tuple contradicts.
    ///
    /// Abstract tuple slots only constrain the operand, so an unfixed slot
    /// takes the dispatched operand classifier there instead.
    fn backfill_signature(
        &self,
        signature: &mut Signature,
        operand_dtypes: &TypeVector,
        tuple: &[Slot],
    ) -> DispatchResult<()> {
        for (i, slot) in tuple.iter().enumerate() {
            let Slot::Fixed(dtype) = *slot else {
                continue;
            };
            let is_abstract = self.dtypes.is_abstract(dtype);
            match signature[i] {
                None if is_abstract => signature.set(i, operand_dtypes[i]),
                None => signature.set(i, Some(dtype)),
                Some(fixed) if fixed != dtype && !is_abstract => {
                    return Err(DispatchError::SignatureConflict {
                        operation: self.name.clone(),
                        signature: signature.display(&self.dtypes).to_string(),
                        tuple: display_tuple(tuple, &self.dtypes).to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn check_arity(&self, found: usize) -> DispatchResult<()> {
        if found == self.nargs() {
            Ok(())
        } else {
            Err(self.arity_mismatch(found))
        }
    }

    fn arity_mismatch(&self, found: usize) -> DispatchError {
        DispatchError::ArityMismatch {
            operation: self.name.clone(),
            expected: self.nargs(),
            found,
        }
    }

    fn no_loop_found(&self, given: &TypeVector) -> DispatchError {
        DispatchError::NoLoopFound {
            operation: self.name.clone(),
            given: given.display(&self.dtypes).to_string(),
        }
    }
}
