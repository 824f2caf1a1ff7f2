//! Running a scenario and describing the outcome of each call.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};
use ufunc_dispatch::signature::display_tuple;
use ufunc_dispatch::{Implementation, PromoteOptions};

use crate::scenario::{CallSpec, Scenario};
use crate::ExplainResult;

/// Everything `ufunc-explain` prints for one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub operation: String,
    pub nin: usize,
    pub nout: usize,
    pub loops: Vec<LoopLine>,
    pub calls: Vec<CallReport>,
}

/// One registered loop, in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct LoopLine {
    pub types: String,
    pub implementation: String,
    pub kind: LoopKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    Kernel,
    LegacyKernel,
    Promoter,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallReport {
    pub operands: String,
    pub signature: String,
    pub outcome: Outcome,
    /// Dispatch cache size after the call.
    pub cache_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Dispatched {
        kernel: String,
        /// The signature after backfilling.
        signature: String,
        /// The operand dtypes dispatch ran on.
        operands: String,
    },
    Failed {
        error: String,
        registration_defect: bool,
    },
}

impl Outcome {
    pub fn kernel(&self) -> Option<&str> {
        match self {
            Outcome::Dispatched { kernel, .. } => Some(kernel),
            Outcome::Failed { .. } => None,
        }
    }
}

/// Dispatch every call of `scenario` in order.
///
/// Calls share the operation, so later calls may be answered from the
/// dispatch cache.
pub fn explain(scenario: &Scenario) -> ExplainResult<Report> {
    let op = &scenario.operation;
    let loops = op
        .loops()
        .iter()
        .map(|entry| LoopLine {
            types: display_tuple(entry.tuple(), op.dtypes()).to_string(),
            implementation: entry.implementation().name().to_string(),
            kind: match entry.implementation() {
                Implementation::Kernel(kernel) if kernel.is_legacy() => LoopKind::LegacyKernel,
                Implementation::Kernel(_) => LoopKind::Kernel,
                Implementation::Promoter(_) => LoopKind::Promoter,
            },
        })
        .collect();

    let calls = scenario
        .file
        .calls
        .iter()
        .map(|call| explain_call(scenario, call))
        .collect::<ExplainResult<Vec<_>>>()?;

    Ok(Report {
        operation: op.name().to_string(),
        nin: op.nin(),
        nout: op.nout(),
        loops,
        calls,
    })
}

fn explain_call(scenario: &Scenario, call: &CallSpec) -> ExplainResult<CallReport> {
    let op = &scenario.operation;
    let (mut operand_dtypes, operands) = scenario.operands(call)?;
    let mut signature = scenario.signature(call)?;
    let operands_text = operand_dtypes.display(op.dtypes()).to_string();
    let signature_text = signature.display(op.dtypes()).to_string();

    let options = PromoteOptions::new()
        .force_legacy(call.force_legacy)
        .allow_legacy(call.allow_legacy.unwrap_or(true))
        .ensure_reduce_compatible(call.reduce_compatible);
    debug!(operands = %operands_text, signature = %signature_text, ?options, "explaining call");

    let outcome = match op.promote(&operands, &mut signature, &mut operand_dtypes, options) {
        Ok(kernel) => Outcome::Dispatched {
            kernel: kernel.name().to_string(),
            signature: signature.display(op.dtypes()).to_string(),
            operands: operand_dtypes.display(op.dtypes()).to_string(),
        },
        Err(err) => {
            info!(operands = %operands_text, "dispatch failed: {err}");
            Outcome::Failed {
                registration_defect: err.is_registration_defect(),
                error: err.to_string(),
            }
        }
    };

    Ok(CallReport {
        operands: operands_text,
        signature: signature_text,
        outcome,
        cache_entries: op.cache_len(),
    })
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} in, {} out), {} loops",
            self.operation,
            self.nin,
            self.nout,
            self.loops.len()
        )?;
        for line in &self.loops {
            let kind = match line.kind {
                LoopKind::Kernel => "kernel",
                LoopKind::LegacyKernel => "legacy",
                LoopKind::Promoter => "promoter",
            };
            writeln!(f, "  {:<32} {:<8} {}", line.types, kind, line.implementation)?;
        }
        for call in &self.calls {
            writeln!(f)?;
            writeln!(f, "call {} signature {}", call.operands, call.signature)?;
            match &call.outcome {
                Outcome::Dispatched {
                    kernel,
                    signature,
                    operands,
                } => {
                    writeln!(f, "  -> {kernel}")?;
                    writeln!(f, "     dispatched on {operands}, signature {signature}")?;
                }
                Outcome::Failed {
                    error,
                    registration_defect,
                } => {
                    writeln!(f, "  !! {error}")?;
                    if *registration_defect {
                        writeln!(f, "     (registration defect)")?;
                    }
                }
            }
            writeln!(f, "     cache entries: {}", call.cache_entries)?;
        }
        Ok(())
    }
}
