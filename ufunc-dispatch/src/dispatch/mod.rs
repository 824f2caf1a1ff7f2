//! Loop dispatch and type promotion.
//!
//! This module selects the concrete kernel that executes an operation for a
//! given vector of operand classifiers. Loops are registered per operation
//! as `(tuple, implementation)` pairs where the implementation is either a
//! kernel or a promoter that rewrites the operand vector and asks again.
//!
//! # Algorithm Overview
//!
//! 1. **Probe the cache**: a memoized operand vector answers immediately
//! 2. **Resolve**: pick the most specific matching loop or promoter
//! 3. **Promote**: a winning promoter refines the vector and recurses
//! 4. **Fall back**: the value-based legacy resolver gets the final word
//!
//! # Module Structure
//!
//! - [`types`] - Kernels, promoters and registered entries
//! - [`registry`] - Loop registration
//! - [`cache`] - Dispatch cache
//! - [`resolver`] - Matching and specificity
//! - [`legacy`] - Legacy resolver bridge
//! - [`promote`] - Promotion orchestration and the public entry point
//! - [`promoters`] - Built-in promoters

/// Emit a promotion trace event, at `debug` when the operation's config asks
/// for promotion tracing and at `trace` otherwise.
macro_rules! promotion_trace {
    ($op:expr, $($arg:tt)+) => {
        if $op.config.trace_promotion {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

mod types;
mod registry;
mod cache;
mod resolver;
mod legacy;
mod promote;
mod promoters;


pub use types::{Casting, Implementation, Kernel, LoopEntry, Operand, Promoter, PromoterFn};

pub use registry::LoopRegistry;

pub use cache::DispatchCache;

pub use resolver::Resolution;

pub use legacy::{LegacyError, LegacyResolver};

pub use promote::PromoteOptions;

pub use promoters::{
    homogeneous_promoter,
    install_logical_promoter,
    logical_promoter,
    object_only_promoter,
};
