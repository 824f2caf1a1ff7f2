//! Ufunc Dispatch
//!
//! Multiple-dispatch type resolution for polymorphic element-wise
//! operations ("ufuncs"). Given the type classifiers of a call's operands,
//! the engine selects the concrete kernel that executes it.
//!
//! # Features
//!
//! - Closed classifier hierarchy with abstract grouping types
//! - Loops keyed by type tuples with wildcard and abstract slots
//! - Specificity ordering with explicit ambiguity reporting
//! - Promoters that rewrite operand types and re-dispatch
//! - Value-based legacy resolver fallback
//! - Thread-safe dispatch cache
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ufunc_dispatch::{
//!     homogeneous_promoter, DTypeDecl, DTypeKind, DTypeTable, Kernel, Operation,
//!     PromoteOptions, PromotionTable, Signature, Slot, TypeVector,
//! };
//!
//! let mut builder = DTypeTable::builder();
//! let int32 = builder.declare(DTypeDecl::new("int32").kind(DTypeKind::NUMERIC))?;
//! let float64 = builder.declare(DTypeDecl::new("float64").kind(DTypeKind::NUMERIC))?;
//! let table = Arc::new(builder.build());
//!
//! let mut promotion = PromotionTable::new();
//! promotion.insert(int32, float64, float64);
//!
//! let add = Operation::new("add", 2, 1, table).with_common_dtype(Arc::new(promotion));
//! add.register(&[Slot::Fixed(float64); 3], Kernel::new("add_f64"), false)?;
//! add.register(&[Slot::Wildcard; 3], homogeneous_promoter(), false)?;
//!
//! let mut signature = Signature::unset(3);
//! let mut operands = TypeVector::new(vec![Some(int32), Some(float64), None]);
//! let kernel = add.promote(&[], &mut signature, &mut operands, PromoteOptions::default())?;
//! assert_eq!(kernel.name(), "add_f64");
//! assert_eq!(signature[2], Some(float64));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod common;
pub mod config;
pub mod dispatch;
pub mod dtype;
pub mod error;
pub mod operation;
pub mod signature;

pub use common::{CommonDType, JoinError, PromotionTable};
pub use config::{ConfigError, DispatchConfig};
pub use dispatch::{
    homogeneous_promoter, install_logical_promoter, logical_promoter, object_only_promoter,
    Casting, Implementation, Kernel, LegacyError, LegacyResolver, LoopEntry, Operand,
    PromoteOptions, Promoter, Resolution,
};
pub use dtype::{DType, DTypeDecl, DTypeKind, DTypeTable, DTypeTableError};
pub use error::{DispatchError, DispatchResult};
pub use operation::{Operation, OperationFlags};
pub use signature::{Signature, Slot, TypeVector};
