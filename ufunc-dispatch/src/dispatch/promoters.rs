//! Built-in promoters.

use crate::dtype::{DType, DTypeKind};
use crate::error::{DispatchError, DispatchResult};
use crate::operation::{Operation, OperationFlags};
use crate::signature::{Signature, Slot, TypeVector};

use super::types::Promoter;

/// Promote all inputs to their common dtype.
///
/// Not applicable for fewer than two inputs, when the operation has no
/// common-dtype collaborator, or when the inputs have no common dtype.
/// Binary comparisons called with only a non-boolean output fixed are left
/// to the legacy resolver.
pub fn homogeneous_promoter() -> Promoter {
    Promoter::new("homogeneous", homogeneous)
}

fn homogeneous(
    op: &Operation,
    given: &TypeVector,
    signature: &Signature,
) -> DispatchResult<Option<TypeVector>> {
    let (nin, nargs) = (op.nin(), op.nargs());
    if nin < 2 {
        return Ok(None);
    }
    if op.flags().contains(OperationFlags::BINARY_COMPARISON)
        && nargs == 3
        && signature[0].is_none()
        && signature[1].is_none()
        && signature[2].is_some_and(|out| !op.dtypes().kind(out).contains(DTypeKind::BOOL))
    {
        return Ok(None);
    }

    if given[0].is_none() {
        // Reduction: (unset, operand, out)
        if nin != 2 || nargs != 3 {
            return Ok(None);
        }
        let Some(operand) = given[1] else {
            return Ok(None);
        };
        return Ok(Some(
            (0..nargs).map(|i| signature[i].or(Some(operand))).collect(),
        ));
    }

    let Some(common) = homogeneous_common(op, given, signature) else {
        return Ok(None);
    };
    Ok(Some(
        (0..nargs)
            .map(|i| match signature[i] {
                Some(fixed) => Some(fixed),
                None if i < nin => Some(common),
                None => given[i],
            })
            .collect(),
    ))
}

/// A homogeneous set of fixed outputs wins; otherwise join the inputs.
fn homogeneous_common(op: &Operation, given: &TypeVector, signature: &Signature) -> Option<DType> {
    let mut fixed_outputs = (op.nin()..op.nargs()).filter_map(|i| signature[i]);
    if let Some(first) = fixed_outputs.next() {
        if fixed_outputs.all(|out| out == first) {
            return Some(first);
        }
    }

    let inputs: Option<Vec<DType>> = (0..op.nin()).map(|i| given[i]).collect();
    let common = op.common.as_ref()?;
    common.common_dtype(&inputs?).ok()
}

/// Force every unfixed slot to the object dtype.
pub fn object_only_promoter() -> Promoter {
    Promoter::new("object_only", |op: &Operation, given: &TypeVector, signature: &Signature| {
        let object = op.dtypes().object().ok_or_else(|| missing(op, "object"))?;
        Ok(Some(
            (0..given.len())
                .map(|i| signature[i].or(Some(object)))
                .collect(),
        ))
    })
}

/// Route binary logical operations through the `(bool, bool) -> bool` loop,
/// or the object loop when an object operand is involved.
pub fn logical_promoter() -> Promoter {
    Promoter::new("logical", logical)
}

fn logical(
    op: &Operation,
    given: &TypeVector,
    signature: &Signature,
) -> DispatchResult<Option<TypeVector>> {
    if op.nargs() != 3 {
        return Ok(None);
    }
    let dtypes = op.dtypes();
    let has_kind = |dtype: Option<DType>, kind: DTypeKind| {
        dtype.is_some_and(|d| dtypes.kind(d).contains(kind))
    };

    if signature[0].is_none()
        && signature[1].is_none()
        && signature[2].is_some_and(|out| !dtypes.kind(out).contains(DTypeKind::BOOL))
    {
        return Ok(None);
    }
    if has_kind(given[0], DTypeKind::STRING) || has_kind(given[1], DTypeKind::STRING) {
        return Ok(None);
    }

    let boolean = dtypes.bool().ok_or_else(|| missing(op, "bool"))?;
    let mut force_object = false;
    let mut promoted = TypeVector::unset(3);
    for i in 0..3 {
        match signature[i] {
            Some(fixed) => {
                force_object |= has_kind(Some(fixed), DTypeKind::OBJECT);
                promoted.set(i, Some(fixed));
            }
            None => {
                force_object |= has_kind(given[i], DTypeKind::OBJECT);
                promoted.set(i, Some(boolean));
            }
        }
    }

    if !force_object || given[2].is_some_and(|out| !dtypes.kind(out).contains(DTypeKind::OBJECT)) {
        return Ok(Some(promoted));
    }
    let object = dtypes.object().ok_or_else(|| missing(op, "object"))?;
    for i in 0..3 {
        if signature[i].is_none() {
            promoted.set(i, Some(object));
        }
    }
    Ok(Some(promoted))
}

/// Register the logical promoter for `(DType, DType, DType)`, matching every
/// call of a binary logical operation.
pub fn install_logical_promoter(op: &Operation) -> DispatchResult<()> {
    if op.nin() != 2 || op.nout() != 1 {
        return Err(DispatchError::MalformedRegistration {
            operation: op.name().to_string(),
            reason: "the logical promoter needs two inputs and one output".to_string(),
        });
    }
    let root = Slot::Fixed(op.dtypes().root());
    op.register(&[root, root, root], logical_promoter(), false)
}

fn missing(op: &Operation, kind: &'static str) -> DispatchError {
    DispatchError::MissingDType {
        operation: op.name().to_string(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::common::PromotionTable;
    use crate::dtype::{DTypeDecl, DTypeTable};

    struct Fixture {
        table: Arc<DTypeTable>,
        boolean: DType,
        int32: DType,
        float64: DType,
        string: DType,
        object: DType,
    }

    fn make_fixture() -> Fixture {
        let mut builder = DTypeTable::builder();
        let boolean = builder
            .declare(DTypeDecl::new("bool").kind(DTypeKind::BOOL))
            .unwrap();
        let int32 = builder
            .declare(DTypeDecl::new("int32").kind(DTypeKind::NUMERIC))
            .unwrap();
        let float64 = builder
            .declare(DTypeDecl::new("float64").kind(DTypeKind::NUMERIC))
            .unwrap();
        let string = builder
            .declare(DTypeDecl::new("str").kind(DTypeKind::STRING))
            .unwrap();
        let object = builder
            .declare(DTypeDecl::new("object").kind(DTypeKind::OBJECT))
            .unwrap();
        Fixture {
            table: Arc::new(builder.build()),
            boolean,
            int32,
            float64,
            string,
            object,
        }
    }

    fn make_binary(fx: &Fixture, flags: OperationFlags) -> Operation {
        let mut promotion = PromotionTable::new();
        promotion.insert(fx.int32, fx.float64, fx.float64);
        Operation::new("add", 2, 1, Arc::clone(&fx.table))
            .with_flags(flags)
            .with_common_dtype(Arc::new(promotion))
    }

    fn vector(slots: &[Option<DType>]) -> TypeVector {
        TypeVector::new(slots.to_vec())
    }

    #[test]
    fn test_homogeneous_joins_inputs_and_keeps_outputs() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[Some(fx.int32), Some(fx.float64), None]);

        let promoted = homogeneous_promoter()
            .call(&op, &given, &Signature::unset(3))
            .unwrap();
        assert_eq!(promoted, Some(vector(&[Some(fx.float64), Some(fx.float64), None])));
    }

    #[test]
    fn test_homogeneous_prefers_fixed_outputs() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[Some(fx.int32), Some(fx.float64), Some(fx.int32)]);
        let signature = Signature::new(vec![None, None, Some(fx.int32)]);

        let promoted = homogeneous_promoter().call(&op, &given, &signature).unwrap();
        assert_eq!(
            promoted,
            Some(vector(&[Some(fx.int32), Some(fx.int32), Some(fx.int32)]))
        );
    }

    #[test]
    fn test_homogeneous_reduction_shape() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[None, Some(fx.int32), None]);

        let promoted = homogeneous_promoter()
            .call(&op, &given, &Signature::unset(3))
            .unwrap();
        assert_eq!(
            promoted,
            Some(vector(&[Some(fx.int32), Some(fx.int32), Some(fx.int32)]))
        );
    }

    #[test]
    fn test_homogeneous_join_failure_is_not_applicable() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[Some(fx.int32), Some(fx.string), None]);

        let promoted = homogeneous_promoter()
            .call(&op, &given, &Signature::unset(3))
            .unwrap();
        assert_eq!(promoted, None);
    }

    #[test]
    fn test_homogeneous_skips_unary() {
        let fx = make_fixture();
        let op = Operation::new("neg", 1, 1, Arc::clone(&fx.table));
        let given = vector(&[Some(fx.int32), None]);

        let promoted = homogeneous_promoter()
            .call(&op, &given, &Signature::unset(2))
            .unwrap();
        assert_eq!(promoted, None);
    }

    #[test]
    fn test_homogeneous_comparison_with_non_bool_output_bails() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::BINARY_COMPARISON);
        let given = vector(&[Some(fx.int32), Some(fx.float64), Some(fx.float64)]);
        let signature = Signature::new(vec![None, None, Some(fx.float64)]);

        let promoted = homogeneous_promoter().call(&op, &given, &signature).unwrap();
        assert_eq!(promoted, None);

        let signature = Signature::new(vec![None, None, Some(fx.boolean)]);
        let given = vector(&[Some(fx.int32), Some(fx.float64), Some(fx.boolean)]);
        let promoted = homogeneous_promoter().call(&op, &given, &signature).unwrap();
        assert!(promoted.is_some());
    }

    #[test]
    fn test_object_only_keeps_fixed_slots() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[Some(fx.int32), Some(fx.float64), None]);
        let signature = Signature::new(vec![None, Some(fx.float64), None]);

        let promoted = object_only_promoter().call(&op, &given, &signature).unwrap();
        assert_eq!(
            promoted,
            Some(vector(&[Some(fx.object), Some(fx.float64), Some(fx.object)]))
        );
    }

    #[test]
    fn test_object_only_without_object_dtype() {
        let mut builder = DTypeTable::builder();
        let int32 = builder.declare(DTypeDecl::new("int32")).unwrap();
        let op = Operation::new("f", 1, 1, Arc::new(builder.build()));

        let err = object_only_promoter()
            .call(&op, &vector(&[Some(int32), None]), &Signature::unset(2))
            .unwrap_err();
        match err {
            DispatchError::MissingDType { kind, .. } => assert_eq!(kind, "object"),
            other => panic!("Expected MissingDType, got {:?}", other),
        }
    }

    #[test]
    fn test_logical_casts_to_bool() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[Some(fx.int32), Some(fx.float64), None]);

        let promoted = logical_promoter()
            .call(&op, &given, &Signature::unset(3))
            .unwrap();
        assert_eq!(
            promoted,
            Some(vector(&[Some(fx.boolean), Some(fx.boolean), Some(fx.boolean)]))
        );
    }

    #[test]
    fn test_logical_object_operand_forces_object() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[Some(fx.object), Some(fx.int32), None]);

        let promoted = logical_promoter()
            .call(&op, &given, &Signature::unset(3))
            .unwrap();
        assert_eq!(
            promoted,
            Some(vector(&[Some(fx.object), Some(fx.object), Some(fx.object)]))
        );
    }

    #[test]
    fn test_logical_object_operand_with_bool_output_stays_bool() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[Some(fx.object), Some(fx.int32), Some(fx.boolean)]);

        let promoted = logical_promoter()
            .call(&op, &given, &Signature::unset(3))
            .unwrap();
        assert_eq!(
            promoted,
            Some(vector(&[Some(fx.boolean), Some(fx.boolean), Some(fx.boolean)]))
        );
    }

    #[test]
    fn test_logical_bails_on_strings() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        let given = vector(&[Some(fx.string), Some(fx.int32), None]);

        let promoted = logical_promoter()
            .call(&op, &given, &Signature::unset(3))
            .unwrap();
        assert_eq!(promoted, None);
    }

    #[test]
    fn test_install_logical_promoter_registers_root_tuple() {
        let fx = make_fixture();
        let op = make_binary(&fx, OperationFlags::empty());
        install_logical_promoter(&op).unwrap();

        let loops = op.loops();
        assert_eq!(loops.len(), 1);
        let root = Slot::Fixed(fx.table.root());
        assert_eq!(loops[0].tuple(), &[root, root, root]);
        assert!(!loops[0].implementation().is_kernel());
    }

    #[test]
    fn test_install_logical_promoter_rejects_unary() {
        let fx = make_fixture();
        let op = Operation::new("not", 1, 1, Arc::clone(&fx.table));
        assert!(install_logical_promoter(&op).is_err());
    }
}
