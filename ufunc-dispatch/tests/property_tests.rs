//! Property-based tests for dispatch resolution.
//!
//! Uses proptest to generate operand vectors and loop tuples and verify that
//! resolution is deterministic and independent of cache state.

use std::cmp::Ordering;
use std::sync::Arc;

use proptest::prelude::*;
use ufunc_dispatch::{
    homogeneous_promoter, DType, DTypeDecl, DTypeKind, DTypeTable, Kernel, Operation,
    PromoteOptions, PromotionTable, Signature, Slot, TypeVector,
};

const NUMERIC: [&str; 3] = ["int32", "int64", "float64"];

struct Numeric {
    table: Arc<DTypeTable>,
    dtypes: Vec<DType>,
}

impl Numeric {
    fn new() -> Self {
        let mut builder = DTypeTable::builder();
        let dtypes = NUMERIC
            .iter()
            .map(|name| {
                builder
                    .declare(DTypeDecl::new(*name).kind(DTypeKind::NUMERIC))
                    .unwrap()
            })
            .collect();
        Self {
            table: Arc::new(builder.build()),
            dtypes,
        }
    }

    /// `add` over a totally ordered lattice with one homogeneous loop per
    /// dtype, registered in `order`.
    fn make_add(&self, order: &[usize]) -> Operation {
        let mut promotion = PromotionTable::new();
        for (i, a) in self.dtypes.iter().enumerate() {
            for b in &self.dtypes[i + 1..] {
                promotion.insert(*a, *b, *b);
            }
        }
        let op = Operation::new("add", 2, 1, Arc::clone(&self.table))
            .with_common_dtype(Arc::new(promotion));
        for &i in order {
            let name = format!("add_{}", NUMERIC[i]);
            op.register(&[Slot::Fixed(self.dtypes[i]); 3], Kernel::new(name), false)
                .unwrap();
        }
        op.register(&[Slot::Wildcard; 3], homogeneous_promoter(), false)
            .unwrap();
        op
    }
}

fn dispatch(op: &Operation, a: DType, b: DType) -> (String, Signature) {
    let mut signature = Signature::unset(3);
    let mut operands = TypeVector::new(vec![Some(a), Some(b), None]);
    let kernel = op
        .promote(&[], &mut signature, &mut operands, PromoteOptions::default())
        .unwrap();
    (kernel.name().to_string(), signature)
}

/// Strategy for an index into `NUMERIC`
fn numeric_index() -> impl Strategy<Value = usize> {
    0..NUMERIC.len()
}

proptest! {
    /// The selected kernel is the loop of the joined dtype
    #[test]
    fn dispatch_selects_join(a in numeric_index(), b in numeric_index()) {
        let numeric = Numeric::new();
        let op = numeric.make_add(&[0, 1, 2]);
        let (kernel, signature) = dispatch(&op, numeric.dtypes[a], numeric.dtypes[b]);

        let joined = a.max(b);
        prop_assert_eq!(kernel, format!("add_{}", NUMERIC[joined]));
        prop_assert_eq!(signature[2], Some(numeric.dtypes[joined]));
    }

    /// Registration order does not change the result
    #[test]
    fn dispatch_independent_of_registration_order(
        a in numeric_index(),
        b in numeric_index(),
        order in Just(vec![0usize, 1, 2]).prop_shuffle(),
    ) {
        let numeric = Numeric::new();
        let ordered = numeric.make_add(&[0, 1, 2]);
        let shuffled = numeric.make_add(&order);

        let (a, b) = (numeric.dtypes[a], numeric.dtypes[b]);
        prop_assert_eq!(dispatch(&ordered, a, b), dispatch(&shuffled, a, b));
    }

    /// A warm cache answers exactly like a cold one
    #[test]
    fn cached_dispatch_matches_cold(calls in prop::collection::vec((numeric_index(), numeric_index()), 1..20)) {
        let numeric = Numeric::new();
        let warm = numeric.make_add(&[0, 1, 2]);

        for (a, b) in calls {
            let (a, b) = (numeric.dtypes[a], numeric.dtypes[b]);
            let cold = numeric.make_add(&[0, 1, 2]);
            prop_assert_eq!(dispatch(&warm, a, b), dispatch(&cold, a, b));
        }
    }

    /// Specificity is antisymmetric for matching tuples
    #[test]
    fn specificity_is_antisymmetric(
        seed in (numeric_index(), numeric_index()),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 6),
    ) {
        let numeric = Numeric::new();
        let op = numeric.make_add(&[]);
        let given = TypeVector::new(vec![
            Some(numeric.dtypes[seed.0]),
            Some(numeric.dtypes[seed.1]),
            None,
        ]);

        // Each slot either matches its operand exactly or is a wildcard.
        let choose = |pick: &prop::sample::Index, i: usize| match (pick.index(2), given[i]) {
            (0, Some(dtype)) => Slot::Fixed(dtype),
            _ => Slot::Wildcard,
        };
        let first: Vec<Slot> = (0..3).map(|i| choose(&picks[i], i)).collect();
        let second: Vec<Slot> = (0..3).map(|i| choose(&picks[i + 3], i)).collect();
        prop_assert!(op.loop_matches(&first, &given));
        prop_assert!(op.loop_matches(&second, &given));

        let forward = op.compare_specificity(&first, &second, &given).unwrap();
        let backward = op.compare_specificity(&second, &first, &given).unwrap();
        prop_assert_eq!(forward, backward.reverse());
        if first == second {
            prop_assert_eq!(forward, Ordering::Equal);
        }
    }

    /// Random loop sets never make a call panic
    #[test]
    fn arbitrary_loops_resolve_or_fail_cleanly(
        a in numeric_index(),
        b in numeric_index(),
        tuples in prop::collection::vec(
            prop::collection::vec(prop::option::of(numeric_index()), 3),
            0..6,
        ),
    ) {
        let numeric = Numeric::new();
        let op = numeric.make_add(&[]);
        for (i, picks) in tuples.iter().enumerate() {
            // `None` stands for a wildcard slot.
            let tuple: Vec<Slot> = picks
                .iter()
                .map(|pick| pick.map_or(Slot::Wildcard, |j| Slot::Fixed(numeric.dtypes[j])))
                .collect();
            op.register(&tuple, Kernel::new(format!("k{i}")), true).unwrap();
        }

        let mut signature = Signature::unset(3);
        let mut operands = TypeVector::new(vec![
            Some(numeric.dtypes[a]),
            Some(numeric.dtypes[b]),
            None,
        ]);
        let first = op.promote(&[], &mut signature, &mut operands, PromoteOptions::default());
        let mut signature = Signature::unset(3);
        let second = op.promote(&[], &mut signature, &mut operands, PromoteOptions::default());
        match (first, second) {
            (Ok(x), Ok(y)) => prop_assert!(Arc::ptr_eq(&x, &y)),
            (Err(_), Err(_)) => {}
            (x, y) => prop_assert!(false, "inconsistent results: {:?} vs {:?}", x, y),
        }
    }
}
