//! Slots, operand type vectors and call signatures.
//!
//! Textual forms used in diagnostics: `*` is a wildcard loop slot, `_` is an
//! unset operand or signature slot.

use std::fmt::{self, Write as _};
use std::ops::Index;

use crate::dtype::{DType, DTypeTable};

/// One position of a registered loop tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Matches any operand classifier, including an unset one.
    Wildcard,
    /// Matches the classifier itself, or its subclasses when it is abstract.
    Fixed(DType),
}

impl Slot {
    pub fn dtype(self) -> Option<DType> {
        match self {
            Slot::Wildcard => None,
            Slot::Fixed(dtype) => Some(dtype),
        }
    }

    pub fn is_wildcard(self) -> bool {
        matches!(self, Slot::Wildcard)
    }
}

impl From<DType> for Slot {
    fn from(dtype: DType) -> Self {
        Slot::Fixed(dtype)
    }
}

/// The classification of one call's operands. `None` marks an unset slot.
///
/// Two vectors are cache-equal iff every slot is identity-equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeVector(Box<[Option<DType>]>);

impl TypeVector {
    pub fn new(slots: impl Into<Box<[Option<DType>]>>) -> Self {
        Self(slots.into())
    }

    /// A vector of `nargs` unset slots.
    pub fn unset(nargs: usize) -> Self {
        Self(vec![None; nargs].into_boxed_slice())
    }

    /// A vector with every slot set.
    pub fn of(dtypes: &[DType]) -> Self {
        dtypes.iter().copied().map(Some).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<DType> {
        self.0.get(index).copied().flatten()
    }

    pub fn set(&mut self, index: usize, dtype: Option<DType>) {
        self.0[index] = dtype;
    }

    pub fn as_slice(&self) -> &[Option<DType>] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<DType>> + '_ {
        self.0.iter().copied()
    }

    pub fn display<'a>(&'a self, table: &'a DTypeTable) -> DisplaySlots<'a> {
        DisplaySlots::Operands(self.as_slice(), table)
    }
}

impl Index<usize> for TypeVector {
    type Output = Option<DType>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl FromIterator<Option<DType>> for TypeVector {
    fn from_iter<T: IntoIterator<Item = Option<DType>>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Option<DType>>> for TypeVector {
    fn from(slots: Vec<Option<DType>>) -> Self {
        Self(slots.into_boxed_slice())
    }
}

/// The classifiers fixed explicitly by the caller.
///
/// A signature is left alone during resolution except for the legacy
/// override and the final backfill from the resolved loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(Box<[Option<DType>]>);

impl Signature {
    pub fn new(slots: impl Into<Box<[Option<DType>]>>) -> Self {
        Self(slots.into())
    }

    /// A signature that fixes nothing.
    pub fn unset(nargs: usize) -> Self {
        Self(vec![None; nargs].into_boxed_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<DType> {
        self.0.get(index).copied().flatten()
    }

    pub fn is_fixed(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn set(&mut self, index: usize, dtype: Option<DType>) {
        self.0[index] = dtype;
    }

    /// Whether no slot is fixed.
    pub fn is_unconstrained(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    pub fn as_slice(&self) -> &[Option<DType>] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<DType>> + '_ {
        self.0.iter().copied()
    }

    pub fn display<'a>(&'a self, table: &'a DTypeTable) -> DisplaySlots<'a> {
        DisplaySlots::Operands(self.as_slice(), table)
    }
}

impl Index<usize> for Signature {
    type Output = Option<DType>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<Option<DType>>> for Signature {
    fn from(slots: Vec<Option<DType>>) -> Self {
        Self(slots.into_boxed_slice())
    }
}

/// Render a loop tuple, e.g. `(int32, *, float64)`.
pub fn display_tuple<'a>(tuple: &'a [Slot], table: &'a DTypeTable) -> DisplaySlots<'a> {
    DisplaySlots::Tuple(tuple, table)
}

/// [`fmt::Display`] adapter for tuples, vectors and signatures.
pub enum DisplaySlots<'a> {
    Tuple(&'a [Slot], &'a DTypeTable),
    Operands(&'a [Option<DType>], &'a DTypeTable),
}

impl fmt::Display for DisplaySlots<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("(");
        match self {
            DisplaySlots::Tuple(slots, table) => {
                for (i, slot) in slots.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match slot {
                        Slot::Wildcard => out.push('*'),
                        Slot::Fixed(dtype) => out.push_str(table.name(*dtype)),
                    }
                }
            }
            DisplaySlots::Operands(slots, table) => {
                for (i, slot) in slots.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    match slot {
                        None => out.push('_'),
                        Some(dtype) => write!(out, "{}", table.display(*dtype))?,
                    }
                }
            }
        }
        out.push(')');
        f.write_str(&out)
    }
}
