//! Type classifiers ("DTypes") for dispatch.
//!
//! Classifiers are declared once through a [`DTypeTableBuilder`] and then
//! frozen into a [`DTypeTable`]. After that the set is closed: every
//! classifier is a small integer handle, identity is integer equality, and
//! the subclass relation is a precomputed bitset lookup.
//!
//! Only abstract classifiers can be subclassed. Every table has a root
//! abstract classifier (see [`DTypeTable::root`]) that all other classifiers
//! descend from.

use std::fmt;

use bitflags::bitflags;
use indexmap::IndexMap;
use string_interner::{DefaultStringInterner, DefaultSymbol};
use thiserror::Error;

/// Name of the implicit root classifier.
pub const ROOT_DTYPE_NAME: &str = "DType";

/// An interned type classifier.
///
/// Handles are only meaningful together with the [`DTypeTable`] that issued
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DType(u32);

impl DType {
    /// The position of this classifier in its table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Coarse classification used by the default promoters.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DTypeKind: u8 {
        const BOOL = 1 << 0;
        const NUMERIC = 1 << 1;
        const STRING = 1 << 2;
        const OBJECT = 1 << 3;
    }
}

/// A classifier declaration handed to [`DTypeTableBuilder::declare`].
#[derive(Debug, Clone)]
pub struct DTypeDecl {
    name: String,
    is_abstract: bool,
    is_legacy: bool,
    kind: DTypeKind,
    parents: Vec<DType>,
}

impl DTypeDecl {
    /// A concrete classifier. Concrete classifiers are legacy-expressible
    /// unless told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            is_legacy: true,
            kind: DTypeKind::empty(),
            parents: Vec::new(),
        }
    }

    /// An abstract classifier, used for grouping (e.g. "integer").
    pub fn new_abstract(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: true,
            is_legacy: false,
            kind: DTypeKind::empty(),
            parents: Vec::new(),
        }
    }

    /// Add a direct parent. The parent must be abstract.
    pub fn parent(mut self, parent: DType) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn kind(mut self, kind: DTypeKind) -> Self {
        self.kind |= kind;
        self
    }

    /// Mark whether the legacy resolver can express this classifier.
    pub fn legacy(mut self, is_legacy: bool) -> Self {
        self.is_legacy = is_legacy;
        self
    }
}

/// Errors raised while building a [`DTypeTable`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DTypeTableError {
    #[error("a dtype named `{0}` is already declared")]
    DuplicateName(String),

    #[error("`{child}` cannot subclass `{parent}`: only abstract dtypes can be subclassed")]
    ConcreteParent { child: String, parent: String },

    #[error("`{child}` names a parent that was not declared in this table")]
    UnknownParent { child: String },
}

#[derive(Debug, Clone)]
struct DTypeInfo {
    is_abstract: bool,
    is_legacy: bool,
    kind: DTypeKind,
}

/// Incremental construction of a [`DTypeTable`].
///
/// Parents must be declared before their children, so the declared
/// hierarchy is always acyclic.
pub struct DTypeTableBuilder {
    names: DefaultStringInterner,
    infos: IndexMap<DefaultSymbol, DTypeInfo>,
    parents: Vec<Vec<DType>>,
}

impl DTypeTableBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            names: DefaultStringInterner::default(),
            infos: IndexMap::new(),
            parents: Vec::new(),
        };
        let symbol = builder.names.get_or_intern(ROOT_DTYPE_NAME);
        builder.infos.insert(
            symbol,
            DTypeInfo {
                is_abstract: true,
                is_legacy: false,
                kind: DTypeKind::empty(),
            },
        );
        builder.parents.push(Vec::new());
        builder
    }

    /// The implicit root classifier.
    pub fn root(&self) -> DType {
        DType(0)
    }

    /// Declare a classifier and return its handle.
    ///
    /// A declaration without parents is attached to the root.
    pub fn declare(&mut self, decl: DTypeDecl) -> Result<DType, DTypeTableError> {
        if self.names.get(&decl.name).is_some() {
            return Err(DTypeTableError::DuplicateName(decl.name));
        }
        for parent in &decl.parents {
            let Some((_, info)) = self.infos.get_index(parent.index()) else {
                return Err(DTypeTableError::UnknownParent { child: decl.name });
            };
            if !info.is_abstract {
                return Err(DTypeTableError::ConcreteParent {
                    parent: self.name_of(*parent).to_string(),
                    child: decl.name,
                });
            }
        }

        let symbol = self.names.get_or_intern(&decl.name);
        let (index, _) = self.infos.insert_full(
            symbol,
            DTypeInfo {
                is_abstract: decl.is_abstract,
                is_legacy: decl.is_legacy,
                kind: decl.kind,
            },
        );
        let parents = if decl.parents.is_empty() {
            vec![self.root()]
        } else {
            decl.parents
        };
        self.parents.push(parents);
        Ok(DType(index as u32))
    }

    fn name_of(&self, dtype: DType) -> &str {
        self.infos
            .get_index(dtype.index())
            .and_then(|(symbol, _)| self.names.resolve(*symbol))
            .unwrap_or("<unknown>")
    }

    /// Freeze the declarations and precompute the subclass closure.
    pub fn build(self) -> DTypeTable {
        let count = self.infos.len();
        let words = count.div_ceil(64);
        let mut ancestors: Vec<Box<[u64]>> = Vec::with_capacity(count);

        // Parents always precede children, so one forward pass is enough.
        for (index, parents) in self.parents.iter().enumerate() {
            let mut row = vec![0u64; words].into_boxed_slice();
            row[index / 64] |= 1u64 << (index % 64);
            for parent in parents {
                if parent.index() == index {
                    continue;
                }
                for (word, bits) in row.iter_mut().zip(ancestors[parent.index()].iter()) {
                    *word |= bits;
                }
            }
            ancestors.push(row);
        }

        DTypeTable {
            names: self.names,
            infos: self.infos,
            ancestors,
        }
    }
}

impl Default for DTypeTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The closed set of classifiers known to a group of operations.
pub struct DTypeTable {
    names: DefaultStringInterner,
    infos: IndexMap<DefaultSymbol, DTypeInfo>,
    ancestors: Vec<Box<[u64]>>,
}

impl DTypeTable {
    pub fn builder() -> DTypeTableBuilder {
        DTypeTableBuilder::new()
    }

    pub fn root(&self) -> DType {
        DType(0)
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Whether `dtype` was issued by this table.
    pub fn contains(&self, dtype: DType) -> bool {
        dtype.index() < self.infos.len()
    }

    pub fn lookup(&self, name: &str) -> Option<DType> {
        let symbol = self.names.get(name)?;
        self.infos.get_index_of(&symbol).map(|i| DType(i as u32))
    }

    pub fn name(&self, dtype: DType) -> &str {
        self.infos
            .get_index(dtype.index())
            .and_then(|(symbol, _)| self.names.resolve(*symbol))
            .unwrap_or("<unknown>")
    }

    fn info(&self, dtype: DType) -> Option<&DTypeInfo> {
        self.infos.get_index(dtype.index()).map(|(_, info)| info)
    }

    pub fn is_abstract(&self, dtype: DType) -> bool {
        self.info(dtype).is_some_and(|info| info.is_abstract)
    }

    pub fn is_legacy(&self, dtype: DType) -> bool {
        self.info(dtype).is_some_and(|info| info.is_legacy)
    }

    pub fn kind(&self, dtype: DType) -> DTypeKind {
        self.info(dtype).map_or(DTypeKind::empty(), |info| info.kind)
    }

    /// `child <: parent`, reflexive.
    pub fn is_subclass_of(&self, child: DType, parent: DType) -> bool {
        let Some(row) = self.ancestors.get(child.index()) else {
            return false;
        };
        let index = parent.index();
        row.get(index / 64)
            .is_some_and(|word| word & (1u64 << (index % 64)) != 0)
    }

    /// First classifier carrying every bit of `kind`.
    pub fn find_kind(&self, kind: DTypeKind) -> Option<DType> {
        self.infos
            .values()
            .position(|info| !info.is_abstract && info.kind.contains(kind))
            .map(|i| DType(i as u32))
    }

    /// The universal object classifier, if declared.
    pub fn object(&self) -> Option<DType> {
        self.find_kind(DTypeKind::OBJECT)
    }

    /// The boolean classifier, if declared.
    pub fn bool(&self) -> Option<DType> {
        self.find_kind(DTypeKind::BOOL)
    }

    /// Render a classifier for diagnostics.
    pub fn display(&self, dtype: DType) -> DisplayDType<'_> {
        DisplayDType { table: self, dtype }
    }
}

impl fmt::Debug for DTypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..self.len()).map(|i| self.name(DType(i as u32))))
            .finish()
    }
}

/// [`fmt::Display`] adapter returned by [`DTypeTable::display`].
pub struct DisplayDType<'a> {
    table: &'a DTypeTable,
    dtype: DType,
}

impl fmt::Display for DisplayDType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table.name(self.dtype))
    }
}
