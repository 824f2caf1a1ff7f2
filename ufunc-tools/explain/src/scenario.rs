//! Scenario files.
//!
//! A scenario declares a classifier hierarchy, one operation with its loops
//! and a list of calls to explain:
//!
//! ```toml
//! [[dtypes]]
//! name = "int32"
//! kind = ["numeric"]
//!
//! [[dtypes]]
//! name = "float64"
//! kind = ["numeric"]
//!
//! [[promotions]]
//! pair = ["int32", "float64"]
//! result = "float64"
//!
//! [operation]
//! name = "add"
//! nin = 2
//! nout = 1
//!
//! [[loops]]
//! types = ["float64", "float64", "float64"]
//! kernel = "add_f64"
//!
//! [[loops]]
//! types = ["*", "*", "*"]
//! promoter = "homogeneous"
//!
//! [[calls]]
//! operands = ["int32", "float64", "_"]
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use ufunc_dispatch::dtype::ROOT_DTYPE_NAME;
use ufunc_dispatch::{
    homogeneous_promoter, install_logical_promoter, logical_promoter, object_only_promoter,
    Casting, CommonDType, DType, DTypeDecl, DTypeKind, DTypeTable, DispatchConfig, Kernel, LegacyError,
    LegacyResolver, Operand, Operation, OperationFlags, PromotionTable, Promoter, Signature, Slot,
    TypeVector,
};

use crate::{ExplainError, ExplainResult};

/// Placeholder for a wildcard loop slot.
pub const WILDCARD: &str = "*";
/// Placeholder for an unset operand or signature slot.
pub const UNSET: &str = "_";

/// A parsed scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioFile {
    pub config: DispatchConfig,
    pub dtypes: Vec<DTypeSpec>,
    pub promotions: Vec<PromotionSpec>,
    pub operation: OperationSpec,
    pub loops: Vec<LoopSpec>,
    pub calls: Vec<CallSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DTypeSpec {
    pub name: String,
    #[serde(rename = "abstract")]
    pub is_abstract: bool,
    pub parents: Vec<String>,
    pub kind: Vec<KindSpec>,
    /// Defaults to `true` for concrete dtypes.
    pub legacy: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindSpec {
    Bool,
    Numeric,
    String,
    Object,
}

impl From<KindSpec> for DTypeKind {
    fn from(kind: KindSpec) -> Self {
        match kind {
            KindSpec::Bool => DTypeKind::BOOL,
            KindSpec::Numeric => DTypeKind::NUMERIC,
            KindSpec::String => DTypeKind::STRING,
            KindSpec::Object => DTypeKind::OBJECT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionSpec {
    pub pair: [String; 2],
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationSpec {
    pub name: String,
    pub nin: usize,
    pub nout: usize,
    pub binary_comparison: bool,
    /// Register the logical promoter for every call.
    pub logical: bool,
    pub legacy: Option<LegacySpec>,
}

impl Default for OperationSpec {
    fn default() -> Self {
        Self {
            name: "ufunc".to_string(),
            nin: 2,
            nout: 1,
            binary_comparison: false,
            logical: false,
            legacy: None,
        }
    }
}

/// A legacy resolver that joins the inputs through the promotion table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacySpec {
    /// Forced output dtype; outputs take the joined input dtype otherwise.
    pub output: Option<String>,
    /// Scalars whose magnitude is below this adopt the other input's dtype.
    pub scalar_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSpec {
    pub types: Vec<String>,
    #[serde(default)]
    pub kernel: Option<String>,
    #[serde(default)]
    pub promoter: Option<PromoterSpec>,
    #[serde(default)]
    pub legacy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromoterSpec {
    Homogeneous,
    ObjectOnly,
    Logical,
}

impl PromoterSpec {
    fn build(self) -> Promoter {
        match self {
            PromoterSpec::Homogeneous => homogeneous_promoter(),
            PromoterSpec::ObjectOnly => object_only_promoter(),
            PromoterSpec::Logical => logical_promoter(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CallSpec {
    pub operands: Vec<String>,
    /// Zero-dimensional operands and their values.
    pub scalars: Vec<ScalarSpec>,
    pub signature: Vec<String>,
    pub force_legacy: bool,
    pub reduce_compatible: bool,
    pub allow_legacy: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScalarSpec {
    pub index: usize,
    pub value: f64,
}

impl ScenarioFile {
    pub fn from_toml_str(text: &str) -> ExplainResult<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// A scenario with its classifier table and operation built.
#[derive(Debug)]
pub struct Scenario {
    pub file: ScenarioFile,
    pub dtypes: IndexMap<String, DType>,
    pub operation: Operation,
}

impl Scenario {
    pub fn build(file: ScenarioFile) -> ExplainResult<Self> {
        let mut builder = DTypeTable::builder();
        let mut dtypes = IndexMap::new();
        dtypes.insert(ROOT_DTYPE_NAME.to_string(), builder.root());
        for spec in &file.dtypes {
            let mut decl = if spec.is_abstract {
                DTypeDecl::new_abstract(&spec.name)
            } else {
                DTypeDecl::new(&spec.name)
            };
            for parent in &spec.parents {
                decl = decl.parent(lookup(&dtypes, parent)?);
            }
            for kind in &spec.kind {
                decl = decl.kind((*kind).into());
            }
            if let Some(legacy) = spec.legacy {
                decl = decl.legacy(legacy);
            }
            dtypes.insert(spec.name.clone(), builder.declare(decl)?);
        }
        let table = Arc::new(builder.build());
        file.config.validate()?;

        let mut promotion = PromotionTable::new();
        for spec in &file.promotions {
            promotion.insert(
                lookup(&dtypes, &spec.pair[0])?,
                lookup(&dtypes, &spec.pair[1])?,
                lookup(&dtypes, &spec.result)?,
            );
        }
        let promotion = Arc::new(promotion);

        let op_spec = &file.operation;
        let mut flags = OperationFlags::empty();
        if op_spec.binary_comparison {
            flags |= OperationFlags::BINARY_COMPARISON;
        }
        let mut operation = Operation::new(&op_spec.name, op_spec.nin, op_spec.nout, table)
            .with_flags(flags)
            .with_config(file.config.clone())
            .with_common_dtype(Arc::clone(&promotion) as Arc<dyn CommonDType>);
        if let Some(legacy) = &op_spec.legacy {
            let output = legacy
                .output
                .as_deref()
                .map(|name| lookup(&dtypes, name))
                .transpose()?;
            operation = operation.with_legacy_resolver(Arc::new(JoinLegacy {
                promotion,
                nin: op_spec.nin,
                nout: op_spec.nout,
                output,
                scalar_threshold: legacy.scalar_threshold,
            }));
        }

        for spec in &file.loops {
            register_loop(&operation, &dtypes, spec)?;
        }
        if op_spec.logical {
            install_logical_promoter(&operation)?;
        }

        Ok(Self {
            file,
            dtypes,
            operation,
        })
    }

    /// Parse a call's operand list into dtypes and operand values.
    pub fn operands(&self, call: &CallSpec) -> ExplainResult<(TypeVector, Vec<Option<Operand>>)> {
        let dtypes = self.parse_vector(&call.operands)?;
        let operands = dtypes
            .iter()
            .enumerate()
            .map(|(i, dtype)| {
                dtype.map(|dtype| match call.scalars.iter().find(|s| s.index == i) {
                    Some(scalar) => Operand::scalar(dtype, scalar.value),
                    None => Operand::array(dtype, 1),
                })
            })
            .collect();
        Ok((dtypes, operands))
    }

    /// Parse a call's signature; an omitted signature is fully unset.
    pub fn signature(&self, call: &CallSpec) -> ExplainResult<Signature> {
        if call.signature.is_empty() {
            return Ok(Signature::unset(self.operation.nargs()));
        }
        Ok(Signature::new(self.parse_vector(&call.signature)?.as_slice().to_vec()))
    }

    fn parse_vector(&self, names: &[String]) -> ExplainResult<TypeVector> {
        let nargs = self.operation.nargs();
        if names.len() != nargs {
            return Err(ExplainError::InvalidScenario(format!(
                "expected {nargs} entries, got {}",
                names.len()
            )));
        }
        names
            .iter()
            .map(|name| match name.as_str() {
                UNSET => Ok(None),
                name => lookup(&self.dtypes, name).map(Some),
            })
            .collect::<ExplainResult<Vec<_>>>()
            .map(TypeVector::from)
    }
}

fn lookup(dtypes: &IndexMap<String, DType>, name: &str) -> ExplainResult<DType> {
    dtypes
        .get(name)
        .copied()
        .ok_or_else(|| ExplainError::UnknownDType(name.to_string()))
}

fn register_loop(
    operation: &Operation,
    dtypes: &IndexMap<String, DType>,
    spec: &LoopSpec,
) -> ExplainResult<()> {
    let tuple = spec
        .types
        .iter()
        .map(|name| match name.as_str() {
            WILDCARD => Ok(Slot::Wildcard),
            name => lookup(dtypes, name).map(Slot::Fixed),
        })
        .collect::<ExplainResult<Vec<_>>>()?;

    match (&spec.kernel, spec.promoter, spec.legacy) {
        (None, None, true) => {
            let concrete: Vec<DType> = tuple.iter().filter_map(|slot| slot.dtype()).collect();
            if concrete.len() != tuple.len() {
                return Err(ExplainError::InvalidScenario(
                    "legacy loops cannot contain wildcards".to_string(),
                ));
            }
            operation.add_legacy_wrapping_loop(&concrete, false)?;
        }
        (Some(kernel), None, false) => {
            operation.register(&tuple, Kernel::new(kernel.as_str()), false)?;
        }
        (None, Some(promoter), false) => {
            operation.register(&tuple, promoter.build(), false)?;
        }
        _ => {
            return Err(ExplainError::InvalidScenario(format!(
                "loop {:?} must name exactly one of `kernel`, `promoter` or `legacy`",
                spec.types
            )));
        }
    }
    Ok(())
}

/// Joins the inputs through the promotion table, with value-based handling
/// of small scalars.
struct JoinLegacy {
    promotion: Arc<PromotionTable>,
    nin: usize,
    nout: usize,
    output: Option<DType>,
    scalar_threshold: Option<f64>,
}

impl JoinLegacy {
    fn is_small_scalar(&self, operand: &Operand) -> bool {
        match (self.scalar_threshold, operand.value) {
            (Some(threshold), Some(value)) => operand.is_scalar() && value.abs() < threshold,
            _ => false,
        }
    }
}

impl LegacyResolver for JoinLegacy {
    fn resolve(
        &self,
        type_tuple: Option<&[Option<DType>]>,
        operands: &[Option<Operand>],
        _casting: Casting,
    ) -> Result<Vec<DType>, LegacyError> {
        let fixed = |i: usize| type_tuple.and_then(|tuple| tuple.get(i).copied().flatten());

        let all_small = operands
            .iter()
            .take(self.nin)
            .flatten()
            .all(|operand| self.is_small_scalar(operand));
        let mut inputs = Vec::with_capacity(self.nin);
        for i in 0..self.nin {
            if let Some(dtype) = fixed(i) {
                inputs.push(dtype);
                continue;
            }
            match operands.get(i).copied().flatten() {
                Some(operand) if all_small || !self.is_small_scalar(&operand) => {
                    inputs.push(operand.dtype)
                }
                Some(_) => {}
                None => return Err(LegacyError::new(format!("input {i} is missing"))),
            }
        }

        let (first, rest) = inputs
            .split_first()
            .ok_or_else(|| LegacyError::new("no inputs"))?;
        let common = rest
            .iter()
            .try_fold(*first, |acc, next| self.promotion.join(acc, *next))
            .ok_or_else(|| LegacyError::new("inputs have no common dtype"))?;

        let mut answer = vec![common; self.nin];
        for (i, slot) in answer.iter_mut().enumerate() {
            if let Some(dtype) = fixed(i) {
                *slot = dtype;
            }
        }
        for i in self.nin..self.nin + self.nout {
            answer.push(self.output.or(fixed(i)).unwrap_or(common));
        }
        Ok(answer)
    }
}
