//! Ufunc Explain
//!
//! Loads a dispatch scenario (classifiers, loops and calls) from TOML and
//! reports which kernel each call dispatches to, or why it fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use ufunc_explain::explain_str;
//!
//! let report = explain_str(&std::fs::read_to_string("add.toml")?)?;
//! println!("{report}");
//! ```

pub mod report;
pub mod scenario;

pub use report::{explain, CallReport, LoopKind, Outcome, Report};
pub use scenario::{Scenario, ScenarioFile};

use std::path::Path;

use thiserror::Error;
use ufunc_dispatch::{ConfigError, DTypeTableError, DispatchError};

/// Errors that can occur while loading or running a scenario.
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("unknown dtype `{0}`")]
    UnknownDType(String),

    #[error("invalid dtype declaration: {0}")]
    DType(#[from] DTypeTableError),

    #[error("invalid loop: {0}")]
    Registration(#[from] DispatchError),

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),
}

/// Result type for scenario operations.
pub type ExplainResult<T> = Result<T, ExplainError>;

/// Parse, build and run a scenario from TOML text.
pub fn explain_str(text: &str) -> ExplainResult<Report> {
    let scenario = Scenario::build(ScenarioFile::from_toml_str(text)?)?;
    explain(&scenario)
}

/// Parse, build and run a scenario file.
pub fn explain_file(path: impl AsRef<Path>) -> ExplainResult<Report> {
    explain_str(&std::fs::read_to_string(path)?)
}
