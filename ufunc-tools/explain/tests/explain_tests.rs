//! Integration tests for scenario loading and reporting.

use std::io::Write;

use pretty_assertions::assert_eq;
use ufunc_explain::{explain_file, explain_str, ExplainError, LoopKind, Outcome, Report};

const ADD: &str = include_str!("../scenarios/add.toml");
const LOGICAL: &str = include_str!("../scenarios/logical.toml");
const COMPARISON: &str = include_str!("../scenarios/comparison.toml");

fn kernels(report: &Report) -> Vec<Option<&str>> {
    report.calls.iter().map(|call| call.outcome.kernel()).collect()
}

#[test]
fn test_add_scenario() {
    let report = explain_str(ADD).unwrap();

    assert_eq!(report.operation, "add");
    assert_eq!(
        report.loops.iter().map(|l| l.kind).collect::<Vec<_>>(),
        vec![
            LoopKind::LegacyKernel,
            LoopKind::LegacyKernel,
            LoopKind::Kernel,
            LoopKind::Promoter,
        ]
    );
    assert_eq!(
        kernels(&report),
        vec![
            Some("add_legacy_int32_int32_int32"),
            Some("add_float64"),
            Some("add_float64"),
            Some("add_legacy_int64_int64_int64"),
            Some("add_legacy_int64_int64_int64"),
            Some("add_legacy_int32_int32_int32"),
        ]
    );

    // The repeated call is answered from the cache.
    assert_eq!(report.calls[1].cache_entries, report.calls[2].cache_entries);

    match &report.calls[3].outcome {
        Outcome::Dispatched { signature, .. } => {
            assert_eq!(signature, "(int64, int64, int64)");
        }
        other => panic!("Expected Dispatched, got {:?}", other),
    }
}

#[test]
fn test_logical_scenario() {
    let report = explain_str(LOGICAL).unwrap();

    assert_eq!(
        kernels(&report),
        vec![Some("logical_and_bool"), Some("logical_and_object"), None]
    );
    match &report.calls[2].outcome {
        Outcome::Failed {
            error,
            registration_defect,
        } => {
            assert!(error.contains("(str, bool, _)"), "unexpected error: {error}");
            assert!(!registration_defect);
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}

#[test]
fn test_comparison_output_is_overridden() {
    let report = explain_str(COMPARISON).unwrap();

    assert_eq!(
        kernels(&report),
        vec![Some("less_float64"), Some("less_float64")]
    );
    match &report.calls[1].outcome {
        Outcome::Dispatched { signature, .. } => {
            assert_eq!(signature, "(float64, float64, bool)");
        }
        other => panic!("Expected Dispatched, got {:?}", other),
    }
}

#[test]
fn test_text_report() {
    let report = explain_str(LOGICAL).unwrap();
    let text = report.to_string();

    assert!(text.starts_with("logical_and (2 in, 1 out), 3 loops\n"));
    assert!(text.contains("  -> logical_and_bool\n"));
    assert!(text.contains("  !! `logical_and` did not contain a loop"));
}

#[test]
fn test_json_report() {
    let report = explain_str(COMPARISON).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["operation"], "less");
    assert_eq!(json["calls"][0]["outcome"]["status"], "dispatched");
    assert_eq!(json["calls"][0]["outcome"]["kernel"], "less_float64");
}

#[test]
fn test_unknown_dtype() {
    let err = explain_str(
        r#"
[[loops]]
types = ["int32", "int32", "int32"]
kernel = "add"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ExplainError::UnknownDType(ref name) if name == "int32"));
}

#[test]
fn test_loop_needs_one_implementation() {
    let err = explain_str(
        r#"
[[dtypes]]
name = "int32"

[[loops]]
types = ["int32", "int32", "int32"]
kernel = "add"
promoter = "homogeneous"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ExplainError::InvalidScenario(_)));
}

#[test]
fn test_duplicate_loop_is_rejected() {
    let err = explain_str(
        r#"
[[dtypes]]
name = "int32"

[[loops]]
types = ["int32", "int32", "int32"]
kernel = "first"

[[loops]]
types = ["int32", "int32", "int32"]
kernel = "second"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ExplainError::Registration(_)));
}

#[test]
fn test_zero_depth_is_rejected() {
    let err = explain_str(
        r#"
[config]
max_promotion_depth = 0
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ExplainError::Config(_)));
}

#[test]
fn test_wrong_operand_count() {
    let err = explain_str(
        r#"
[[dtypes]]
name = "int32"

[[calls]]
operands = ["int32"]
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ExplainError::InvalidScenario(_)));
}

#[test]
fn test_explain_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(LOGICAL.as_bytes()).unwrap();

    let report = explain_file(file.path()).unwrap();
    assert_eq!(report.calls.len(), 3);
}
