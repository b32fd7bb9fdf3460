//! Fixture formats and per-case pass/fail evaluation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of fixture file a consumer can replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureFormat {
    StateTest,
    BlockchainTest,
}

impl FixtureFormat {
    pub fn label(self) -> &'static str {
        match self {
            Self::StateTest => "State",
            Self::BlockchainTest => "Blockchain",
        }
    }
}

impl fmt::Display for FixtureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateTest => f.write_str("state_test"),
            Self::BlockchainTest => f.write_str("blockchain_test"),
        }
    }
}

/// One entry of the JSON list a client prints after running a fixture file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub pass: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork: Option<String>,
}

/// A case that did not pass, with the client's raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFailure {
    pub name: String,
    pub error: String,
}

/// Structured fixture-consumption failures.
#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("{} test failed: \n{}", .format.label(), render_failures(.failures))]
    CasesFailed {
        format: FixtureFormat,
        failures: Vec<CaseFailure>,
    },

    #[error("Test result for {name} missing")]
    MissingCase { name: String },

    #[error("Multiple test results for {name}")]
    DuplicateCase { name: String },

    #[error("Fixture format {format} not supported by {binary}")]
    UnsupportedFormat {
        format: FixtureFormat,
        binary: String,
    },
}

fn render_failures(failures: &[CaseFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.name, failure.error))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fail with every non-passing case, or succeed when all cases pass.
pub fn check_all_passed(format: FixtureFormat, results: &[CaseResult]) -> Result<(), ConsumeError> {
    let failures: Vec<CaseFailure> = results
        .iter()
        .filter(|result| !result.pass)
        .map(|result| CaseFailure {
            name: result.name.clone(),
            error: result.error.clone().unwrap_or_default(),
        })
        .collect();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ConsumeError::CasesFailed { format, failures })
    }
}

/// Select exactly one case named `name` and require it to pass.
pub fn check_one_passed(
    format: FixtureFormat,
    results: &[CaseResult],
    name: &str,
) -> Result<(), ConsumeError> {
    let matching: Vec<&CaseResult> = results.iter().filter(|result| result.name == name).collect();
    match matching.as_slice() {
        [] => Err(ConsumeError::MissingCase {
            name: name.to_string(),
        }),
        [single] => check_all_passed(format, std::slice::from_ref(*single)),
        _ => Err(ConsumeError::DuplicateCase {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(name: &str, pass: bool, error: Option<&str>) -> CaseResult {
        CaseResult {
            name: name.to_string(),
            pass,
            error: error.map(str::to_string),
            fork: None,
        }
    }

    #[test]
    fn aggregate_lists_only_failing_cases() {
        let results = vec![
            case("tests/cancun/ok_one", true, None),
            case("tests/cancun/broken", false, Some("unexpected state root")),
            case("tests/cancun/ok_two", true, Some("")),
        ];
        let err = check_all_passed(FixtureFormat::StateTest, &results).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("State test failed: \n"));
        assert!(message.contains("tests/cancun/broken: unexpected state root"));
        assert!(!message.contains("ok_one"));
        assert!(!message.contains("ok_two"));
    }

    #[test]
    fn aggregate_reports_every_failure() {
        let results = vec![
            case("a", false, Some("first")),
            case("b", false, Some("second")),
        ];
        match check_all_passed(FixtureFormat::BlockchainTest, &results).unwrap_err() {
            ConsumeError::CasesFailed { format, failures } => {
                assert_eq!(format, FixtureFormat::BlockchainTest);
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[1].error, "second");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn all_passing_is_ok() {
        let results = vec![case("a", true, None), case("b", true, None)];
        assert!(check_all_passed(FixtureFormat::StateTest, &results).is_ok());
    }

    #[test]
    fn single_case_must_exist_once() {
        let results = vec![case("a", true, None), case("dup", true, None), case("dup", false, None)];
        assert!(check_one_passed(FixtureFormat::StateTest, &results, "a").is_ok());
        assert!(matches!(
            check_one_passed(FixtureFormat::StateTest, &results, "missing"),
            Err(ConsumeError::MissingCase { .. })
        ));
        assert!(matches!(
            check_one_passed(FixtureFormat::StateTest, &results, "dup"),
            Err(ConsumeError::DuplicateCase { .. })
        ));
    }

    #[test]
    fn single_failing_case_reports_its_error() {
        let results = vec![case("a", false, Some("gas mismatch")), case("b", false, Some("other"))];
        let err = check_one_passed(FixtureFormat::StateTest, &results, "a").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("a: gas mismatch"));
        assert!(!message.contains("other"));
    }

    #[test]
    fn case_results_parse_without_error_field() {
        let results: Vec<CaseResult> = serde_json::from_str(
            r#"[{"name":"x","pass":true,"fork":"Cancun","stateRoot":"0x00"}]"#,
        )
        .expect("parse");
        assert_eq!(results[0].error, None);
        assert_eq!(results[0].fork.as_deref(), Some("Cancun"));
    }
}
