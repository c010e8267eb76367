//! Result report: project -> suite -> case -> step -> assertion
//!
//! Both backends produce this structure. The remote service sends it as
//! camelCase JSON; missing collections default to empty.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Initialized,
    Running,
    Finished,
    Failed,
    Canceled,
    Warning,
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    /// The execution will not change state any more. Unrecognized states
    /// are treated as still in progress.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Finished
                | ExecutionStatus::Failed
                | ExecutionStatus::Canceled
                | ExecutionStatus::Warning
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Initialized => "INITIALIZED",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Finished => "FINISHED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Canceled => "CANCELED",
            ExecutionStatus::Warning => "WARNING",
            ExecutionStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertionStatus {
    Ok,
    Failed,
    #[serde(other)]
    Unknown,
}

impl AssertionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionStatus::Ok => "OK",
            AssertionStatus::Failed => "FAILED",
            AssertionStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectResultReport {
    #[serde(default)]
    pub project_name: String,
    pub status: ExecutionStatus,
    #[serde(rename = "executionID", default)]
    pub execution_id: String,
    /// Epoch milliseconds
    #[serde(default)]
    pub start_time: u64,
    /// Milliseconds
    #[serde(default)]
    pub time_taken: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(default)]
    pub test_suite_result_reports: Vec<TestSuiteResultReport>,
}

impl ProjectResultReport {
    /// Every case, flattened across suites in order
    pub fn case_reports(&self) -> impl Iterator<Item = &TestCaseResultReport> {
        self.test_suite_result_reports
            .iter()
            .flat_map(|suite| suite.test_case_result_reports.iter())
    }

    pub fn case_reports_mut(&mut self) -> impl Iterator<Item = &mut TestCaseResultReport> {
        self.test_suite_result_reports
            .iter_mut()
            .flat_map(|suite| suite.test_case_result_reports.iter_mut())
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Finished
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteResultReport {
    #[serde(default)]
    pub test_suite_name: String,
    pub test_suite_status: ExecutionStatus,
    #[serde(default)]
    pub test_case_result_reports: Vec<TestCaseResultReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResultReport {
    #[serde(default)]
    pub test_case_name: String,
    pub test_case_status: ExecutionStatus,
    /// Final property bag of the case
    #[serde(default)]
    pub properties: HashMap<String, String>,
    #[serde(default)]
    pub test_step_result_reports: Vec<TestStepResultReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepResultReport {
    #[serde(default)]
    pub test_step_name: String,
    pub assertion_status: AssertionStatus,
    #[serde(default)]
    pub time_taken: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(default)]
    pub assertion_results: Vec<AssertionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: AssertionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
