use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Languages the platform can execute. The sandbox image and interpreter
/// invocation for each live in the worker's dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
}

impl Language {
    /// All supported languages, in a stable order.
    pub fn all_variants() -> Vec<Language> {
        vec![Language::Python, Language::Javascript]
    }

    /// Parse a language from its wire name (case-insensitive).
    pub fn from_str(s: &str) -> Option<Language> {
        match s.to_lowercase().as_str() {
            "python" => Some(Language::Python),
            "javascript" => Some(Language::Javascript),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::Javascript => write!(f, "javascript"),
        }
    }
}

/// One test case: stdin in, expected stdout line out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected: String,
}

/// A validated submission. This is also the queue payload handed to workers,
/// immutable once enqueued. Ids are unique and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub code: String,
    pub language: Language,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    pub created_at: DateTime<Utc>,
}

pub fn default_timeout_secs() -> u64 {
    30
}

pub fn default_memory_limit_mb() -> u64 {
    512
}

/// Client-visible lifecycle states. Execution is worker-internal, so clients
/// observe `pending` until a terminal status lands in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Success,
    Error,
}

/// Outcome of one test case, aligned positionally with the submission's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

/// The stored snapshot for a submission. Every transition replaces the whole
/// record, so readers always see one coherent state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub submission_id: Uuid,
    pub status: SubmissionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_results: Vec<TestCaseResult>,
}

impl ExecutionResult {
    pub fn pending(submission_id: Uuid) -> Self {
        Self {
            submission_id,
            status: SubmissionStatus::Pending,
            output: None,
            error: None,
            test_results: Vec::new(),
        }
    }

    pub fn success(submission_id: Uuid, output: String, test_results: Vec<TestCaseResult>) -> Self {
        Self {
            submission_id,
            status: SubmissionStatus::Success,
            output: Some(output),
            error: None,
            test_results,
        }
    }

    pub fn error(submission_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            submission_id,
            status: SubmissionStatus::Error,
            output: None,
            error: Some(error.into()),
            test_results: Vec::new(),
        }
    }
}
