pub mod queue;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use queue::QueueLane;
pub use types::{ExecutionResult, Language, Submission, SubmissionStatus, TestCase, TestCaseResult};
