//! Submission lifecycle driver.
//!
//! Owns the transition logic between queue pickup and the stored result:
//! builds the sandbox request, runs attempts, decides what retries, and
//! always tears the container down before judging the outcome. Exactly one
//! sandbox execution is live per submission at any instant; retries are
//! strictly sequential.

use std::time::Duration;

use tracing::{error, info, warn};

use kodewar_common::types::{ExecutionResult, Submission};

use crate::config::SandboxDefaults;
use crate::error::ExecError;
use crate::evaluator;
use crate::languages;
use crate::sandbox::{Sandbox, SandboxRequest};

/// Total attempts per submission, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// What one execution attempt came to.
enum JobOutcome {
    /// A presentable result exists, passing or not.
    Done(ExecutionResult),
    /// Transient failure; another attempt may succeed.
    Retryable(ExecError),
    /// Deterministic failure; retrying would reproduce it.
    Terminal(ExecError),
}

fn outcome_from(err: ExecError) -> JobOutcome {
    if err.is_retryable() {
        JobOutcome::Retryable(err)
    } else {
        JobOutcome::Terminal(err)
    }
}

pub struct Orchestrator<S> {
    sandbox: S,
    defaults: SandboxDefaults,
}

impl<S: Sandbox> Orchestrator<S> {
    pub fn new(sandbox: S, defaults: SandboxDefaults) -> Self {
        Self { sandbox, defaults }
    }

    /// Drive one submission to a terminal result. Never fails: every error
    /// path collapses into an error-status result for the store.
    pub async fn process(&self, submission: &Submission) -> ExecutionResult {
        let mut attempt = 1u32;

        loop {
            match self.attempt(submission).await {
                JobOutcome::Done(result) => {
                    info!(
                        submission_id = %submission.id,
                        attempt,
                        passed = result.test_results.iter().filter(|t| t.passed).count(),
                        total = result.test_results.len(),
                        "submission finished"
                    );
                    return result;
                }
                JobOutcome::Terminal(err) => {
                    if err.is_security() {
                        error!(
                            target: "audit",
                            submission_id = %submission.id,
                            language = %submission.language,
                            error = %err,
                            "sandbox blocked a forbidden operation"
                        );
                    }
                    warn!(submission_id = %submission.id, attempt, error = %err, "submission failed");
                    return ExecutionResult::error(submission.id, err.to_string());
                }
                JobOutcome::Retryable(err) => {
                    if attempt >= MAX_ATTEMPTS {
                        error!(
                            submission_id = %submission.id,
                            attempts = attempt,
                            error = %err,
                            "retries exhausted"
                        );
                        return ExecutionResult::error(submission.id, err.to_string());
                    }
                    warn!(
                        submission_id = %submission.id,
                        attempt,
                        retry_in_secs = RETRY_DELAY.as_secs(),
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One sandbox execution: create, run, clean up, judge. Cleanup runs on
    /// every path where a container came to exist, before the outcome is
    /// settled.
    async fn attempt(&self, submission: &Submission) -> JobOutcome {
        let request = self.build_request(submission);

        let handle = match self.sandbox.create(&request).await {
            Ok(handle) => handle,
            Err(err) => return outcome_from(err),
        };

        let run_result = self
            .sandbox
            .run(&handle, Duration::from_secs(submission.timeout_secs))
            .await;

        self.sandbox.cleanup(&handle).await;

        match run_result {
            Ok(run) if run.exit_code == 0 => {
                let test_results = evaluator::evaluate(&submission.test_cases, &run.output);
                JobOutcome::Done(ExecutionResult::success(
                    submission.id,
                    run.output,
                    test_results,
                ))
            }
            Ok(run) => {
                // The submitted code failed on its own; its diagnostics are
                // the error text.
                JobOutcome::Terminal(ExecError::user_code(format!(
                    "exited with status {}: {}",
                    run.exit_code,
                    run.output.trim_end()
                )))
            }
            Err(err) => outcome_from(err),
        }
    }

    fn build_request(&self, submission: &Submission) -> SandboxRequest {
        let spec = languages::spec_for(submission.language);
        let inputs: Vec<&str> = submission
            .test_cases
            .iter()
            .map(|tc| tc.input.as_str())
            .collect();

        SandboxRequest {
            image: spec.image.to_string(),
            command: languages::build_command(submission.language),
            env: languages::build_env(&submission.code, &inputs.join("\n")),
            resources: self.defaults.resource_config(submission.memory_limit_mb),
        }
    }
}
