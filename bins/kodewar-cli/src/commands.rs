// CLI commands for submitting code and reading results
use anyhow::{bail, Context, Result};
use chrono::Utc;
use redis::aio::ConnectionManager;
use std::fs;
use std::time::Duration;
use uuid::Uuid;

use kodewar_common::queue::{self, QueueLane};
use kodewar_common::store;
use kodewar_common::types::{
    ExecutionResult, Language, Submission, SubmissionStatus, TestCase,
};

/// How long `--follow` polls before giving up.
const FOLLOW_POLL_INTERVAL: Duration = Duration::from_secs(1);
const FOLLOW_MAX_POLLS: u32 = 300;

async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(redis_url)
        .context("Failed to create Redis client")?;
    client
        .get_connection_manager()
        .await
        .context("Failed to connect to Redis")
}

/// Submit a source file for execution
pub async fn submit(
    redis_url: &str,
    file: &str,
    language: &str,
    tests: Option<&str>,
    timeout: u64,
    memory_limit: u64,
    follow: bool,
) -> Result<()> {
    let code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read source file: {}", file))?;

    let Some(language) = Language::from_str(language) else {
        let supported: Vec<String> = Language::all_variants()
            .iter()
            .map(|l| l.to_string())
            .collect();
        bail!(
            "Unsupported language '{}' (expected one of: {})",
            language,
            supported.join(", ")
        );
    };

    let test_cases: Vec<TestCase> = match tests {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read test case file: {}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse test cases in {}", path))?
        }
        None => Vec::new(),
    };

    let submission = Submission {
        id: Uuid::new_v4(),
        code,
        language,
        test_cases,
        timeout_secs: timeout,
        memory_limit_mb: memory_limit,
        created_at: Utc::now(),
    };

    println!("🚀 Submitting {} ({} test cases)", file, submission.test_cases.len());

    let mut conn = connect(redis_url).await?;

    // Pending record goes in first so a status query never misses.
    store::write_result(&mut conn, &ExecutionResult::pending(submission.id))
        .await
        .context("Failed to write pending record")?;
    queue::enqueue(&mut conn, QueueLane::CodeExecution, &submission)
        .await
        .context("Failed to enqueue submission")?;

    println!("✅ Submission queued: {}", submission.id);

    if follow {
        println!("⏳ Waiting for result...");
        let result = wait_for_result(&mut conn, &submission.id).await?;
        print_result(&result);
    } else {
        println!("\n📋 Check progress with: kodewar-cli status {}", submission.id);
    }

    Ok(())
}

/// Fetch and print the stored result for a submission
pub async fn status(redis_url: &str, submission_id: &str) -> Result<()> {
    let submission_id = Uuid::parse_str(submission_id)
        .with_context(|| format!("Invalid submission id: {}", submission_id))?;

    let mut conn = connect(redis_url).await?;

    match store::read_result(&mut conn, &submission_id)
        .await
        .context("Failed to query result store")?
    {
        Some(result) => {
            print_result(&result);
            Ok(())
        }
        None => bail!(
            "No submission found for id {} (unknown or expired)",
            submission_id
        ),
    }
}

/// Poll the store until the submission leaves `pending`.
async fn wait_for_result(
    conn: &mut ConnectionManager,
    submission_id: &Uuid,
) -> Result<ExecutionResult> {
    for _ in 0..FOLLOW_MAX_POLLS {
        if let Some(result) = store::read_result(conn, submission_id)
            .await
            .context("Failed to query result store")?
        {
            if result.status != SubmissionStatus::Pending {
                return Ok(result);
            }
        }
        tokio::time::sleep(FOLLOW_POLL_INTERVAL).await;
    }

    bail!("Timed out waiting for submission {} to finish", submission_id)
}

fn print_result(result: &ExecutionResult) {
    match result.status {
        SubmissionStatus::Pending => {
            println!("⏳ Submission {} is still pending", result.submission_id);
        }
        SubmissionStatus::Success => {
            println!("✅ Submission {} finished", result.submission_id);

            if let Some(output) = &result.output {
                if !output.is_empty() {
                    println!("\nOutput:\n{}", output);
                }
            }

            if !result.test_results.is_empty() {
                println!("\nTest cases:");
                let mut passed = 0;
                for (idx, case) in result.test_results.iter().enumerate() {
                    if case.passed {
                        passed += 1;
                        println!("  ✓ case {} passed", idx + 1);
                    } else {
                        println!(
                            "  ✗ case {} failed: expected {:?}, got {:?}",
                            idx + 1,
                            case.expected,
                            case.actual
                        );
                    }
                }
                println!("\n{}/{} test cases passed", passed, result.test_results.len());
            }
        }
        SubmissionStatus::Error => {
            println!("❌ Submission {} failed", result.submission_id);
            if let Some(error) = &result.error {
                println!("\n{}", error);
            }
        }
    }
}
