/// End-to-end pipeline tests over real Docker and Redis.
///
/// These exercise the whole path: queue pickup, sandbox execution,
/// evaluation, and the stored result. They need a local Docker daemon
/// with the kodewar-python image plus a Redis on the default port, so
/// every test is ignored by default.
///
/// Run with: cargo test -p kodewar-worker -- --ignored
use std::time::{Duration, Instant};

use bollard::container::ListContainersOptions;
use bollard::Docker;
use chrono::Utc;
use uuid::Uuid;

use kodewar_common::queue::{self, QueueLane};
use kodewar_common::store;
use kodewar_common::types::{Language, Submission, SubmissionStatus, TestCase};

use crate::config::SandboxDefaults;
use crate::docker::DockerSandbox;
use crate::orchestrator::Orchestrator;

const REDIS_URL: &str = "redis://127.0.0.1:6379";

fn make_case(input: &str, expected: &str) -> TestCase {
    TestCase {
        input: input.to_string(),
        expected: expected.to_string(),
    }
}

fn make_submission(code: &str, test_cases: Vec<TestCase>) -> Submission {
    Submission {
        id: Uuid::new_v4(),
        code: code.to_string(),
        language: Language::Python,
        test_cases,
        timeout_secs: 10,
        memory_limit_mb: 128,
        created_at: Utc::now(),
    }
}

fn make_orchestrator() -> Orchestrator<DockerSandbox> {
    let sandbox = DockerSandbox::connect().expect("Failed to connect to Docker");
    Orchestrator::new(sandbox, SandboxDefaults::default())
}

async fn redis_conn() -> redis::aio::ConnectionManager {
    let client = redis::Client::open(REDIS_URL).expect("Failed to create Redis client");
    client
        .get_connection_manager()
        .await
        .expect("Failed to connect to Redis")
}

async fn running_container_count(docker: &Docker) -> usize {
    docker
        .list_containers(Some(ListContainersOptions::<String>::default()))
        .await
        .expect("Failed to list containers")
        .len()
}

/// Test: the canonical passing submission
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_double_function_passes_its_case() {
    let orchestrator = make_orchestrator();
    let submission = make_submission(
        "print(int(input()) * 2)",
        vec![make_case("2", "4")],
    );

    let result = orchestrator.process(&submission).await;

    assert_eq!(result.status, SubmissionStatus::Success);
    assert_eq!(result.test_results.len(), 1);
    assert!(result.test_results[0].passed);
    assert_eq!(result.test_results[0].actual, "4");
}

/// Test: inputs arrive one per line, outputs align positionally
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_multiple_cases_align_by_line() {
    let orchestrator = make_orchestrator();
    let submission = make_submission(
        r#"
import sys
for line in sys.stdin:
    print(int(line) * 2)
"#,
        vec![make_case("1", "2"), make_case("2", "4"), make_case("3", "6")],
    );

    let result = orchestrator.process(&submission).await;

    assert_eq!(result.status, SubmissionStatus::Success);
    assert_eq!(result.test_results.len(), 3);
    assert!(result.test_results.iter().all(|t| t.passed));
}

/// Test: a wrong answer is still a clean run, with the real output recorded
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_wrong_answer_reports_actual_output() {
    let orchestrator = make_orchestrator();
    let submission = make_submission(
        "print(int(input()) * 2)",
        vec![make_case("2", "5")],
    );

    let result = orchestrator.process(&submission).await;

    assert_eq!(result.status, SubmissionStatus::Success);
    assert!(!result.test_results[0].passed);
    assert_eq!(result.test_results[0].actual, "4");
    assert_eq!(result.test_results[0].expected, "5");
}

/// Test: code with no test cases just returns its output
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_plain_output_without_cases() {
    let orchestrator = make_orchestrator();
    let submission = make_submission(r#"print("Hello, World!")"#, Vec::new());

    let result = orchestrator.process(&submission).await;

    assert_eq!(result.status, SubmissionStatus::Success);
    assert!(result.output.unwrap().contains("Hello, World!"));
    assert!(result.test_results.is_empty());
}

/// Test: a syntax error surfaces the interpreter's diagnostics
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_syntax_error_surfaces_diagnostics() {
    let orchestrator = make_orchestrator();
    let submission = make_submission("print(", vec![make_case("2", "4")]);

    let result = orchestrator.process(&submission).await;

    assert_eq!(result.status, SubmissionStatus::Error);
    assert!(result.error.unwrap().contains("SyntaxError"));
}

/// Test: breaching the memory ceiling is a terminal resource error
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_memory_hog_hits_the_ceiling() {
    let orchestrator = make_orchestrator();
    let submission = make_submission(
        r#"
data = "x" * (512 * 1024 * 1024)
print(len(data))
"#,
        vec![make_case("", "536870912")],
    );

    let result = orchestrator.process(&submission).await;

    assert_eq!(result.status, SubmissionStatus::Error);
    // Either the cgroup kills it (exit 137) or the address-space ulimit
    // turns the allocation into a MemoryError; both name memory.
    let error = result.error.unwrap().to_lowercase();
    assert!(error.contains("memory"), "unexpected error text: {}", error);
}

/// Test: a sleeping submission is killed within timeout plus grace
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_sleeping_code_is_killed_within_grace() {
    let orchestrator = make_orchestrator();
    let mut submission = make_submission(
        r#"
import time
time.sleep(60)
print("never")
"#,
        vec![make_case("", "never")],
    );
    submission.timeout_secs = 2;

    let start = Instant::now();
    let result = orchestrator.process(&submission).await;
    let elapsed = start.elapsed();

    assert_eq!(result.status, SubmissionStatus::Error);
    assert!(result.error.unwrap().contains("time limit"));
    // 2s deadline + 5s kill grace, with slack for container startup.
    assert!(
        elapsed < Duration::from_secs(15),
        "kill took too long: {:?}",
        elapsed
    );
}

/// Test: the sandbox has no route out
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_network_is_unreachable() {
    let orchestrator = make_orchestrator();
    let submission = make_submission(
        r#"
import socket
socket.create_connection(("1.1.1.1", 80), timeout=3)
print("connected")
"#,
        vec![make_case("", "connected")],
    );

    let result = orchestrator.process(&submission).await;

    assert_eq!(result.status, SubmissionStatus::Error);
    assert!(result.error.is_some());
}

/// Test: concurrent submissions leave no containers behind
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_concurrent_submissions_leave_no_containers() {
    let docker = Docker::connect_with_local_defaults().expect("Failed to connect to Docker");
    let baseline = running_container_count(&docker).await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let expected = (i * 2).to_string();
        handles.push(tokio::spawn(async move {
            let orchestrator = make_orchestrator();
            let submission = make_submission(
                "print(int(input()) * 2)",
                vec![make_case(&i.to_string(), &expected)],
            );
            orchestrator.process(&submission).await
        }));
    }

    for handle in handles {
        let result = handle.await.expect("task panicked");
        assert_eq!(result.status, SubmissionStatus::Success);
        assert!(result.test_results[0].passed);
    }

    // Every sandbox must be gone once its submission is done.
    assert_eq!(running_container_count(&docker).await, baseline);
}

/// Test: the queue-to-store round trip a worker performs
#[tokio::test]
#[ignore] // Requires Docker and Redis
async fn test_queue_to_store_round_trip() {
    let mut conn = redis_conn().await;
    let submission = make_submission(
        "print(int(input()) * 2)",
        vec![make_case("21", "42")],
    );
    let submission_id = submission.id;

    // Intake: pending record first, then the job.
    store::write_result(&mut conn, &kodewar_common::types::ExecutionResult::pending(submission_id))
        .await
        .expect("Failed to write pending record");
    queue::enqueue(&mut conn, QueueLane::CodeExecution, &submission)
        .await
        .expect("Failed to enqueue");

    let stored = store::read_result(&mut conn, &submission_id)
        .await
        .expect("Failed to read result")
        .expect("Pending record missing");
    assert_eq!(stored.status, SubmissionStatus::Pending);

    // Worker side: drain the lane and process what we find.
    let picked = queue::dequeue(&mut conn, QueueLane::CodeExecution, 1.0)
        .await
        .expect("Failed to dequeue")
        .expect("Queue was empty");
    assert_eq!(picked.id, submission_id);

    let orchestrator = make_orchestrator();
    let result = orchestrator.process(&picked).await;
    store::write_result(&mut conn, &result)
        .await
        .expect("Failed to write result");

    // Terminal state replaced the pending record and refreshed the TTL.
    let stored = store::read_result(&mut conn, &submission_id)
        .await
        .expect("Failed to read result")
        .expect("Result expired early");
    assert_eq!(stored.status, SubmissionStatus::Success);
    assert!(stored.test_results[0].passed);

    let ttl: i64 = redis::cmd("TTL")
        .arg(store::result_key(&submission_id))
        .query_async(&mut conn)
        .await
        .expect("Failed to read TTL");
    assert!(ttl > 0 && ttl <= store::RESULT_TTL_SECS as i64);

    // Reads are snapshots: two polls of a settled result are identical.
    let again = store::read_result(&mut conn, &submission_id)
        .await
        .expect("Failed to read result")
        .expect("Result expired early");
    assert_eq!(stored, again);
}
