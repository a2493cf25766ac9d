use crate::types::Submission;
use redis::{AsyncCommands, RedisResult};
use std::fmt;

/// Queue semantics shared by intake and workers - defines only key naming
/// and payload encoding, not runtime logic. Keeps producers and consumers
/// from drifting and makes Redis keys deterministic.

pub const QUEUE_PREFIX: &str = "kodewar:queue";

/// The delivery lanes jobs can be routed on. Each lane is an independent
/// FIFO list; intake publishes submissions on `CodeExecution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueLane {
    CodeExecution,
    TestExecution,
    ResultProcessing,
}

impl QueueLane {
    /// All lanes, in a stable order.
    pub fn all_lanes() -> Vec<QueueLane> {
        vec![
            QueueLane::CodeExecution,
            QueueLane::TestExecution,
            QueueLane::ResultProcessing,
        ]
    }

    /// Routing name used on the wire and in configuration.
    pub fn name(&self) -> &'static str {
        match self {
            QueueLane::CodeExecution => "code_execution",
            QueueLane::TestExecution => "test_execution",
            QueueLane::ResultProcessing => "result_processing",
        }
    }

    pub fn from_name(name: &str) -> Option<QueueLane> {
        match name {
            "code_execution" => Some(QueueLane::CodeExecution),
            "test_execution" => Some(QueueLane::TestExecution),
            "result_processing" => Some(QueueLane::ResultProcessing),
            _ => None,
        }
    }

    /// Deterministic Redis key for this lane.
    pub fn key(&self) -> String {
        format!("{}:{}", QUEUE_PREFIX, self.name())
    }
}

impl fmt::Display for QueueLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Push a submission onto a lane.
/// Uses RPUSH so BLPOP consumers see FIFO order.
pub async fn enqueue(
    conn: &mut redis::aio::ConnectionManager,
    lane: QueueLane,
    submission: &Submission,
) -> RedisResult<()> {
    let payload = serde_json::to_string(submission)
        .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string())))?;

    conn.rpush(lane.key(), payload).await
}

/// Pop one submission from a lane, blocking up to `timeout_seconds`.
/// A `None` return is the poll timeout, not an error; callers loop on it
/// to stay responsive to shutdown.
pub async fn dequeue(
    conn: &mut redis::aio::ConnectionManager,
    lane: QueueLane,
    timeout_seconds: f64,
) -> RedisResult<Option<Submission>> {
    let result: Option<(String, String)> = conn.blpop(lane.key(), timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let submission: Submission = serde_json::from_str(&payload)
                .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string())))?;
            Ok(Some(submission))
        }
        None => Ok(None),
    }
}

/// Number of submissions currently waiting on a lane.
pub async fn depth(
    conn: &mut redis::aio::ConnectionManager,
    lane: QueueLane,
) -> RedisResult<i64> {
    conn.llen(lane.key()).await
}
