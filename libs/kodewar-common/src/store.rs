use crate::types::ExecutionResult;
use redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

pub const RESULT_PREFIX: &str = "kodewar:result";

/// How long a stored result stays readable. Past this the record is gone
/// and indistinguishable from one that never existed.
pub const RESULT_TTL_SECS: u64 = 300;

/// Generate the result key for a submission.
pub fn result_key(submission_id: &Uuid) -> String {
    format!("{}:{}", RESULT_PREFIX, submission_id)
}

/// Store the snapshot for a submission, replacing any previous record and
/// refreshing its TTL. Every state transition goes through here.
pub async fn write_result(
    conn: &mut redis::aio::ConnectionManager,
    result: &ExecutionResult,
) -> RedisResult<()> {
    let key = result_key(&result.submission_id);
    let payload = serde_json::to_string(result)
        .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string())))?;

    let _: () = conn.set_ex(&key, payload, RESULT_TTL_SECS).await?;

    Ok(())
}

/// Retrieve the stored snapshot for a submission. Reads never mutate the
/// record or its TTL; `None` covers both "never submitted" and "expired".
pub async fn read_result(
    conn: &mut redis::aio::ConnectionManager,
    submission_id: &Uuid,
) -> RedisResult<Option<ExecutionResult>> {
    let key = result_key(submission_id);
    let payload: Option<String> = conn.get(&key).await?;

    match payload {
        Some(data) => {
            let result: ExecutionResult = serde_json::from_str(&data)
                .map_err(|e| redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string())))?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}
