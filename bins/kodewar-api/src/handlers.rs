// HTTP route handlers for the Kodewar API

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use kodewar_common::queue::{self, QueueLane};
use kodewar_common::store;
use kodewar_common::types::{
    default_memory_limit_mb, default_timeout_secs, ExecutionResult, Language, Submission, TestCase,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{metrics, AppState};

/// Upper bound on submitted source size, in characters.
const MAX_CODE_CHARS: usize = 50_000;
/// Accepted per-submission execution deadline, in seconds.
const TIMEOUT_RANGE: RangeInclusive<i64> = 1..=300;
/// Accepted per-submission memory ceiling, in megabytes.
const MEMORY_RANGE: RangeInclusive<i64> = 128..=2048;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub test_cases: Vec<TestCaseInput>,
    // Signed so an out-of-range negative becomes a validation error
    // instead of a deserialization failure.
    #[serde(default = "default_timeout_i64")]
    pub timeout: i64,
    #[serde(default = "default_memory_i64")]
    pub memory_limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct TestCaseInput {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected: String,
}

fn default_timeout_i64() -> i64 {
    default_timeout_secs() as i64
}

fn default_memory_i64() -> i64 {
    default_memory_limit_mb() as i64
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub submission_id: Option<String>,
}

/// Check a submit payload and build the job it describes.
///
/// Every field is checked so one response can report all problems at
/// once; the error map is keyed by field name.
fn validate_submit(payload: SubmitRequest) -> Result<Submission, BTreeMap<&'static str, String>> {
    let mut errors = BTreeMap::new();

    if payload.code.is_empty() {
        errors.insert("code", "code is required".to_string());
    } else if payload.code.chars().count() > MAX_CODE_CHARS {
        errors.insert(
            "code",
            format!("code must be at most {} characters", MAX_CODE_CHARS),
        );
    }

    let language = if payload.language.is_empty() {
        errors.insert("language", "language is required".to_string());
        None
    } else {
        let parsed = Language::from_str(&payload.language);
        if parsed.is_none() {
            errors.insert(
                "language",
                format!("unsupported language: {}", payload.language),
            );
        }
        parsed
    };

    if !TIMEOUT_RANGE.contains(&payload.timeout) {
        errors.insert(
            "timeout",
            format!(
                "timeout must be between {} and {}",
                TIMEOUT_RANGE.start(),
                TIMEOUT_RANGE.end()
            ),
        );
    }

    if !MEMORY_RANGE.contains(&payload.memory_limit) {
        errors.insert(
            "memory_limit",
            format!(
                "memory_limit must be between {} and {}",
                MEMORY_RANGE.start(),
                MEMORY_RANGE.end()
            ),
        );
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    let Some(language) = language else {
        return Err(errors);
    };

    let test_cases: Vec<TestCase> = payload
        .test_cases
        .into_iter()
        .map(|tc| TestCase {
            input: tc.input,
            expected: tc.expected,
        })
        .collect();

    Ok(Submission {
        id: Uuid::new_v4(),
        code: payload.code,
        language,
        test_cases,
        timeout_secs: payload.timeout as u64,
        memory_limit_mb: payload.memory_limit as u64,
        created_at: chrono::Utc::now(),
    })
}

/// POST /api/submit - Accept a submission for asynchronous execution
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitRequest>,
) -> impl IntoResponse {
    let submission = match validate_submit(payload) {
        Ok(submission) => submission,
        Err(fields) => {
            metrics::record_submission_rejected("validation");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "validation failed",
                    "fields": fields,
                })),
            )
                .into_response();
        }
    };

    let mut conn = state.redis.clone();

    // Write the pending record before the job is visible to workers, so
    // a status poll racing the enqueue still finds the submission.
    let pending = ExecutionResult::pending(submission.id);
    if let Err(e) = store::write_result(&mut conn, &pending).await {
        error!(submission_id = %submission.id, error = %e, "Failed to write pending record");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": "failed to accept submission"
            })),
        )
            .into_response();
    }

    match queue::enqueue(&mut conn, QueueLane::CodeExecution, &submission).await {
        Ok(()) => {
            metrics::record_submission_accepted(&submission.language.to_string());
            info!(
                submission_id = %submission.id,
                language = %submission.language,
                test_cases = submission.test_cases.len(),
                "Submission queued"
            );

            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "submission_id": submission.id,
                    "status": "pending",
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!(submission_id = %submission.id, error = %e, "Failed to queue submission");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "failed to accept submission"
                })),
            )
                .into_response()
        }
    }
}

/// GET /api/status?submission_id=<uuid> - Query execution result
pub async fn submission_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> impl IntoResponse {
    let Some(raw_id) = query.submission_id else {
        metrics::record_status_query("bad_request");
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "submission_id is required"
            })),
        )
            .into_response();
    };

    let submission_id = match Uuid::parse_str(&raw_id) {
        Ok(id) => id,
        Err(_) => {
            metrics::record_status_query("bad_request");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": format!("invalid submission id: {}", raw_id)
                })),
            )
                .into_response();
        }
    };

    let mut conn = state.redis.clone();
    match store::read_result(&mut conn, &submission_id).await {
        Ok(Some(result)) => {
            metrics::record_status_query("hit");
            info!(submission_id = %submission_id, status = ?result.status, "Result retrieved");
            (StatusCode::OK, Json(result)).into_response()
        }
        Ok(None) => {
            // An expired result and an id we never saw look the same here.
            metrics::record_status_query("miss");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": format!("no submission found for id {}", submission_id)
                })),
            )
                .into_response()
        }
        Err(e) => {
            metrics::record_status_query("error");
            error!(submission_id = %submission_id, error = %e, "Failed to fetch result");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": format!("failed to query submission status: {}", e)
                })),
            )
                .into_response()
        }
    }
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics_endpoint() -> impl IntoResponse {
    (StatusCode::OK, metrics::render_metrics())
}
