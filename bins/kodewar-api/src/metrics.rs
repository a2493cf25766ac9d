// Prometheus metrics for the Kodewar API

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Submissions accepted (counter with language label)
    pub static ref SUBMISSIONS_ACCEPTED: CounterVec = CounterVec::new(
        Opts::new(
            "kodewar_submissions_accepted_total",
            "Total number of submissions accepted"
        ),
        &["language"]
    )
    .expect("metric can be created");

    // Submissions rejected at intake (counter with reason label)
    pub static ref SUBMISSIONS_REJECTED: CounterVec = CounterVec::new(
        Opts::new(
            "kodewar_submissions_rejected_total",
            "Total number of submissions rejected at intake"
        ),
        &["reason"]
    )
    .expect("metric can be created");

    // Status endpoint queries (counter with outcome label)
    pub static ref STATUS_QUERIES: CounterVec = CounterVec::new(
        Opts::new(
            "kodewar_status_queries_total",
            "Total number of status queries"
        ),
        &["outcome"]
    )
    .expect("metric can be created");

    // Queue depth gauge (current depth per lane)
    pub static ref QUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("kodewar_queue_depth", "Current queue depth per lane"),
        &["lane"]
    )
    .expect("metric can be created");
}

/// Initialize metrics registry
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(SUBMISSIONS_ACCEPTED.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(SUBMISSIONS_REJECTED.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(STATUS_QUERIES.clone()))
        .expect("collector can be registered");

    REGISTRY
        .register(Box::new(QUEUE_DEPTH.clone()))
        .expect("collector can be registered");
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record an accepted submission
pub fn record_submission_accepted(language: &str) {
    SUBMISSIONS_ACCEPTED.with_label_values(&[language]).inc();
}

/// Record a rejected submission
pub fn record_submission_rejected(reason: &str) {
    SUBMISSIONS_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a status query outcome
pub fn record_status_query(outcome: &str) {
    STATUS_QUERIES.with_label_values(&[outcome]).inc();
}

/// Sample every lane's depth into the gauge
pub async fn update_queue_depths(redis_conn: &mut redis::aio::ConnectionManager) {
    use kodewar_common::queue::{self, QueueLane};

    for lane in QueueLane::all_lanes() {
        if let Ok(depth) = queue::depth(redis_conn, lane).await {
            QUEUE_DEPTH.with_label_values(&[lane.name()]).set(depth);
        }
    }
}
