mod handlers;
mod metrics;
mod routes;

use axum::Router;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub redis: ConnectionManager,
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .init();

    info!("Kodewar API booting...");

    // Initialize metrics
    metrics::init_metrics();
    info!("Metrics registry initialized");

    // Connect to Redis
    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

    let client = redis::Client::open(redis_url.as_str())
        .expect("Failed to create Redis client");

    let redis_conn = ConnectionManager::new(client).await
        .expect("Failed to connect to Redis");

    info!("Connected to Redis: {}", redis_url);

    let state = Arc::new(AppState {
        redis: redis_conn.clone(),
    });

    // Start background queue depth sampler
    tokio::spawn(queue_depth_sampler(redis_conn));

    // Build router
    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    // Start server
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await
        .expect("Failed to bind to address");

    info!("HTTP server listening on {}", addr);
    info!("Ready to accept submissions");

    axum::serve(listener, app).await
        .expect("Server error");
}

/// Background task to sample queue depths into the metrics registry
async fn queue_depth_sampler(mut redis_conn: ConnectionManager) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    loop {
        interval.tick().await;
        metrics::update_queue_depths(&mut redis_conn).await;
    }
}
