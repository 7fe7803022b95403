use axum::{
    middleware as axum_mw,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::handlers;
use crate::metrics::endpoint;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes, middleware, and static serving.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Order endpoints ─────────────────────────────────────
        .route(
            "/api/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route(
            "/api/orders/generate-sample",
            post(handlers::orders::generate_sample),
        )
        .route(
            "/api/orders/:id",
            patch(handlers::orders::update_order)
                .delete(handlers::orders::delete_order),
        )
        // ── Benchmark control ───────────────────────────────────
        .route(
            "/api/benchmark/start",
            post(handlers::benchmark::start_benchmark),
        )
        .route(
            "/api/benchmark/stop",
            post(handlers::benchmark::stop_benchmark),
        )
        .route(
            "/api/benchmark/status",
            get(handlers::benchmark::benchmark_status),
        )
        // ── Metrics (polled by the dashboard every 5 s) ─────────
        .route("/api/metrics", get(endpoint::get_metrics))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Serve static/ directory for the dashboard ───────────
        .fallback_service(ServeDir::new("static"))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(CorsLayer::permissive())
}
