use axum::{extract::State, Json};
use std::sync::Arc;

use super::collector::MetricsSnapshot;
use crate::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────
/// Returns a single JSON snapshot of the query feed and its
/// aggregates. The dashboard re-fetches this every 5 seconds.

pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
