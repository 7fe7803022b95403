use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::AppState;

use super::AppError;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkConfig {
    /// Number of concurrent Tokio tasks generating load
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// How long the run lasts (seconds)
    #[serde(default = "default_duration")]
    pub duration_secs: u64,

    /// Percentage of operations that are order lookups (0–100);
    /// the rest are inserts
    #[serde(default = "default_read_pct")]
    pub read_pct: u8,
}

fn default_concurrency() -> u32 {
    10
}
fn default_duration() -> u64 {
    30
}
fn default_read_pct() -> u8 {
    70
}

impl BenchmarkConfig {
    fn validate(&self) -> Result<(), AppError> {
        if self.concurrency == 0 || self.concurrency > 500 {
            return Err(AppError::BadRequest(
                "concurrency must be between 1 and 500".into(),
            ));
        }
        if self.duration_secs == 0 || self.duration_secs > 300 {
            return Err(AppError::BadRequest(
                "duration_secs must be between 1 and 300".into(),
            ));
        }
        if self.read_pct > 100 {
            return Err(AppError::BadRequest(
                "read_pct must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct BenchmarkStatus {
    pub running: bool,
    pub message: String,
}

// ─── POST /api/benchmark/start ───────────────────────────────────

pub async fn start_benchmark(
    State(state): State<Arc<AppState>>,
    Json(config): Json<BenchmarkConfig>,
) -> Result<Json<BenchmarkStatus>, AppError> {
    config.validate()?;

    // Guard: only one run at a time. The claim is a single
    // compare-exchange — a load followed by a store would let two
    // concurrent starts both pass and spawn two worker pools.
    if !try_claim(&state.load_running) {
        return Err(AppError::AlreadyRunning);
    }

    // Start the query feed fresh so the dashboard shows only this run
    state.metrics.reset();

    let msg = format!(
        "Started: {} workers × {}s, {}% lookups / {}% inserts",
        config.concurrency,
        config.duration_secs,
        config.read_pct,
        100u8.saturating_sub(config.read_pct),
    );

    let running = state.load_running.clone();
    let metrics = state.metrics.clone();
    let redis = state.redis.clone();

    let handle = tokio::spawn(async move {
        crate::load_generator::run(
            running,
            metrics,
            redis,
            config.concurrency,
            config.duration_secs,
            config.read_pct,
        )
        .await;
    });

    // Stash the handle so `stop` can await clean shutdown
    let mut guard = state.load_handle.lock().await;
    *guard = Some(handle);

    Ok(Json(BenchmarkStatus {
        running: true,
        message: msg,
    }))
}

/// Atomically flip the run flag from idle to running.
/// Returns false when another run already owns it.
fn try_claim(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
}

// ─── POST /api/benchmark/stop ────────────────────────────────────

pub async fn stop_benchmark(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BenchmarkStatus>, AppError> {
    if !state.load_running.load(Ordering::SeqCst) {
        return Ok(Json(BenchmarkStatus {
            running: false,
            message: "No load run is active".into(),
        }));
    }

    // Signal all workers to stop
    state.load_running.store(false, Ordering::SeqCst);

    // Await the load-generator task so we know it's fully stopped
    let mut guard = state.load_handle.lock().await;
    if let Some(handle) = guard.take() {
        // Ignore JoinError — the task may have already finished
        let _ = handle.await;
    }

    Ok(Json(BenchmarkStatus {
        running: false,
        message: "Load run stopped".into(),
    }))
}

// ─── GET /api/benchmark/status ───────────────────────────────────

pub async fn benchmark_status(
    State(state): State<Arc<AppState>>,
) -> Json<BenchmarkStatus> {
    let running = state.load_running.load(Ordering::SeqCst);
    Json(BenchmarkStatus {
        running,
        message: if running {
            "Load run in progress".into()
        } else {
            "Idle".into()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_apply_to_empty_body() {
        let config: BenchmarkConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.duration_secs, 30);
        assert_eq!(config.read_pct, 70);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn concurrent_starts_claim_the_run_flag_exactly_once() {
        let flag = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flag = flag.clone();
                std::thread::spawn(move || try_claim(&flag))
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&claimed| claimed)
            .count();

        assert_eq!(wins, 1);
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn out_of_range_configs_are_rejected() {
        let bad = [
            r#"{"concurrency":0}"#,
            r#"{"concurrency":501}"#,
            r#"{"duration_secs":0}"#,
            r#"{"duration_secs":301}"#,
            r#"{"read_pct":101}"#,
        ];
        for body in bad {
            let config: BenchmarkConfig = serde_json::from_str(body).unwrap();
            assert!(config.validate().is_err(), "accepted {body}");
        }
    }
}
