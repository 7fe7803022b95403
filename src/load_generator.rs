use hdrhistogram::Histogram;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::handlers::orders::{order_key, push_order_write, ORDER_INDEX};
use crate::metrics::QueryMetrics;
use crate::sample_data;

/// HdrHistogram range for per-operation latency: 1 μs → 60 s
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `concurrency` Tokio tasks that insert and look up orders
/// until the deadline or the `running` flag is cleared. Every
/// operation lands in the shared `QueryMetrics` feed; a per-run
/// histogram feeds the console summary printed at the end.
pub async fn run(
    running: Arc<AtomicBool>,
    metrics: Arc<QueryMetrics>,
    redis: ConnectionManager,
    concurrency: u32,
    duration_secs: u64,
    read_pct: u8,
) {
    let deadline = Instant::now() + Duration::from_secs(duration_secs);
    let started = Instant::now();

    let hist = Arc::new(Mutex::new(
        Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
            .expect("histogram creation"),
    ));

    let mut handles = Vec::with_capacity(concurrency as usize);

    for worker_id in 0..concurrency {
        let running = running.clone();
        let metrics = metrics.clone();
        let conn = redis.clone();
        let hist = hist.clone();

        handles.push(tokio::spawn(async move {
            worker(worker_id, running, metrics, conn, hist, deadline, read_pct)
                .await;
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    // Mark the run as finished before printing so `status` flips
    // promptly even if the terminal is slow.
    running.store(false, Ordering::SeqCst);

    print_summary(&hist.lock(), started.elapsed());
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    metrics: Arc<QueryMetrics>,
    mut conn: ConnectionManager,
    hist: Arc<Mutex<Histogram<u64>>>,
    deadline: Instant,
    read_pct: u8,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        let is_read = rng.gen_range(0u8..100) < read_pct;

        let t0 = Instant::now();
        let ok = if is_read {
            do_query(&mut conn).await
        } else {
            do_insert(&mut rng, &mut conn).await
        };
        let elapsed = t0.elapsed();

        // Failed operations stay out of the dashboard feed, matching
        // the handlers' success-only recording.
        if ok {
            let label = if is_read {
                "benchmark: query order"
            } else {
                "benchmark: insert order"
            };
            metrics.record(label, elapsed.as_secs_f64() * 1000.0);
        }

        let us = (elapsed.as_micros() as u64).max(1);
        let _ = hist.lock().record(us);
    }
}

// ─── Operations ──────────────────────────────────────────────────

/// Random single-order lookup: pick an id from the index, fetch its
/// hash. An empty database counts as a failed read.
async fn do_query(conn: &mut ConnectionManager) -> bool {
    let picked: redis::RedisResult<Option<String>> =
        conn.srandmember(ORDER_INDEX).await;

    let id = match picked {
        Ok(Some(id)) => id,
        _ => return false,
    };

    let result: redis::RedisResult<HashMap<String, String>> =
        conn.hgetall(order_key(&id)).await;

    matches!(result, Ok(ref map) if !map.is_empty())
}

async fn do_insert(rng: &mut StdRng, conn: &mut ConnectionManager) -> bool {
    let order = sample_data::random_order(rng);

    let mut pipe = redis::pipe();
    push_order_write(&mut pipe, &order);
    let result: redis::RedisResult<()> = pipe.query_async(conn).await;

    result.is_ok()
}

// ─── Summary ─────────────────────────────────────────────────────

fn print_summary(hist: &Histogram<u64>, elapsed: Duration) {
    let count = hist.len();
    if count == 0 {
        println!("Load run finished: no operations completed");
        return;
    }

    let secs = elapsed.as_secs_f64();
    let ops_per_sec = count as f64 / secs;

    println!();
    println!("Load run finished: {count} operations in {secs:.1}s ({ops_per_sec:.1} ops/s)");
    println!(
        "  latency  min {:.2}ms  mean {:.2}ms  p50 {:.2}ms  p95 {:.2}ms  p99 {:.2}ms  max {:.2}ms",
        hist.min() as f64 / 1000.0,
        hist.mean() / 1000.0,
        hist.value_at_percentile(50.0) as f64 / 1000.0,
        hist.value_at_percentile(95.0) as f64 / 1000.0,
        hist.value_at_percentile(99.0) as f64 / 1000.0,
        hist.max() as f64 / 1000.0,
    );
    println!();
}
