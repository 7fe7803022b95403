use std::sync::atomic::AtomicBool;
use std::sync::Arc;

mod handlers;
mod load_generator;
mod metrics;
mod middleware;
mod redis_client;
mod sample_data;
mod server;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Cloneable async Redis connection (auto-reconnects).
    pub redis: redis::aio::ConnectionManager,

    /// Query-latency recorder — handlers push samples, the dashboard
    /// polls snapshots.
    pub metrics: Arc<metrics::QueryMetrics>,

    /// Flag checked by every load-generator worker on each iteration.
    pub load_running: Arc<AtomicBool>,

    /// Handle to the spawned load-generator task so we can await clean shutdown.
    pub load_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[tokio::main]
async fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   📦  ORDER-LATENCY OBSERVATORY                  ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 1. Configuration from the environment ────────────────────
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string());

    // ── 2. Connect to Redis ──────────────────────────────────────
    println!("🔌 Connecting to Redis at {redis_url}...");
    let redis_conn = redis_client::connect(&redis_url).await;
    println!("   ✓ connected");

    // ── 3. Build shared state ────────────────────────────────────
    let state = Arc::new(AppState {
        redis: redis_conn,
        metrics: Arc::new(metrics::QueryMetrics::new()),
        load_running: Arc::new(AtomicBool::new(false)),
        load_handle: tokio::sync::Mutex::new(None),
    });

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to port {port} — is it already in use?"));

    println!();
    println!("Server listening on http://localhost:{port}");
    println!("Orders API      → http://localhost:{port}/api/orders");
    println!("Metrics JSON    → http://localhost:{port}/api/metrics");
    println!();

    axum::serve(listener, app)
        .await
        .expect("Server exited with error");
}
