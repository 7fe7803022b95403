use redis::aio::ConnectionManager;

/// Creates a single `ConnectionManager` that auto-reconnects on failure.
///
/// `ConnectionManager` is cheaply cloneable — every clone shares the same
/// underlying multiplexed TCP connection, which is plenty for a demo
/// order store; a production deployment would front it with a pool.
pub async fn connect(url: &str) -> ConnectionManager {
    let client = redis::Client::open(url).unwrap_or_else(|e| {
        eprintln!("❌ Invalid Redis URL \"{url}\": {e}");
        std::process::exit(1);
    });

    ConnectionManager::new(client).await.unwrap_or_else(|e| {
        eprintln!("❌ Cannot connect to Redis: {e}");
        eprintln!("   Make sure redis-server is running and REDIS_URL points at it");
        eprintln!("   → redis-server");
        std::process::exit(1);
    })
}
