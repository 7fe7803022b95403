use rand::rngs::StdRng;
use rand::Rng;
use redis::aio::ConnectionManager;

use crate::handlers::orders::{push_order_write, round_cents, Order, OrderStatus};

// ─── Constants ───────────────────────────────────────────────────

/// Pipeline batch size — keeps Redis buffers comfortable when a
/// generate-sample request asks for thousands of orders.
const BATCH: usize = 100;

static STATUSES: &[OrderStatus] = &[
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Completed,
];

// ─── Order generation ────────────────────────────────────────────

/// One randomized demo order: numbered customer/product names, a
/// two-decimal amount under 1000, and a random status.
pub fn random_order(rng: &mut StdRng) -> Order {
    Order {
        id: uuid::Uuid::new_v4().to_string(),
        customer: format!("Customer {}", rng.gen_range(0..1000)),
        product: format!("Product {}", rng.gen_range(0..100)),
        amount: round_cents(rng.gen_range(0.0..1000.0)),
        status: STATUSES[rng.gen_range(0..STATUSES.len())],
        date: chrono::Utc::now().to_rfc3339(),
    }
}

// ─── Bulk write ──────────────────────────────────────────────────

/// Write orders in pipelined chunks of `BATCH` so a single huge
/// pipeline never has to buffer the whole payload.
pub async fn write_orders_chunked(
    conn: &mut ConnectionManager,
    orders: &[Order],
) -> redis::RedisResult<()> {
    for chunk in orders.chunks(BATCH) {
        let mut pipe = redis::pipe();
        for order in chunk {
            push_order_write(&mut pipe, order);
        }
        let _: () = pipe.query_async(conn).await?;
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn generated_orders_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let order = random_order(&mut rng);
            assert!((0.0..=1000.0).contains(&order.amount));
            // amounts carry at most two decimals
            let cents = order.amount * 100.0;
            assert!((cents - cents.round()).abs() < 1e-6);
            assert!(order.customer.starts_with("Customer "));
            assert!(order.product.starts_with("Product "));
            assert!(STATUSES.contains(&order.status));
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ids: Vec<String> =
            (0..200).map(|_| random_order(&mut rng).id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);
    }
}
