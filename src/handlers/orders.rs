use axum::{
    extract::{Path, State},
    Json,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::sample_data;
use crate::AppState;

use super::{elapsed_ms, AppError};

// ─── Domain types ────────────────────────────────────────────────

/// Set of all order ids, maintained alongside the per-order hashes
/// so `GET /api/orders` can enumerate without a keyspace scan.
pub const ORDER_INDEX: &str = "orders:index";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer: String,
    pub product: String,
    /// Two-decimal money amount
    pub amount: f64,
    pub status: OrderStatus,
    pub date: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
        }
    }

    /// Lenient parse for values read back from the order hash.
    /// Unknown strings fall back to the default rather than failing
    /// the whole listing.
    fn from_field(s: &str) -> Self {
        match s {
            "Processing" => Self::Processing,
            "Completed" => Self::Completed,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer: String,
    pub product: String,
    pub amount: f64,
    #[serde(default)]
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub customer: Option<String>,
    pub product: Option<String>,
    pub amount: Option<f64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateSampleRequest {
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    2000
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ─── GET /api/orders ─────────────────────────────────────────────

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Order>>, AppError> {
    let mut conn = state.redis.clone();

    // ── Redis READ (timed) ──────────────────────────────────────
    let t0 = Instant::now();
    let ids: Vec<String> = conn
        .smembers(ORDER_INDEX)
        .await
        .map_err(|e| AppError::Redis(e.to_string()))?;

    let orders = if ids.is_empty() {
        Vec::new()
    } else {
        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.cmd("HGETALL").arg(order_key(id));
        }
        let maps: Vec<HashMap<String, String>> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        // An id can linger in the index briefly after a concurrent
        // delete; skip the resulting empty hashes.
        maps.iter()
            .filter(|m| !m.is_empty())
            .map(order_from_map)
            .collect()
    };
    let duration_ms = elapsed_ms(t0);
    // ────────────────────────────────────────────────────────────

    state.metrics.record("GET /api/orders", duration_ms);

    Ok(Json(orders))
}

// ─── POST /api/orders ────────────────────────────────────────────

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let order = Order {
        id: uuid::Uuid::new_v4().to_string(),
        customer: req.customer,
        product: req.product,
        amount: round_cents(req.amount),
        status: req.status,
        date: chrono::Utc::now().to_rfc3339(),
    };

    let mut conn = state.redis.clone();

    // ── Redis WRITE (timed) ─────────────────────────────────────
    let t0 = Instant::now();
    let mut pipe = redis::pipe();
    push_order_write(&mut pipe, &order);
    let _: () = pipe
        .query_async(&mut conn)
        .await
        .map_err(|e| AppError::Redis(e.to_string()))?;
    let duration_ms = elapsed_ms(t0);
    // ────────────────────────────────────────────────────────────

    state.metrics.record("POST /api/orders", duration_ms);

    Ok(Json(order))
}

// ─── POST /api/orders/generate-sample ────────────────────────────

pub async fn generate_sample(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateSampleRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let count = req.count;
    if count == 0 || count > 100_000 {
        return Err(AppError::BadRequest(
            "count must be between 1 and 100000".into(),
        ));
    }

    let mut rng = StdRng::from_entropy();
    let orders: Vec<Order> =
        (0..count).map(|_| sample_data::random_order(&mut rng)).collect();

    let mut conn = state.redis.clone();

    // ── Redis WRITE (timed, chunked) ────────────────────────────
    let t0 = Instant::now();
    sample_data::write_orders_chunked(&mut conn, &orders)
        .await
        .map_err(|e| AppError::Redis(e.to_string()))?;
    let duration_ms = elapsed_ms(t0);
    // ────────────────────────────────────────────────────────────

    state.metrics.record(
        format!("POST /api/orders/generate-sample ({count} orders)"),
        duration_ms,
    );

    Ok(Json(MessageResponse {
        message: format!("Successfully created {count} sample orders"),
    }))
}

// ─── PATCH /api/orders/:id ───────────────────────────────────────

pub async fn update_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    let key = order_key(&id);
    let mut conn = state.redis.clone();

    // ── Redis READ + WRITE (timed) ──────────────────────────────
    let t0 = Instant::now();
    let map: HashMap<String, String> = conn
        .hgetall(&key)
        .await
        .map_err(|e| AppError::Redis(e.to_string()))?;

    if map.is_empty() {
        // Not-found leaves no timing record.
        return Err(AppError::NotFound("Order not found".into()));
    }

    let mut order = order_from_map(&map);
    if let Some(customer) = req.customer {
        order.customer = customer;
    }
    if let Some(product) = req.product {
        order.product = product;
    }
    if let Some(amount) = req.amount {
        order.amount = round_cents(amount);
    }
    if let Some(status) = req.status {
        order.status = status;
    }

    let mut pipe = redis::pipe();
    push_order_write(&mut pipe, &order);
    let _: () = pipe
        .query_async(&mut conn)
        .await
        .map_err(|e| AppError::Redis(e.to_string()))?;
    let duration_ms = elapsed_ms(t0);
    // ────────────────────────────────────────────────────────────

    state
        .metrics
        .record(format!("PATCH /api/orders/{id}"), duration_ms);

    Ok(Json(order))
}

// ─── DELETE /api/orders/:id ──────────────────────────────────────

pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let key = order_key(&id);
    let mut conn = state.redis.clone();

    // ── Redis READ + WRITE (timed) ──────────────────────────────
    let t0 = Instant::now();
    let exists: bool = conn
        .exists(&key)
        .await
        .map_err(|e| AppError::Redis(e.to_string()))?;

    if !exists {
        return Err(AppError::NotFound("Order not found".into()));
    }

    let _: () = redis::pipe()
        .cmd("DEL")
        .arg(&key)
        .ignore()
        .cmd("SREM")
        .arg(ORDER_INDEX)
        .arg(&id)
        .ignore()
        .query_async(&mut conn)
        .await
        .map_err(|e| AppError::Redis(e.to_string()))?;
    let duration_ms = elapsed_ms(t0);
    // ────────────────────────────────────────────────────────────

    state
        .metrics
        .record(format!("DELETE /api/orders/{id}"), duration_ms);

    Ok(Json(MessageResponse {
        message: "Order deleted successfully".into(),
    }))
}

// ─── Helpers ─────────────────────────────────────────────────────

pub fn order_key(id: &str) -> String {
    format!("order:{id}")
}

/// Orders carry two-decimal money. Amounts are rounded before an
/// `Order` is built, so the response body matches what the stored
/// `{:.2}` hash field yields on every later read.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Queue the HSET + index SADD for one order onto a pipeline.
pub fn push_order_write(pipe: &mut redis::Pipeline, order: &Order) {
    pipe.cmd("HSET")
        .arg(order_key(&order.id))
        .arg("id")
        .arg(&order.id)
        .arg("customer")
        .arg(&order.customer)
        .arg("product")
        .arg(&order.product)
        .arg("amount")
        .arg(format!("{:.2}", order.amount))
        .arg("status")
        .arg(order.status.as_str())
        .arg("date")
        .arg(&order.date)
        .ignore();
    pipe.cmd("SADD").arg(ORDER_INDEX).arg(&order.id).ignore();
}

pub fn order_from_map(map: &HashMap<String, String>) -> Order {
    Order {
        id: map.get("id").cloned().unwrap_or_default(),
        customer: map.get("customer").cloned().unwrap_or_default(),
        product: map.get("product").cloned().unwrap_or_default(),
        amount: map
            .get("amount")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0),
        status: map
            .get("status")
            .map(|s| OrderStatus::from_field(s))
            .unwrap_or_default(),
        date: map.get("date").cloned().unwrap_or_default(),
    }
}
