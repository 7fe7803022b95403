pub mod collector;
pub mod endpoint;

pub use collector::{MetricsSnapshot, QueryMetric, QueryMetrics};
