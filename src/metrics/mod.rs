// Private module declaration
mod server;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::{start_metrics_server, ServiceStatus};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Placed orders and fatal failures by error kind
// - Best-effort steps that failed without failing the order
// - Broker publish outcomes and latency
// - Overload-simulation publishes
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_placed: IntCounter,
    pub orders_failed: IntCounterVec,
    pub best_effort_failures: IntCounterVec,

    pub publish_total: IntCounterVec,
    pub publish_duration: Histogram,
    pub overload_messages: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_placed = IntCounter::new("checkout_orders_placed_total", "Total orders placed")?;
        registry.register(Box::new(orders_placed.clone()))?;

        let orders_failed = IntCounterVec::new(
            Opts::new("checkout_orders_failed_total", "Total orders rejected by a fatal step"),
            &["kind"],
        )?;
        registry.register(Box::new(orders_failed.clone()))?;

        let best_effort_failures = IntCounterVec::new(
            Opts::new(
                "checkout_best_effort_failures_total",
                "Best-effort steps that failed without failing the order",
            ),
            &["step"],
        )?;
        registry.register(Box::new(best_effort_failures.clone()))?;

        let publish_total = IntCounterVec::new(
            Opts::new("checkout_kafka_publish_total", "Order events published to the broker"),
            &["outcome"],
        )?;
        registry.register(Box::new(publish_total.clone()))?;

        let publish_duration = Histogram::with_opts(
            HistogramOpts::new(
                "checkout_kafka_publish_duration_seconds",
                "Time from enqueue to broker outcome",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(publish_duration.clone()))?;

        let overload_messages = IntCounter::new(
            "checkout_overload_messages_total",
            "Extra publishes started by the overload simulation",
        )?;
        registry.register(Box::new(overload_messages.clone()))?;

        Ok(Self {
            registry,
            orders_placed,
            orders_failed,
            best_effort_failures,
            publish_total,
            publish_duration,
            overload_messages,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_failed(&self, kind: &str) {
        self.orders_failed.with_label_values(&[kind]).inc();
    }

    pub fn record_best_effort_failure(&self, step: &str) {
        self.best_effort_failures.with_label_values(&[step]).inc();
    }

    pub fn record_publish(&self, outcome: &str, duration_secs: f64) {
        self.publish_total.with_label_values(&[outcome]).inc();
        self.publish_duration.observe(duration_secs);
    }
}
