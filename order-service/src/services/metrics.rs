use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::{Mutex, OnceLock};

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static ORDER_TRANSITIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ORDERS_PLACED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static STOCK_RESERVATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Install the Prometheus recorder and register the domain counters.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init_metrics() -> anyhow::Result<()> {
    let _guard = INIT_LOCK
        .lock()
        .map_err(|_| anyhow::anyhow!("metrics initialization lock poisoned"))?;
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    if METRICS_HANDLE.set(handle).is_err() {
        return Ok(());
    }

    let registry = Registry::new();

    let transitions = IntCounterVec::new(
        Opts::new(
            "order_transitions_total",
            "Order status transitions by edge and outcome",
        ),
        &["from", "to", "outcome"],
    )?;

    let placed = IntCounterVec::new(
        Opts::new("orders_placed_total", "Orders placed by outcome"),
        &["outcome"],
    )?;

    let reservations = IntCounterVec::new(
        Opts::new(
            "stock_reservations_total",
            "Stock ledger operations by kind and outcome",
        ),
        &["operation", "outcome"],
    )?;

    registry.register(Box::new(transitions.clone()))?;
    registry.register(Box::new(placed.clone()))?;
    registry.register(Box::new(reservations.clone()))?;

    PROMETHEUS_REGISTRY.set(registry).ok();
    ORDER_TRANSITIONS_TOTAL.set(transitions).ok();
    ORDERS_PLACED_TOTAL.set(placed).ok();
    STOCK_RESERVATIONS_TOTAL.set(reservations).ok();

    Ok(())
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_transition(from: &str, to: &str, outcome: &str) {
    if let Some(counter) = ORDER_TRANSITIONS_TOTAL.get() {
        counter.with_label_values(&[from, to, outcome]).inc();
    }
}

pub fn record_order_placed(outcome: &str) {
    if let Some(counter) = ORDERS_PLACED_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn record_stock_operation(operation: &str, outcome: &str) {
    if let Some(counter) = STOCK_RESERVATIONS_TOTAL.get() {
        counter.with_label_values(&[operation, outcome]).inc();
    }
}
