// Prometheus metrics for the execution service
//
// Exposes metrics on /metrics HTTP endpoint:
// - Executions by outcome (counter)
// - Execution latencies by outcome (histogram)
// - Executions in flight (gauge)

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Outcome label for a process that ran to completion
pub const OUTCOME_COMPLETED: &str = "completed";

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref EXECUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("gateway_executions_total", "Total number of execution requests"),
        &["outcome"]
    ).expect("Failed to create executions total metric");

    pub static ref EXECUTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "gateway_execution_duration_seconds",
            "Execution request duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
        &["outcome"]
    ).expect("Failed to create execution duration metric");

    pub static ref EXECUTIONS_IN_FLIGHT: IntGauge = IntGauge::new(
        "gateway_executions_in_flight",
        "Number of commands currently running"
    ).expect("Failed to create executions in flight metric");
}

fn register<C>(collector: &C) -> prometheus::Result<()>
where
    C: Collector + Clone + 'static,
{
    match REGISTRY.register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register all collectors; safe to call more than once
pub fn init() -> prometheus::Result<()> {
    register(&*EXECUTIONS_TOTAL)?;
    register(&*EXECUTION_DURATION_SECONDS)?;
    register(&*EXECUTIONS_IN_FLIGHT)?;
    Ok(())
}

/// Record one finished request
pub fn record_execution(outcome: &str, duration: Duration) {
    EXECUTIONS_TOTAL.with_label_values(&[outcome]).inc();
    EXECUTION_DURATION_SECONDS
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
