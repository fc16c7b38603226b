use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};
use crate::error::{Error, Result};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Allocation metrics
    pub static ref TIMESTAMPS_ISSUED: IntCounter = IntCounter::new(
        "tso_timestamps_issued_total",
        "Total number of timestamps handed out, batches counted by size"
    ).unwrap();

    pub static ref BATCH_REQUESTS: IntCounter = IntCounter::new(
        "tso_batch_requests_total",
        "Total number of batch timestamp requests served"
    ).unwrap();

    pub static ref NOT_LEADER_RESPONSES: IntCounter = IntCounter::new(
        "tso_not_leader_responses_total",
        "Total number of requests answered while not leader"
    ).unwrap();

    pub static ref ALLOCATION_ERRORS: IntCounter = IntCounter::new(
        "tso_allocation_errors_total",
        "Total number of failed allocation requests"
    ).unwrap();

    // Overflow metrics
    pub static ref LOGICAL_CLOCK_OVERFLOWS: IntCounter = IntCounter::new(
        "tso_logical_clock_overflows_total",
        "Total number of requests rejected by logical clock overflow"
    ).unwrap();

    pub static ref RECOVERY_CHECKS_STARTED: IntCounter = IntCounter::new(
        "tso_recovery_checks_started_total",
        "Total number of background overflow recovery checks started"
    ).unwrap();

    pub static ref LEADER_RESIGNATIONS: IntCounter = IntCounter::new(
        "tso_leader_resignations_total",
        "Total number of resignations forced by a stalled clock"
    ).unwrap();

    // Clock metrics
    pub static ref PHYSICAL_TIME_UPDATES: IntCounter = IntCounter::new(
        "tso_physical_time_updates_total",
        "Total number of physical time updates applied"
    ).unwrap();

    pub static ref PHYSICAL_TIME_MS: IntGauge = IntGauge::new(
        "tso_physical_time_ms",
        "Physical component of the current clock"
    ).unwrap();

    pub static ref IS_LEADER: IntGauge = IntGauge::new(
        "tso_is_leader",
        "1 while this replica serves timestamps"
    ).unwrap();

    // Latency metrics
    pub static ref ALLOCATION_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "tso_allocation_latency_seconds",
            "Timestamp allocation latency"
        ).buckets(vec![0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.001])
    ).unwrap();
}

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(TIMESTAMPS_ISSUED.clone()))?;
    REGISTRY.register(Box::new(BATCH_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(NOT_LEADER_RESPONSES.clone()))?;
    REGISTRY.register(Box::new(ALLOCATION_ERRORS.clone()))?;
    REGISTRY.register(Box::new(LOGICAL_CLOCK_OVERFLOWS.clone()))?;
    REGISTRY.register(Box::new(RECOVERY_CHECKS_STARTED.clone()))?;
    REGISTRY.register(Box::new(LEADER_RESIGNATIONS.clone()))?;
    REGISTRY.register(Box::new(PHYSICAL_TIME_UPDATES.clone()))?;
    REGISTRY.register(Box::new(PHYSICAL_TIME_MS.clone()))?;
    REGISTRY.register(Box::new(IS_LEADER.clone()))?;
    REGISTRY.register(Box::new(ALLOCATION_LATENCY.clone()))?;
    Ok(())
}

/// Renders the registry in the Prometheus text format.
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::MetricsError(e.to_string()))
}
