use lazy_static::lazy_static;
use prometheus::{
    Histogram, IntCounter, IntGauge, register_histogram, register_int_counter,
    register_int_gauge,
};


lazy_static! {
    pub static ref CHECKS_TOTAL: IntCounter =
        register_int_counter!("rate_gate_checks_total", "Total rate limit checks").unwrap();
    pub static ref REJECTIONS_TOTAL: IntCounter =
        register_int_counter!("rate_gate_rejections_total", "Checks that were denied").unwrap();
    pub static ref TRACKED_CLIENTS: IntGauge =
        register_int_gauge!("rate_gate_tracked_clients", "Clients currently held in the store").unwrap();
    pub static ref CLEANUP_REMOVED_TOTAL: IntCounter = register_int_counter!(
        "rate_gate_cleanup_removed_total",
        "Entries reclaimed by the background sweeper"
    )
    .unwrap();
    pub static ref CHECK_LATENCY: Histogram = register_histogram!(
        "rate_gate_check_latency_seconds",
        "Time spent inside a single rate limit check"
    )
    .unwrap();
}
