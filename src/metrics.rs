//! Prometheus metrics for the bridge relay
//!
//! Exposed on /metrics when the status API is enabled.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, register_int_gauge_vec, IntCounterVec,
    IntGauge, IntGaugeVec,
};

lazy_static! {
    // Indexing
    pub static ref WINDOWS_SCANNED: IntCounterVec = register_int_counter_vec!(
        "bridge_relay_windows_scanned_total",
        "Total number of block windows scanned",
        &["chain"]
    ).expect("constant metric name is valid");

    pub static ref LAST_SCANNED_BLOCK: IntGaugeVec = register_int_gauge_vec!(
        "bridge_relay_last_scanned_block",
        "Last block whose window was fully scanned",
        &["chain"]
    ).expect("constant metric name is valid");

    pub static ref EVENTS_INDEXED: IntCounterVec = register_int_counter_vec!(
        "bridge_relay_events_indexed_total",
        "Total number of new bridge events stored",
        &["chain", "kind"]
    ).expect("constant metric name is valid");

    pub static ref SCAN_ERRORS: IntCounterVec = register_int_counter_vec!(
        "bridge_relay_scan_errors_total",
        "Total number of failed chain scans and undecodable bridge logs",
        &["chain", "kind"]
    ).expect("constant metric name is valid");

    pub static ref SKIPPED_TICKS: IntCounterVec = register_int_counter_vec!(
        "bridge_relay_skipped_ticks_total",
        "Ticks skipped because the previous run was still in progress",
        &["job"]
    ).expect("constant metric name is valid");

    // Relaying
    pub static ref DISTRIBUTIONS: IntCounterVec = register_int_counter_vec!(
        "bridge_relay_distributions_total",
        "Deposits handled by the relay worker, by outcome",
        &["outcome"]
    ).expect("constant metric name is valid");

    pub static ref PENDING_DEPOSITS: IntGauge = register_int_gauge!(
        "bridge_relay_pending_deposits",
        "Number of deposits not yet relayed"
    ).expect("constant metric name is valid");

    // Health
    pub static ref UP: IntGauge = register_int_gauge!(
        "bridge_relay_up",
        "Whether the relay is up and running"
    ).expect("constant metric name is valid");
}

/// Record a completed scan window
pub fn record_window_scanned(chain: &str, to_block: u64) {
    WINDOWS_SCANNED.with_label_values(&[chain]).inc();
    LAST_SCANNED_BLOCK
        .with_label_values(&[chain])
        .set(i64::try_from(to_block).unwrap_or(i64::MAX));
}

/// Record a newly stored event
pub fn record_event_indexed(chain: &str, kind: &str) {
    EVENTS_INDEXED.with_label_values(&[chain, kind]).inc();
}

/// Record a scan failure (`scan`) or a bridge log that could not be decoded (`decode`)
pub fn record_scan_error(chain: &str, kind: &str) {
    SCAN_ERRORS.with_label_values(&[chain, kind]).inc();
}

pub fn record_skipped_tick(job: &str) {
    SKIPPED_TICKS.with_label_values(&[job]).inc();
}

/// Record the outcome of one deposit (`relayed`, `invalid`, `failed`, `unconfirmed`, `not_claimed`)
pub fn record_distribution(outcome: &str) {
    DISTRIBUTIONS.with_label_values(&[outcome]).inc();
}

pub fn set_pending_deposits(count: usize) {
    PENDING_DEPOSITS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_scanned_sets_last_block() {
        record_window_scanned("metrics-test-chain", 1_234);
        assert_eq!(
            LAST_SCANNED_BLOCK
                .with_label_values(&["metrics-test-chain"])
                .get(),
            1_234
        );
    }

    #[test]
    fn test_metrics_are_gathered() {
        record_distribution("relayed");
        let names: Vec<_> = prometheus::gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"bridge_relay_distributions_total".to_string()));
    }
}
