//! Prometheus metrics collection for tuffy.
//!
//! Every metric lives in a `OnceLock` static registered by [`init`]. The
//! record helpers are no-ops until then, so library code and tests can call
//! them freely.
//!
//! ## Lifecycle Metrics
//!
//! - `tuffy_module_transitions_total{op, outcome}` - Loader calls by result
//! - `tuffy_reconcile_cycles_total` / `tuffy_reconcile_cycle_seconds` - Watcher cycles
//! - `tuffy_modules_loaded` - Modules currently loaded (gauge)
//! - `tuffy_command_syncs_total{outcome}` - Command publications by result
//!
//! ## Gateway Metrics
//!
//! - `tuffy_command_total{command}` / `tuffy_command_duration_seconds{command}`
//! - `tuffy_command_errors_total{command, error}`

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Lifecycle
// ========================================================================

/// Loader calls by operation and outcome (`ok` or an error code).
pub static MODULE_TRANSITIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Completed watcher cycles.
pub static RECONCILE_CYCLES: OnceLock<IntCounter> = OnceLock::new();

/// Wall time of one watcher cycle, scan through sync.
pub static RECONCILE_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Scans that could not list the module directory.
pub static SCAN_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Modules currently in the loaded state.
pub static MODULES_LOADED: OnceLock<IntGauge> = OnceLock::new();

/// Command publications by outcome.
pub static COMMAND_SYNCS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gateway
// ========================================================================

/// Commands dispatched by name.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command latency by name.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Command errors by name and error kind.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before metrics are exported.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(MODULE_TRANSITIONS, IntCounterVec::new(Opts::new("tuffy_module_transitions_total", "Module loader calls by operation and outcome"), &["op", "outcome"]));
    register!(RECONCILE_CYCLES, IntCounter::new("tuffy_reconcile_cycles_total", "Completed watcher cycles"));
    register!(RECONCILE_DURATION, Histogram::with_opts(
        HistogramOpts::new("tuffy_reconcile_cycle_seconds", "Duration of one watcher cycle")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])));
    register!(SCAN_FAILURES, IntCounter::new("tuffy_scan_failures_total", "Scans of an unavailable module directory"));
    register!(MODULES_LOADED, IntGauge::new("tuffy_modules_loaded", "Modules currently loaded"));
    register!(COMMAND_SYNCS, IntCounterVec::new(Opts::new("tuffy_command_syncs_total", "Command table publications by outcome"), &["outcome"]));

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("tuffy_command_total", "Commands dispatched by name"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("tuffy_command_duration_seconds", "Command latency by name")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("tuffy_command_errors_total", "Command errors by name and kind"), &["command", "error"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record one loader call. `outcome` is `ok` or the error code.
#[inline]
pub fn record_transition(op: &str, outcome: &str) {
    if let Some(c) = MODULE_TRANSITIONS.get() {
        c.with_label_values(&[op, outcome]).inc();
    }
}

/// Record a completed watcher cycle.
#[inline]
pub fn record_cycle(duration_secs: f64) {
    if let Some(c) = RECONCILE_CYCLES.get() {
        c.inc();
    }
    if let Some(h) = RECONCILE_DURATION.get() {
        h.observe(duration_secs);
    }
}

#[inline]
pub fn record_scan_failure() {
    if let Some(c) = SCAN_FAILURES.get() {
        c.inc();
    }
}

#[inline]
pub fn set_loaded_modules(count: usize) {
    if let Some(g) = MODULES_LOADED.get() {
        g.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

/// Record one sync call. `outcome` is `ok` or the error code.
#[inline]
pub fn record_sync(outcome: &str) {
    if let Some(c) = COMMAND_SYNCS.get() {
        c.with_label_values(&[outcome]).inc();
    }
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

/// Record a command error.
#[inline]
pub fn record_command_error(command: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[command, error]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_lifecycle() {
        init();

        record_transition("load", "ok");
        record_transition("reload", "manifest");
        record_cycle(0.002);
        set_loaded_modules(3);
        record_command("calc", 0.001);

        let output = gather_metrics();
        assert!(output.contains("tuffy_module_transitions_total"));
        assert!(output.contains(r#"outcome="manifest""#));
        assert!(output.contains("tuffy_command_total"));
    }
}
