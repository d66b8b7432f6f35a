//! Prometheus metrics for the process runner and progress observers.
//!
//! Nothing here is registered automatically; hosts call
//! [`register_metrics`] (or iterate [`all_metrics`]) against their own
//! registry.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Process runner
// =============================================================================

/// Processes launched by execution mode.
pub static PROCESSES_LAUNCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ffwrap_processes_launched_total", "Total processes launched"),
        &["mode"], // "blocking", "background"
    )
    .unwrap()
});

/// Processes that reached a terminal state, by result.
pub static PROCESSES_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ffwrap_processes_finished_total",
            "Total processes that reached a terminal state",
        ),
        &["result"], // "completed", "failed", "interrupted"
    )
    .unwrap()
});

/// Wall clock run time of finished processes.
pub static PROCESS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ffwrap_process_duration_seconds",
            "Run time of finished processes",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &["result"],
    )
    .unwrap()
});

/// Outputs rejected by post-run validation.
pub static OUTPUT_VALIDATION_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ffwrap_output_validation_failures_total",
        "Outputs that were missing or empty after a successful run",
    )
    .unwrap()
});

// =============================================================================
// Progress
// =============================================================================

/// Progress probes by strategy.
pub static PROGRESS_PROBES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ffwrap_progress_probes_total", "Total progress probes"),
        &["strategy"], // "native", "stderr"
    )
    .unwrap()
});

/// ffmpeg capability probes (cache misses).
pub static CAPABILITY_PROBES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ffwrap_capability_probes_total",
        "Times the ffmpeg binary was run to detect capabilities",
    )
    .unwrap()
});

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(PROCESSES_LAUNCHED.clone()),
        Box::new(PROCESSES_FINISHED.clone()),
        Box::new(PROCESS_DURATION.clone()),
        Box::new(OUTPUT_VALIDATION_FAILURES.clone()),
        Box::new(PROGRESS_PROBES.clone()),
        Box::new(CAPABILITY_PROBES.clone()),
    ]
}

/// Registers every metric in `registry`.
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}
