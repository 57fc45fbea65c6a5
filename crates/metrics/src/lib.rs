//! Metrics and tracing setup for rtable.
//!
//! Provides a global [`ScanMetrics`] singleton backed by the `prometheus`
//! crate. Exposition is left to the embedding process: call
//! [`encode_metrics`] from whatever endpoint it already serves.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// ────────────────────────── Tracing ──────────────────────────

/// Initialize the tracing subscriber with env-filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

// ────────────────────────── Prometheus metrics ──────────────────────────

/// Global metrics instance.
static METRICS: OnceLock<ScanMetrics> = OnceLock::new();

/// Retrieve (or lazily create) the global metrics singleton.
pub fn metrics() -> &'static ScanMetrics {
    METRICS.get_or_init(ScanMetrics::new)
}

/// All Prometheus metrics for replicated-table reads.
pub struct ScanMetrics {
    pub registry: Registry,

    // ── Scans ──
    pub scans_opened: IntCounterVec,
    pub scan_latency_secs: HistogramVec,

    // ── Rows ──
    pub rows_returned: IntCounter,
    pub tombstones_skipped: IntCounter,

    // ── Rejections ──
    pub stale_view_rejections: IntCounter,
    pub unsupported_row_shapes: IntCounter,
}

// Manual Debug impl because prometheus types don't derive Debug.
impl std::fmt::Debug for ScanMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanMetrics").finish_non_exhaustive()
    }
}

/// Histogram buckets (seconds) for whole-scan latency.
const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];

impl ScanMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let scans_opened = IntCounterVec::new(
            Opts::new("rtable_scans_opened_total", "Scans opened, by row strategy"),
            &["strategy"],
        )
        .expect("scans_opened counter vec");

        let scan_latency_secs = HistogramVec::new(
            HistogramOpts::new(
                "rtable_scan_latency_seconds",
                "Time from scan open to dispose in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["strategy"],
        )
        .expect("scan_latency_secs histogram");

        let rows_returned = IntCounter::with_opts(Opts::new(
            "rtable_rows_returned_total",
            "Logical rows returned to callers",
        ))
        .expect("rows_returned counter");
        let tombstones_skipped = IntCounter::with_opts(Opts::new(
            "rtable_tombstones_skipped_total",
            "Tombstoned rows hidden from callers",
        ))
        .expect("tombstones_skipped counter");

        let stale_view_rejections = IntCounter::with_opts(Opts::new(
            "rtable_stale_view_rejections_total",
            "Rows rejected because they were written under a newer view",
        ))
        .expect("stale_view_rejections counter");
        let unsupported_row_shapes = IntCounter::with_opts(Opts::new(
            "rtable_unsupported_row_shape_total",
            "Scans refused because the row shape has no strategy",
        ))
        .expect("unsupported_row_shapes counter");

        // Register all metrics
        registry
            .register(Box::new(scans_opened.clone()))
            .expect("register scans_opened");
        registry
            .register(Box::new(scan_latency_secs.clone()))
            .expect("register scan_latency_secs");
        registry
            .register(Box::new(rows_returned.clone()))
            .expect("register rows_returned");
        registry
            .register(Box::new(tombstones_skipped.clone()))
            .expect("register tombstones_skipped");
        registry
            .register(Box::new(stale_view_rejections.clone()))
            .expect("register stale_view_rejections");
        registry
            .register(Box::new(unsupported_row_shapes.clone()))
            .expect("register unsupported_row_shapes");

        Self {
            registry,
            scans_opened,
            scan_latency_secs,
            rows_returned,
            tombstones_skipped,
            stale_view_rejections,
            unsupported_row_shapes,
        }
    }
}

/// Encode all registered metrics in Prometheus text exposition format.
pub fn encode_metrics() -> String {
    let m = metrics();
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&m.registry.gather(), &mut buf)
        .expect("prometheus text encoding");
    String::from_utf8(buf).expect("prometheus output is valid UTF-8")
}

/// Helper: count a scan and start its latency timer. The timer records the
/// elapsed time when dropped or observed.
pub fn start_scan_timer(strategy: &str) -> prometheus::HistogramTimer {
    let m = metrics();
    m.scans_opened.with_label_values(&[strategy]).inc();
    m.scan_latency_secs
        .with_label_values(&[strategy])
        .start_timer()
}

// ────────────────────────── Tests ──────────────────────────
