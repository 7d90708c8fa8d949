use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "classbook_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "classbook_http_request_duration_seconds";

// ── Scheduling and admission ────────────────────────────────────

/// Counter: classes persisted by schedule requests.
pub const CLASSES_SCHEDULED_TOTAL: &str = "classbook_classes_scheduled_total";

/// Counter: days rejected because another request had claimed them.
pub const DAYS_REJECTED_TOTAL: &str = "classbook_days_rejected_total";

/// Counter: cache claims handed back after a failed write.
pub const CACHE_RELEASES_TOTAL: &str = "classbook_cache_releases_total";

pub const BOOKINGS_ADMITTED_TOTAL: &str = "classbook_bookings_admitted_total";

/// Counter: refused bookings. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "classbook_bookings_rejected_total";

// ── Journal ─────────────────────────────────────────────────────

/// Histogram: group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "classbook_journal_flush_duration_seconds";

/// Histogram: records per group-commit flush.
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "classbook_journal_flush_batch_size";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
