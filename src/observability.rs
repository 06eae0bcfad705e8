use std::net::SocketAddr;

use tracing::info;

use crate::protocol::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "cottagebook_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "cottagebook_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "cottagebook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "cottagebook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "cottagebook_connections_rejected_total";

/// Gauge: committed bookings.
pub const BOOKINGS_ACTIVE: &str = "cottagebook_bookings_active";

/// Gauge: live member sessions.
pub const SESSIONS_ACTIVE: &str = "cottagebook_sessions_active";

/// Counter: rejected logins.
pub const AUTH_FAILURES_TOTAL: &str = "cottagebook_auth_failures_total";

/// Counter: adds rejected because the days were taken.
pub const OVERLAP_REJECTIONS_TOTAL: &str = "cottagebook_overlap_rejections_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "cottagebook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "cottagebook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a request to a short label for metrics.
pub fn op_label(req: &Request) -> &'static str {
    match req {
        Request::Login { .. } => "login",
        Request::Resume { .. } => "resume",
        Request::Logout => "logout",
        Request::List => "list",
        Request::Subscribe => "subscribe",
        Request::Unsubscribe => "unsubscribe",
        Request::Add { .. } => "add",
        Request::Remove { .. } => "remove",
        Request::Check { .. } => "check",
        Request::Ping => "ping",
    }
}
