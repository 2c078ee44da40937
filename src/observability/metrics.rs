//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): requests by method, status, outcome
//! - `router_request_duration_seconds` (histogram): dispatch latency
//! - `router_routes_registered` (gauge): routes in the active tree
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - Prometheus scrape endpoint on its own listener
//! - Labels come from bounded sets: extension methods are all `other`

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "router_requests_total";
pub const REQUEST_DURATION: &str = "router_request_duration_seconds";
pub const ROUTES_REGISTERED: &str = "router_routes_registered";

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    metrics::describe_counter!(REQUESTS_TOTAL, "Requests dispatched, by method, status and outcome");
    metrics::describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Seconds,
        "Time from dispatch to response"
    );
    metrics::describe_gauge!(ROUTES_REGISTERED, "Routes in the active routing tree");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Label for `method`. Any client can send an extension method, so those
/// share one series.
pub fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "CONNECT" => "CONNECT",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "PATCH" => "PATCH",
        _ => "other",
    }
}

/// Record one dispatched request.
pub fn record_request(method: &Method, status: u16, outcome: &'static str, start: Instant) {
    let method = method_label(method);
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method,
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method).record(start.elapsed().as_secs_f64());
}

/// Record the size of the active routing tree.
pub fn record_routes(count: usize) {
    metrics::gauge!(ROUTES_REGISTERED).set(count as f64);
}
