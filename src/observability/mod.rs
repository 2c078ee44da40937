//! Logs and metrics.
//!
//! `logging` installs the `tracing` subscriber (pretty or JSON lines);
//! `metrics` installs the Prometheus recorder and names the router's series.
//! Every dispatched request produces one debug event carrying its request ID
//! and one sample in each request series.

pub mod logging;
pub mod metrics;
