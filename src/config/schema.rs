//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router
//! service. All types derive Serde traits for deserialization from TOML.

use std::path::PathBuf;

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Dispatcher behavior.
    pub router: RouterConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Routes answered with a configured response.
    pub routes: Vec<RouteConfig>,

    /// Static file mounts.
    pub files: Vec<FilesConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Dispatcher flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Redirect `/foo/` to `/foo` (and back) when only that route exists.
    pub redirect_trailing_slash: bool,

    /// Redirect to the cleaned path when it matches a route.
    pub redirect_fixed_path: bool,

    /// Answer 405 with an `Allow` header when the path exists for other
    /// methods.
    pub handle_method_not_allowed: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            redirect_fixed_path: true,
            handle_method_not_allowed: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A route answered with a fixed response.
///
/// `{name}` placeholders in `body` are replaced by the matching path
/// variable. Without a body the route echoes the match as JSON.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Request method, case-insensitive.
    pub method: String,

    /// Route pattern (`/user/:name`, `/src/*filepath`).
    pub path: String,

    /// Response status code.
    pub status: u16,

    /// Response body template.
    pub body: Option<String>,

    /// Content type of a templated body.
    pub content_type: Option<String>,
}

impl RouteConfig {
    /// The configured method, upper-cased.
    pub fn parse_method(&self) -> Option<Method> {
        Method::from_bytes(self.method.to_ascii_uppercase().as_bytes()).ok()
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            path: "/".to_string(),
            status: 200,
            body: None,
            content_type: None,
        }
    }
}

/// Directory served below a `/*filepath` mount.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesConfig {
    /// Mount pattern, ending with `/*filepath`.
    pub path: String,

    /// Directory on disk.
    pub root: PathBuf,
}
