//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, status codes)
//! - Detect conflicting routes by building a trial tree
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::http::router::FILEPATH_WILDCARD;
use crate::routing::Node;

/// One problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field (`routes[2].path`).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check `config`, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let observability = &config.observability;
    if observability.log_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    // Routes that pass the field checks go into a trial tree, so conflicts
    // are reported the way the server would hit them at startup.
    let mut trial: Node<()> = Node::new();

    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{i}]");
        let method = route.parse_method();
        let mut valid = true;

        if method.is_none() {
            errors.push(ValidationError::new(
                format!("{field}.method"),
                format!("invalid method '{}'", route.method),
            ));
            valid = false;
        }
        if !route.path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{field}.path"),
                format!("'{}' must begin with '/'", route.path),
            ));
            valid = false;
        }
        if StatusCode::from_u16(route.status).is_err() {
            errors.push(ValidationError::new(
                format!("{field}.status"),
                format!("invalid status code {}", route.status),
            ));
        }

        if let (true, Some(method)) = (valid, method) {
            if let Err(e) = trial.add_route(method, &route.path, ()) {
                errors.push(ValidationError::new(field, e.to_string()));
            }
        }
    }

    for (i, mount) in config.files.iter().enumerate() {
        let field = format!("files[{i}]");

        if !mount.path.starts_with('/') || !mount.path.ends_with(FILEPATH_WILDCARD) {
            errors.push(ValidationError::new(
                format!("{field}.path"),
                format!("'{}' must begin with '/' and end with '{FILEPATH_WILDCARD}'", mount.path),
            ));
            continue;
        }
        if !mount.root.is_dir() {
            errors.push(ValidationError::new(
                format!("{field}.root"),
                format!("{} is not a directory", mount.root.display()),
            ));
        }

        for method in [Method::GET, Method::HEAD] {
            if let Err(e) = trial.add_route(method, &mount.path, ()) {
                errors.push(ValidationError::new(field.clone(), e.to_string()));
                break;
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{FilesConfig, RouteConfig};

    fn route(method: &str, path: &str) -> RouteConfig {
        RouteConfig {
            method: method.to_string(),
            path: path.to_string(),
            ..RouteConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not an address".to_string();
        config.timeouts.request_secs = 0;
        config.observability.log_level = "loud".to_string();
        config.routes = vec![
            route("GE T", "/a"),
            route("GET", "no-slash"),
            RouteConfig {
                status: 1000,
                ..route("GET", "/b")
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "timeouts.request_secs",
                "observability.log_level",
                "routes[0].method",
                "routes[1].path",
                "routes[2].status",
            ]
        );
    }

    #[test]
    fn test_reports_every_route_conflict() {
        let mut config = ServerConfig::default();
        config.routes = vec![
            route("GET", "/user/:name"),
            route("GET", "/user/admin"),
            route("get", "/user/:name"),
            route("POST", "/user/:name"),
            route("GET", "/src/*"),
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["routes[1]", "routes[2]", "routes[4]"]);
        assert!(errors[0].message.contains("conflicts with existing wildcard"));
        assert!(errors[1].message.contains("already registered"));
    }

    #[test]
    fn test_file_mounts() {
        let mut config = ServerConfig::default();
        config.files = vec![
            FilesConfig {
                path: "/static/*path".to_string(),
                root: std::env::temp_dir(),
            },
            FilesConfig {
                path: "/assets/*filepath".to_string(),
                root: std::env::temp_dir().join("radix-router-does-not-exist"),
            },
            FilesConfig {
                path: "/public/*filepath".to_string(),
                root: std::env::temp_dir(),
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["files[0].path", "files[1].root"]);
    }
}
