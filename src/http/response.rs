//! Responses produced by the dispatcher itself.
//!
//! # Responsibilities
//! - Redirects for trailing-slash and cleaned paths
//! - 404 and 405 (with `Allow`) answers
//! - Tag every response with the [`Outcome`] of its dispatch
//!
//! # Design Decisions
//! - The outcome travels as a response extension, so the server can label
//!   metrics without re-running the lookup

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A registered handler produced the response.
    Handled,
    /// Redirected to the path with a trailing slash added, removed or cleaned.
    Redirect,
    /// The path exists for other methods.
    MethodNotAllowed,
    NotFound,
    /// The handler panicked.
    Panic,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Handled => "handled",
            Outcome::Redirect => "redirect",
            Outcome::MethodNotAllowed => "method_not_allowed",
            Outcome::NotFound => "not_found",
            Outcome::Panic => "panic",
        }
    }
}

/// Attach `outcome` to `response`.
pub fn with_outcome(mut response: Response, outcome: Outcome) -> Response {
    response.extensions_mut().insert(outcome);
    response
}

/// Outcome recorded on `response`, if it went through the dispatcher.
pub fn outcome_of(response: &Response) -> Option<Outcome> {
    response.extensions().get::<Outcome>().copied()
}

/// Redirect to `location` with `status`.
pub fn redirect(location: &str, status: StatusCode) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        // request paths are always valid header values
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Plain 404.
pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
}

/// 405 listing the methods the path does accept.
pub fn method_not_allowed(allowed: &[Method]) -> Response {
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    match HeaderValue::from_str(&allow) {
        Ok(value) => (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, value)],
            "405 method not allowed\n",
        )
            .into_response(),
        Err(_) => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

/// Answer for a handler that panicked and no panic handler is installed.
pub fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "500 internal server error\n").into_response()
}
