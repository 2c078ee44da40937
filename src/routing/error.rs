//! Registration errors.

use axum::http::Method;
use thiserror::Error;

/// Why a route could not be added to the tree.
///
/// These are configuration errors: the tree is left usable and every route
/// registered before the failing one keeps working.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("a handler is already registered for {method} '{path}'")]
    DuplicatePath { method: Method, path: String },

    #[error("wildcards must be named with a non-empty name in path '{path}'")]
    EmptyWildcardName { path: String },

    #[error("only one wildcard per path segment is allowed in path '{path}'")]
    MultipleWildcards { path: String },

    #[error("catch-all routes are only allowed at the end of the path in path '{path}'")]
    CatchAllConflict { path: String },

    #[error("no / before catch-all in path '{path}'")]
    MissingCatchAllSlash { path: String },

    #[error("catch-all conflicts with existing handle for the path segment root in path '{path}'")]
    CatchAllRootConflict { path: String },

    #[error("wildcard route '{wildcard}' conflicts with existing children in path '{path}'")]
    ChildConflict { path: String, wildcard: String },

    #[error("'{path}' conflicts with existing wildcard '{wildcard}'")]
    WildcardConflict { path: String, wildcard: String },
}

impl RouteError {
    /// The route whose registration failed.
    pub fn path(&self) -> &str {
        match self {
            RouteError::DuplicatePath { path, .. }
            | RouteError::EmptyWildcardName { path }
            | RouteError::MultipleWildcards { path }
            | RouteError::CatchAllConflict { path }
            | RouteError::MissingCatchAllSlash { path }
            | RouteError::CatchAllRootConflict { path }
            | RouteError::ChildConflict { path, .. }
            | RouteError::WildcardConflict { path, .. } => path,
        }
    }
}
