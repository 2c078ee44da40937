//! HTTP request router built on a compressed radix trie.
//!
//! Routes are registered per method with static segments, `:name` parameters
//! and a trailing `*name` catch-all. Lookups walk the trie without
//! backtracking and recommend a trailing-slash redirect on a near miss.
//!
//! ```
//! use axum::http::Method;
//! use radix_router::routing::Node;
//!
//! let mut tree = Node::new();
//! tree.add_route(Method::GET, "/user/:name", "user").unwrap();
//! tree.add_route(Method::GET, "/src/*filepath", "src").unwrap();
//!
//! let found = tree.get_value(&Method::GET, "/user/gopher");
//! assert_eq!(found.handler, Some(&"user"));
//! assert_eq!(found.params.get("name"), Some("gopher"));
//!
//! assert!(tree.get_value(&Method::GET, "/user/gopher/").tsr);
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use http::{HttpServer, Router};
pub use lifecycle::Shutdown;
pub use routing::{Lookup, Node, Params, RouteError};
