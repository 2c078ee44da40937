//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup, single-threaded):
//!     (method, path, handler)
//!     → tree.rs (split prefixes, attach wildcards, reject conflicts)
//!     → methods.rs (bind handler at the final node)
//!
//! Lookup (per request, read-only):
//!     (method, path)
//!     → lookup.rs (walk fragments, capture params)
//!     → Lookup { handler, params, tsr }
//! ```
//!
//! # Design Decisions
//! - The tree is generic over the handler type and does no I/O
//! - Static children are always preferred over wildcards; a path segment
//!   may hold either, never both, so there is no backtracking
//! - Built once, then shared read-only across request tasks

pub mod error;
pub mod lookup;
pub mod methods;
pub mod params;
pub mod path;
pub mod tree;

pub use error::RouteError;
pub use lookup::Lookup;
pub use methods::MethodMap;
pub use params::{Params, Vars};
pub use path::clean_path;
pub use tree::{Node, NodeKind};
