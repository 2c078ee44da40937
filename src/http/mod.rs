//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → router.rs (tree lookup, redirects, 405/404, panic recovery)
//!     → handler.rs (user or configured handler)
//!     → response.rs (dispatcher answers, outcome tag)
//!     → Send to client
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use handler::{Handler, SharedHandler};
pub use request::{RequestIdExt, UuidRequestId, X_REQUEST_ID};
pub use response::Outcome;
pub use router::{BuildError, PanicHandler, PanicReport, Router};
pub use server::{AppState, HttpServer};
