//! Process lifecycle.
//!
//! ```text
//! SIGINT/SIGTERM (signals.rs) → Shutdown::trigger (shutdown.rs)
//!     → server stops accepting → in-flight requests drain → main returns
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
