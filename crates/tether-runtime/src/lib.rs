//! Tether Runtime - bootstrap lifecycle for the Tether registration engine.
//!
//! This crate provides:
//! - Runtime orchestration ([`TetherRuntime`]): global plugins, both
//!   registration passes, `ready` / `dispose` events and signal handling
//! - Layered configuration ([`config`]) loaded with figment
//! - Logging configuration ([`logging`])
//!
//! ```ignore
//! use tether_runtime::TetherRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let graph = ModuleGraph::builder()
//!         .module::<ChatModule>(|m| {
//!             m.provider(Arc::new(EchoService));
//!         })
//!         .build();
//!
//!     TetherRuntime::builder(graph).build()?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, TetherConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{DISPOSE_EVENT, READY_EVENT, RuntimeBuilder, ServerMode, TetherRuntime};

// Re-export tracing for use by applications
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for applications built on the runtime.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
