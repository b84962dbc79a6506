//! # Tether
//!
//! Registers providers of a dependency-injection container into a chat-bot
//! host.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   describe()   ┌────────────────┐
//! │  Providers   │───────────────▶│ Metadata store │
//! └──────────────┘                └───────┬────────┘
//!        │ module graph                   │
//!        ▼                                ▼
//! ┌──────────────┐  resolve ctx   ┌────────────────┐   attach   ┌───────────┐
//! │   Runtime    │───────────────▶│   Registrar    │───────────▶│ Host app  │
//! └──────────────┘                └────────────────┘            └───────────┘
//! ```
//!
//! - **Core**: the host (sessions, selections, contexts, commands, plugins,
//!   capability slots) and the metadata store
//! - **Framework**: declarations, context resolution, interceptors and the
//!   two registration passes
//! - **Runtime**: configuration, logging and the bootstrap lifecycle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tether::prelude::*;
//!
//! struct EchoService;
//!
//! impl Injectable for EchoService {
//!     fn describe(class: ClassBuilder<'_, Self>) {
//!         class
//!             .method("on_echo")
//!             .put_option(0, "content", "-c <content:string>")
//!             .command("echo", "echo back", CommandConfig::default(), |_this, args| async move {
//!                 Ok(Some(format!("bot: {}", args.str(0).unwrap_or_default())))
//!             });
//!     }
//! }
//!
//! struct ChatModule;
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
//!
//! ## Features
//!
//! - `toml-config`: `tether.toml` configuration files (default)
//! - `yaml-config`: `tether.yaml` configuration files
//! - `json-log`: JSON log output

pub use tether_core as core;
pub use tether_framework as framework;
pub use tether_runtime as runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use tether_runtime::{RuntimeError, TetherConfig, TetherRuntime};

    // Declarations and registration
    pub use tether_framework::prelude::*;
    pub use tether_framework::{ModuleGraph, ServiceWire};

    // Host
    pub use tether_core::{App, Plugin, Token, plugin_fn};

    pub use std::sync::Arc;
}
