//! Configuration for the Tether runtime.
//!
//! Settings are layered with figment from defaults, configuration files and
//! `TETHER_*` environment variables, then validated before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig, TetherConfig};
pub use validation::validate_config;
