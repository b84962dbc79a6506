//! Runtime error types.

use tether_core::CoreError;
use tether_framework::RegistrationError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or running a [`TetherRuntime`](crate::TetherRuntime).
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A registration point failed during bootstrap.
    #[error("Registration failed: {0}")]
    Registration(#[from] RegistrationError),

    /// A global plugin failed to install.
    #[error("Global plugin failed: {0}")]
    Plugin(#[from] CoreError),

    /// `bootstrap` was called more than once.
    #[error("Runtime is already bootstrapped")]
    AlreadyBootstrapped,

    /// An operation needs a bootstrapped runtime.
    #[error("Runtime is not bootstrapped")]
    NotBootstrapped,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
