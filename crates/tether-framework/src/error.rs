//! Error types for the registration engine.

use tether_core::CoreError;
use thiserror::Error;

/// A fatal declaration error found while registering a point.
///
/// These are programming mistakes that only surface at registration time;
/// they abort the affected point and are reported as startup failures.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A plugin method produced no plugin descriptor.
    #[error("invalid plugin from method {class}::{member}")]
    InvalidPlugin {
        class: &'static str,
        member: &'static str,
    },

    /// The declared registration kind and the stored handler disagree.
    #[error("{class}::{member} is declared as {declared} but its handler is {handler}")]
    HandlerMismatch {
        class: &'static str,
        member: &'static str,
        declared: &'static str,
        handler: &'static str,
    },

    /// A registration point was declared without a handler.
    #[error("{class}::{member} is declared as a registration point but has no handler")]
    MissingHandler {
        class: &'static str,
        member: &'static str,
    },

    /// The handler could not be bound to the live instance.
    #[error("handler for {class}::{member} does not accept the provided instance")]
    InstanceMismatch {
        class: &'static str,
        member: &'static str,
    },

    /// Installing a plugin failed.
    #[error(transparent)]
    Plugin(#[from] CoreError),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;
