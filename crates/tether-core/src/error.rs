//! Unified error types for the Tether core.
//!
//! Registration-level errors live in `tether-framework`; this module only
//! carries what the host itself can produce or has to route.

use thiserror::Error;

/// A boxed, thread-safe error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// =============================================================================
// Action Errors
// =============================================================================

/// An error raised by a command action or by an interceptor.
///
/// `Reply` errors are user-facing: their message is shown to the invoker
/// verbatim. Everything else is `Internal` and is replaced by a fallback
/// message by the active [`ExceptionTranslator`].
#[derive(Debug, Error)]
pub enum ActionError {
    /// A user-facing failure carrying the reply text.
    #[error("{message}")]
    Reply {
        /// HTTP-style status code describing the failure class.
        status: u16,
        /// Text shown to the command invoker.
        message: String,
    },

    /// Any other failure. Never shown to the invoker.
    #[error("{0}")]
    Internal(BoxError),
}

impl ActionError {
    /// Creates a user-facing error with status `400`.
    pub fn reply(message: impl Into<String>) -> Self {
        Self::with_status(400, message)
    }

    /// Creates a user-facing error with an explicit status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Reply {
            status,
            message: message.into(),
        }
    }

    /// Creates a user-facing "not found" error (`404`).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(404, message)
    }

    /// Creates a user-facing "forbidden" error (`403`).
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_status(403, message)
    }

    /// Wraps an arbitrary error as an internal failure.
    pub fn internal(err: impl Into<BoxError>) -> Self {
        Self::Internal(err.into())
    }

    /// Returns `true` if the message may be shown to the invoker.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Reply { .. })
    }
}

/// Result of a command action: an optional reply, or an error.
pub type ActionResult = Result<Option<String>, ActionError>;

/// Maps action errors to the reply text shown to the invoker.
///
/// Returning `None` suppresses the reply entirely.
pub trait ExceptionTranslator: Send + Sync {
    /// Translates `err` into a reply.
    fn translate(&self, err: &ActionError) -> Option<String>;
}

// =============================================================================
// Core Errors
// =============================================================================

/// Errors raised by the host while mutating the context tree.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A plugin's `apply` hook failed.
    #[error("plugin '{plugin}' failed to apply: {source}")]
    PluginApply {
        /// Name of the failing plugin.
        plugin: String,
        /// The underlying failure.
        source: BoxError,
    },
}

/// Result type for host operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_errors_are_user_facing() {
        let err = ActionError::not_found("boo: bow!");
        assert!(err.is_user_facing());
        assert_eq!(err.to_string(), "boo: bow!");
    }

    #[test]
    fn test_internal_errors_keep_their_message() {
        let err = ActionError::internal("bow!");
        assert!(!err.is_user_facing());
        assert_eq!(err.to_string(), "bow!");
    }
}
