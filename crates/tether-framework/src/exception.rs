//! Translation of action errors into replies.

use std::error::Error as _;

use tether_core::{ActionError, ExceptionTranslator};
use tracing::error;

/// Reply used for unrecognised errors when none is configured.
pub const DEFAULT_ACTION_ERROR_MESSAGE: &str = "Internal Server Error";

/// The engine's [`ExceptionTranslator`].
///
/// User-facing errors surface their message verbatim. Anything else is
/// logged with its source chain and replaced by the configured fallback; an
/// empty fallback suppresses the reply.
#[derive(Debug, Clone, Default)]
pub struct ExceptionHandler {
    action_error_message: Option<String>,
}

impl ExceptionHandler {
    pub fn new(action_error_message: Option<String>) -> Self {
        Self {
            action_error_message,
        }
    }

    fn fallback(&self) -> Option<String> {
        match self.action_error_message.as_deref() {
            None => Some(DEFAULT_ACTION_ERROR_MESSAGE.to_owned()),
            Some("") => None,
            Some(message) => Some(message.to_owned()),
        }
    }
}

impl ExceptionTranslator for ExceptionHandler {
    fn translate(&self, err: &ActionError) -> Option<String> {
        match err {
            ActionError::Reply { message, .. } => Some(message.clone()),
            ActionError::Internal(source) => {
                let mut chain = Vec::new();
                let mut cause = source.source();
                while let Some(c) = cause {
                    chain.push(c.to_string());
                    cause = c.source();
                }
                error!(error = %source, causes = ?chain, "Command action failed");
                self.fallback()
            }
        }
    }
}
