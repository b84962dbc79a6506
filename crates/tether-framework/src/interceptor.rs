//! Command interceptors.
//!
//! An [`Interceptor`] runs before a command's action and may answer in its
//! place. The [`InterceptorManager`] turns registrations into before-hooks on
//! a [`Command`]:
//!
//! - `Ok(Some(reply))` short-circuits with `reply`;
//! - `Ok(None)` falls through to the next hook or the action;
//! - `Err(err)` short-circuits with the translated error.
//!
//! Registrations naming a container token are resolved non-strictly. A token
//! that resolves to nothing is logged and its hook fails closed, answering
//! with the translated internal error instead of letting the action run.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tether_core::{
    ActionError, Argv, BeforeHook, BoxFuture, Command, ExceptionTranslator, Instance,
    MetadataStore, ModuleContainer, Target, Token,
};
use tracing::{debug, warn};

use crate::keys::INTERCEPTOR_CAST;

/// A before-hook on a command.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Returns `Some(reply)` to answer in place of the command.
    async fn intercept(&self, argv: &Argv) -> Result<Option<String>, ActionError>;
}

/// Casts a container instance to its interceptor view.
pub type InterceptorCaster = Arc<dyn Fn(Instance) -> Option<Arc<dyn Interceptor>> + Send + Sync>;

/// Identifies an interceptor.
#[derive(Clone)]
pub enum InterceptorRegistration {
    /// A live interceptor object.
    Instance(Arc<dyn Interceptor>),
    /// A provider resolved through the container.
    Token(Token),
}

impl InterceptorRegistration {
    pub fn instance(interceptor: impl Interceptor + 'static) -> Self {
        Self::Instance(Arc::new(interceptor))
    }

    /// The provider registered under type `T`.
    pub fn of<T: 'static>() -> Self {
        Self::Token(Token::of::<T>())
    }

    /// The provider registered under a string key.
    pub fn key(key: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        Self::Token(Token::key(key))
    }
}

impl From<Arc<dyn Interceptor>> for InterceptorRegistration {
    fn from(value: Arc<dyn Interceptor>) -> Self {
        Self::Instance(value)
    }
}

impl From<Token> for InterceptorRegistration {
    fn from(value: Token) -> Self {
        Self::Token(value)
    }
}

/// Instances compare by identity, tokens by value.
impl PartialEq for InterceptorRegistration {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Instance(a), Self::Instance(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Self::Token(a), Self::Token(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for InterceptorRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(i) => write!(f, "Instance({:p})", Arc::as_ptr(i)),
            Self::Token(t) => write!(f, "Token({t})"),
        }
    }
}

/// Removes duplicates, keeping the first occurrence of each registration.
pub fn dedup_registrations<I>(registrations: I) -> Vec<InterceptorRegistration>
where
    I: IntoIterator<Item = InterceptorRegistration>,
{
    let mut out: Vec<InterceptorRegistration> = Vec::new();
    for registration in registrations {
        if !out.contains(&registration) {
            out.push(registration);
        }
    }
    out
}

/// Resolves interceptor registrations and installs them on commands.
#[derive(Clone)]
pub struct InterceptorManager {
    container: Arc<dyn ModuleContainer>,
    store: &'static MetadataStore,
    translator: Arc<dyn ExceptionTranslator>,
}

impl InterceptorManager {
    pub fn new(
        container: Arc<dyn ModuleContainer>,
        store: &'static MetadataStore,
        translator: Arc<dyn ExceptionTranslator>,
    ) -> Self {
        Self {
            container,
            store,
            translator,
        }
    }

    /// Resolves a registration to a live interceptor.
    ///
    /// Token lookups are non-strict: an unknown token, or a provider that was
    /// not declared as an interceptor, yields `None`.
    pub fn resolve(&self, registration: &InterceptorRegistration) -> Option<Arc<dyn Interceptor>> {
        match registration {
            InterceptorRegistration::Instance(interceptor) => Some(interceptor.clone()),
            InterceptorRegistration::Token(token) => {
                let instance = self.container.resolve(token)?;
                let class = Any::type_id(&*instance);
                let cast = self.store.get(INTERCEPTOR_CAST, Target::Class(class))?;
                cast(instance)
            }
        }
    }

    /// Builds the before-hook for one registration.
    pub fn hook(&self, registration: &InterceptorRegistration) -> BeforeHook {
        let translator = self.translator.clone();
        match self.resolve(registration) {
            Some(interceptor) => Arc::new(move |argv: Argv| -> BoxFuture<'static, Option<String>> {
                let interceptor = interceptor.clone();
                let translator = translator.clone();
                Box::pin(async move {
                    match interceptor.intercept(&argv).await {
                        Ok(reply) => reply,
                        Err(err) => Some(translator.translate(&err).unwrap_or_default()),
                    }
                })
            }),
            None => {
                warn!(interceptor = ?registration, "Interceptor could not be resolved");
                let message = format!("interceptor {registration:?} is not available");
                Arc::new(move |_argv: Argv| -> BoxFuture<'static, Option<String>> {
                    let err = ActionError::internal(message.clone());
                    let reply = translator.translate(&err).unwrap_or_default();
                    Box::pin(async move { Some(reply) })
                })
            }
        }
    }

    /// Builds hooks for `registrations`, in order.
    pub fn hooks(&self, registrations: &[InterceptorRegistration]) -> Vec<BeforeHook> {
        registrations.iter().map(|r| self.hook(r)).collect()
    }

    /// Installs one interceptor on `command`.
    pub fn add_interceptor(&self, command: &Command, registration: &InterceptorRegistration) {
        command.before(self.hook(registration));
    }

    /// Installs every registration on `command`, preserving order.
    ///
    /// No de-duplication happens here: installing the same registration twice
    /// installs two hooks.
    pub fn add_interceptors(&self, command: &Command, registrations: &[InterceptorRegistration]) {
        if registrations.is_empty() {
            return;
        }
        for registration in registrations {
            self.add_interceptor(command, registration);
        }
        debug!(
            command = %command.name(),
            interceptors = registrations.len(),
            "Interceptors installed"
        );
    }
}
