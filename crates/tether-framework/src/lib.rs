//! # Tether Framework
//!
//! Metadata-driven registration of container providers into a chat-bot host.
//!
//! Providers describe their registration points once, through
//! [`Injectable::describe`]. At startup the [`Registrar`] walks the container
//! in two passes:
//!
//! 1. **pre-register**: bind [`ServiceWire`] fields to their capability slots;
//! 2. **register**: provide declared capabilities, then attach middleware,
//!    event listeners, plugins and commands to each point's resolved context.
//!
//! The [`ContextResolver`] computes that context from module selections,
//! class scopes and member scopes. The [`InterceptorManager`] installs
//! interceptors (global, then class, then method) as before-hooks on every
//! registered command.

pub mod binding;
pub mod declare;
pub mod error;
pub mod exception;
pub mod fetcher;
pub mod graph;
pub mod interceptor;
pub mod keys;
pub mod registrar;
pub mod resolver;
pub mod selector;
pub mod template;
pub mod wire;

pub use binding::bind_arguments;
pub use declare::{
    ActionArgs, Binding, Bound, ClassBuilder, CommandMutator, Declare, Injectable, MethodBuilder,
    MethodHandler, PluginDef, Registration, describe,
};
pub use error::{RegistrationError, RegistrationResult};
pub use exception::{DEFAULT_ACTION_ERROR_MESSAGE, ExceptionHandler};
pub use fetcher::MetadataFetcher;
pub use graph::{GraphModule, ModuleBuilder, ModuleGraph, ModuleGraphBuilder};
pub use interceptor::{
    Interceptor, InterceptorCaster, InterceptorManager, InterceptorRegistration,
    dedup_registrations,
};
pub use registrar::{Registrar, RegistrationReport};
pub use resolver::ContextResolver;
pub use selector::{ContextSelector, ScopeFn, apply_scopes, apply_selector, coalesce, scope_fn};
pub use template::Template;
pub use wire::{ServiceWire, WireBinding};

/// Everything needed to declare injectable providers.
pub mod prelude {
    pub use crate::declare::{ActionArgs, ClassBuilder, Declare, Injectable, PluginDef};
    pub use crate::interceptor::{Interceptor, InterceptorRegistration};
    pub use crate::selector::ContextSelector;
    pub use crate::wire::ServiceWire;
    pub use async_trait::async_trait;
    pub use tether_core::{
        ActionError, ActionResult, Argv, CommandConfig, Context, EventArgs, Next, OptionConfig,
        ScopeKind, Selection, Session, ShortcutConfig,
    };
}
