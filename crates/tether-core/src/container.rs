//! Enumeration interface over a dependency-injection container.
//!
//! The registration engine never builds or resolves providers itself. It
//! only needs to list modules, walk their providers and controllers, and
//! resolve a token to a live instance for interceptor lookup.

use std::any::{Any, TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// A live provider instance. Holds an `Arc<T>` erased to `dyn Any`.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Identifies a provider inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Provided under its own type.
    Type { id: TypeId, name: &'static str },
    /// Provided under a string key.
    Key(Cow<'static, str>),
}

impl Token {
    pub fn of<T: 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn key(key: impl Into<Cow<'static, str>>) -> Self {
        Self::Key(key.into())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name, .. } => f.write_str(name),
            Self::Key(key) => f.write_str(key),
        }
    }
}

/// A provider or controller slot in a module.
#[derive(Clone)]
pub struct InstanceWrapper {
    pub token: Token,
    /// Concrete type of the instance; metadata is looked up by it.
    pub class: TypeId,
    pub class_name: &'static str,
    /// `None` while unresolved or when the scope is per-request.
    pub instance: Option<Instance>,
    pub is_static: bool,
}

impl InstanceWrapper {
    /// A resolved singleton provider registered under `token`.
    pub fn singleton<T: Send + Sync + 'static>(token: Token, instance: Arc<T>) -> Self {
        Self {
            token,
            class: TypeId::of::<T>(),
            class_name: type_name::<T>(),
            instance: Some(instance),
            is_static: true,
        }
    }

    /// A per-request provider. It never has an instance at startup.
    pub fn request_scoped<T: 'static>(token: Token) -> Self {
        Self {
            token,
            class: TypeId::of::<T>(),
            class_name: type_name::<T>(),
            instance: None,
            is_static: false,
        }
    }

    pub fn is_dependency_tree_static(&self) -> bool {
        self.is_static
    }
}

impl fmt::Debug for InstanceWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceWrapper")
            .field("token", &self.token)
            .field("class", &self.class_name)
            .field("resolved", &self.instance.is_some())
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// One module of the container.
pub trait Module: Send + Sync {
    fn token(&self) -> &Token;

    fn providers(&self) -> &[InstanceWrapper];

    fn controllers(&self) -> &[InstanceWrapper];

    fn has_provider(&self, token: &Token) -> bool {
        self.providers().iter().any(|w| &w.token == token)
    }

    /// Returns `true` if `token` is a provider or controller of this module.
    fn contains(&self, token: &Token) -> bool {
        self.has_provider(token) || self.controllers().iter().any(|w| &w.token == token)
    }
}

/// The container as seen by the registration engine.
pub trait ModuleContainer: Send + Sync {
    fn modules(&self) -> Vec<Arc<dyn Module>>;

    /// Non-strict lookup across all modules.
    fn resolve(&self, token: &Token) -> Option<Instance>;
}
