//! In-memory module graph.
//!
//! [`ModuleGraph`] implements [`ModuleContainer`] for applications that
//! wire their providers by hand, and for tests. Adding a provider runs its
//! [`Injectable::describe`] against the graph's metadata store.
//!
//! ```rust,ignore
//! let graph = ModuleGraph::builder()
//!     .module::<ChatModule>(|m| {
//!         m.provider(Arc::new(EchoService::default()))
//!             .provider(Arc::new(PooInterceptor))
//!             .request_scoped::<PerRequest>();
//!     })
//!     .build();
//! ```

use std::sync::Arc;

use tether_core::{Instance, InstanceWrapper, MetadataStore, Module, ModuleContainer, Token};
use tracing::debug;

use crate::declare::{Injectable, describe};

/// A module of a [`ModuleGraph`].
#[derive(Debug)]
pub struct GraphModule {
    token: Token,
    providers: Vec<InstanceWrapper>,
    controllers: Vec<InstanceWrapper>,
}

impl Module for GraphModule {
    fn token(&self) -> &Token {
        &self.token
    }

    fn providers(&self) -> &[InstanceWrapper] {
        &self.providers
    }

    fn controllers(&self) -> &[InstanceWrapper] {
        &self.controllers
    }
}

/// A fixed set of modules.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Arc<GraphModule>>,
}

impl ModuleGraph {
    /// A builder describing providers into the global metadata store.
    pub fn builder() -> ModuleGraphBuilder {
        ModuleGraphBuilder::new(MetadataStore::global())
    }
}

impl ModuleContainer for ModuleGraph {
    fn modules(&self) -> Vec<Arc<dyn Module>> {
        self.modules
            .iter()
            .map(|m| m.clone() as Arc<dyn Module>)
            .collect()
    }

    fn resolve(&self, token: &Token) -> Option<Instance> {
        self.modules
            .iter()
            .flat_map(|m| m.providers.iter().chain(&m.controllers))
            .find(|w| &w.token == token && w.instance.is_some())
            .and_then(|w| w.instance.clone())
    }
}

/// Builds a [`ModuleGraph`].
pub struct ModuleGraphBuilder {
    store: &'static MetadataStore,
    modules: Vec<GraphModule>,
}

impl ModuleGraphBuilder {
    pub fn new(store: &'static MetadataStore) -> Self {
        Self {
            store,
            modules: Vec::new(),
        }
    }

    /// Adds the module identified by type `M`.
    pub fn module<M: 'static>(self, f: impl FnOnce(&mut ModuleBuilder<'_>)) -> Self {
        self.module_with(Token::of::<M>(), f)
    }

    /// Adds a module under an explicit token.
    pub fn module_with(mut self, token: Token, f: impl FnOnce(&mut ModuleBuilder<'_>)) -> Self {
        let mut module = GraphModule {
            token,
            providers: Vec::new(),
            controllers: Vec::new(),
        };
        f(&mut ModuleBuilder {
            store: self.store,
            module: &mut module,
        });
        debug!(
            module = %module.token,
            providers = module.providers.len(),
            controllers = module.controllers.len(),
            "Module added"
        );
        self.modules.push(module);
        self
    }

    pub fn build(self) -> Arc<ModuleGraph> {
        Arc::new(ModuleGraph {
            modules: self.modules.into_iter().map(Arc::new).collect(),
        })
    }
}

/// Adds providers and controllers to one module.
pub struct ModuleBuilder<'a> {
    store: &'static MetadataStore,
    module: &'a mut GraphModule,
}

impl ModuleBuilder<'_> {
    /// Adds a singleton provider under its own type.
    pub fn provider<T: Injectable>(&mut self, instance: Arc<T>) -> &mut Self {
        self.provider_with(Token::of::<T>(), instance)
    }

    /// Adds a singleton provider under a string key.
    pub fn provider_named<T: Injectable>(
        &mut self,
        key: impl Into<std::borrow::Cow<'static, str>>,
        instance: Arc<T>,
    ) -> &mut Self {
        self.provider_with(Token::key(key), instance)
    }

    fn provider_with<T: Injectable>(&mut self, token: Token, instance: Arc<T>) -> &mut Self {
        describe::<T>(self.store);
        self.module
            .providers
            .push(InstanceWrapper::singleton(token, instance));
        self
    }

    /// Adds a singleton controller.
    pub fn controller<T: Injectable>(&mut self, instance: Arc<T>) -> &mut Self {
        describe::<T>(self.store);
        self.module
            .controllers
            .push(InstanceWrapper::singleton(Token::of::<T>(), instance));
        self
    }

    /// Adds a per-request provider. It is never registered.
    pub fn request_scoped<T: Injectable>(&mut self) -> &mut Self {
        describe::<T>(self.store);
        self.module
            .providers
            .push(InstanceWrapper::request_scoped::<T>(Token::of::<T>()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shared;
    impl Injectable for Shared {}

    struct PerRequest;
    impl Injectable for PerRequest {}

    struct ModA;
    struct ModB;

    #[test]
    fn test_modules_and_resolution() {
        let shared = Arc::new(Shared);
        let graph = ModuleGraph::builder()
            .module::<ModA>(|m| {
                m.provider(shared.clone()).request_scoped::<PerRequest>();
            })
            .module::<ModB>(|m| {
                m.provider_named("shared", shared.clone());
            })
            .build();

        let modules = graph.modules();
        assert_eq!(modules.len(), 2);
        assert!(modules[0].has_provider(&Token::of::<Shared>()));
        assert!(!modules[1].has_provider(&Token::of::<Shared>()));
        assert!(modules[1].contains(&Token::key("shared")));

        assert!(graph.resolve(&Token::of::<Shared>()).is_some());
        assert!(graph.resolve(&Token::key("shared")).is_some());
        assert!(graph.resolve(&Token::of::<PerRequest>()).is_none());
    }
}
