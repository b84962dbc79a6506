//! Context resolution.
//!
//! A provider's context is the root context narrowed, in order, by:
//!
//! 1. the selection of every module that contains the provider,
//! 2. the provider's class-level scopes,
//! 3. for a registration point, the member-level scopes.
//!
//! A scope step that yields nothing leaves the context unchanged.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use tether_core::{Context, Module, ModuleContainer, ScopeKind, Token};
use tracing::trace;

use crate::fetcher::MetadataFetcher;
use crate::interceptor::{InterceptorManager, InterceptorRegistration, dedup_registrations};
use crate::keys::{COMMAND_INTERCEPTORS, ON_CONTEXT_SCOPE};
use crate::selector::{ContextSelector, apply_scopes, apply_selector};

/// Computes the effective context of providers and registration points.
pub struct ContextResolver {
    container: Arc<dyn ModuleContainer>,
    fetcher: MetadataFetcher,
    module_selections: HashMap<Token, ContextSelector>,
    global_interceptors: Vec<InterceptorRegistration>,
    interceptors: InterceptorManager,
}

impl ContextResolver {
    pub fn new(
        container: Arc<dyn ModuleContainer>,
        fetcher: MetadataFetcher,
        interceptors: InterceptorManager,
    ) -> Self {
        Self {
            container,
            fetcher,
            module_selections: HashMap::new(),
            global_interceptors: Vec::new(),
            interceptors,
        }
    }

    /// Narrows every provider of module `token` by `selector`.
    pub fn with_module_selection(mut self, token: Token, selector: ContextSelector) -> Self {
        self.module_selections.insert(token, selector);
        self
    }

    /// Interceptors installed on every command, ahead of class and member ones.
    pub fn with_global_interceptors<I>(mut self, registrations: I) -> Self
    where
        I: IntoIterator<Item = InterceptorRegistration>,
    {
        self.global_interceptors.extend(registrations);
        self
    }

    pub fn container(&self) -> &Arc<dyn ModuleContainer> {
        &self.container
    }

    pub fn fetcher(&self) -> MetadataFetcher {
        self.fetcher
    }

    pub fn interceptors(&self) -> &InterceptorManager {
        &self.interceptors
    }

    pub fn global_interceptors(&self) -> &[InterceptorRegistration] {
        &self.global_interceptors
    }

    // ─── Steps ───────────────────────────────────────────────────────────────

    /// Applies the selection configured for `module`, if any.
    pub fn module_context(&self, ctx: &Context, module: &dyn Module) -> Context {
        match self.module_selections.get(module.token()) {
            Some(selector) => {
                trace!(module = %module.token(), "Applying module selection");
                apply_selector(ctx, selector)
            }
            None => ctx.clone(),
        }
    }

    /// Applies the class-level scopes of `class`.
    pub fn provider_context(&self, ctx: &Context, class: TypeId) -> Context {
        apply_scopes(ctx, &self.fetcher.class_array(ON_CONTEXT_SCOPE, class))
    }

    /// Applies the member-level scopes of `class::member`.
    pub fn point_context(&self, ctx: &Context, class: TypeId, member: &'static str) -> Context {
        apply_scopes(ctx, &self.fetcher.member_array(ON_CONTEXT_SCOPE, class, member))
    }

    /// Module selections of `modules` in order, then the class scopes.
    pub fn instance_context(
        &self,
        root: &Context,
        modules: &[Arc<dyn Module>],
        class: TypeId,
    ) -> Context {
        let ctx = modules
            .iter()
            .fold(root.clone(), |ctx, module| self.module_context(&ctx, module.as_ref()));
        self.provider_context(&ctx, class)
    }

    // ─── Tokens ──────────────────────────────────────────────────────────────

    /// The effective context of the provider registered under `token`.
    pub fn resolve(&self, root: &Context, token: &Token) -> Context {
        let modules: Vec<_> = self
            .container
            .modules()
            .into_iter()
            .filter(|m| m.contains(token))
            .collect();
        match self.class_of(&modules, token) {
            Some(class) => self.instance_context(root, &modules, class),
            None => modules
                .iter()
                .fold(root.clone(), |ctx, module| self.module_context(&ctx, module.as_ref())),
        }
    }

    /// A context for a consumer outside the registration flow.
    ///
    /// Besides the scopes of [`resolve`](Self::resolve), commands created on
    /// the returned context receive the global interceptors followed by the
    /// interceptors declared on the consumer's class.
    pub fn inject_context(&self, root: &Context, token: &Token) -> Context {
        let ctx = self.resolve(root, token);
        let class_level = self
            .class_of_token(token)
            .map(|class| self.fetcher.class_array(COMMAND_INTERCEPTORS, class))
            .unwrap_or_default();
        let registrations = dedup_registrations(
            self.global_interceptors.iter().cloned().chain(class_level),
        );
        ctx.with_hooks(self.interceptors.hooks(&registrations))
    }

    /// [`inject_context`](Self::inject_context) narrowed by one more scope.
    pub fn inject_context_scoped<I, S>(
        &self,
        root: &Context,
        token: &Token,
        kind: ScopeKind,
        values: I,
    ) -> Context
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inject_context(root, token).scope(kind, values)
    }

    fn class_of_token(&self, token: &Token) -> Option<TypeId> {
        self.class_of(&self.container.modules(), token)
    }

    fn class_of(&self, modules: &[Arc<dyn Module>], token: &Token) -> Option<TypeId> {
        modules
            .iter()
            .find_map(|m| {
                m.providers()
                    .iter()
                    .chain(m.controllers())
                    .find(|w| &w.token == token)
                    .map(|w| w.class)
            })
            .or(match token {
                Token::Type { id, .. } => Some(*id),
                Token::Key(_) => None,
            })
    }
}
