//! Context selectors and scope composition.
//!
//! Every scope function has the shape `&Context -> Option<Context>`. A
//! `None` result keeps the current context, so a chain of scopes is a fold
//! where each step either narrows the running context or leaves it alone.

use std::sync::Arc;

use tether_core::{Context, Selection};
use tracing::trace;

/// A scope-narrowing function.
pub type ScopeFn = Arc<dyn Fn(&Context) -> Option<Context> + Send + Sync>;

/// Wraps a closure as a [`ScopeFn`].
pub fn scope_fn<F>(f: F) -> ScopeFn
where
    F: Fn(&Context) -> Option<Context> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Keeps `prev` unless a step produced a replacement.
pub fn coalesce<T>(prev: T, next: Option<T>) -> T {
    next.unwrap_or(prev)
}

/// Describes the context a plugin or module should be scoped to.
#[derive(Clone, Default)]
pub struct ContextSelector {
    pub select: Option<Selection>,
    pub use_selector: Option<ScopeFn>,
}

impl std::fmt::Debug for ContextSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSelector")
            .field("select", &self.select)
            .field("use_selector", &self.use_selector.is_some())
            .finish()
    }
}

impl ContextSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.select = Some(selection);
        self
    }

    pub fn use_selector<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> Option<Context> + Send + Sync + 'static,
    {
        self.use_selector = Some(Arc::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.select.is_none() && self.use_selector.is_none()
    }
}

/// Narrows `ctx` by the selection, then by the custom selector.
pub fn apply_selector(ctx: &Context, selector: &ContextSelector) -> Context {
    let mut ctx = match &selector.select {
        Some(selection) => ctx.select(selection),
        None => ctx.clone(),
    };
    if let Some(f) = &selector.use_selector {
        ctx = coalesce(ctx.clone(), f(&ctx));
    }
    ctx
}

/// Threads `ctx` through `scopes` in order.
pub fn apply_scopes(ctx: &Context, scopes: &[ScopeFn]) -> Context {
    if !scopes.is_empty() {
        trace!(scopes = scopes.len(), "Applying context scopes");
    }
    scopes
        .iter()
        .fold(ctx.clone(), |ctx, scope| {
            let next = scope(&ctx);
            coalesce(ctx, next)
        })
}
