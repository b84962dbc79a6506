//! Filtered views over the [`App`].
//!
//! A [`Context`] is a filter plus a handle to the shared app. Every algebra
//! operation (`union`, `intersect`, `except`, `select`, the scope helpers)
//! returns a new view and leaves the receiver untouched. Registrations made
//! through a context (commands, middleware, listeners) remember its filter.
//!
//! A context may also carry before-hooks. They travel with every derived view
//! and are installed on each command the view creates.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::app::{App, EventArgs, Listener, Middleware, ServiceArc, before_event};
use crate::command::{BeforeHook, Command, CommandConfig};
use crate::error::{CoreError, CoreResult};
use crate::plugin::Plugin;
use crate::selection::{ScopeKind, Selection};
use crate::session::Session;

/// A session predicate.
pub type Filter = Arc<dyn Fn(&Session) -> bool + Send + Sync>;

/// Wraps a closure as a [`Filter`].
pub fn predicate<F>(f: F) -> Filter
where
    F: Fn(&Session) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Anything usable as the right-hand side of a context operation.
pub trait IntoFilter {
    fn into_filter(self) -> Filter;
}

impl IntoFilter for Filter {
    fn into_filter(self) -> Filter {
        self
    }
}

impl IntoFilter for Context {
    fn into_filter(self) -> Filter {
        self.filter
    }
}

impl IntoFilter for &Context {
    fn into_filter(self) -> Filter {
        self.filter.clone()
    }
}

impl IntoFilter for Selection {
    fn into_filter(self) -> Filter {
        Arc::new(move |s| self.matches(s))
    }
}

impl IntoFilter for &Selection {
    fn into_filter(self) -> Filter {
        self.clone().into_filter()
    }
}

/// A filtered view over the app.
#[derive(Clone)]
pub struct Context {
    app: Arc<App>,
    filter: Filter,
    hooks: Vec<BeforeHook>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub(crate) fn root(app: Arc<App>) -> Self {
        Self {
            app,
            filter: Arc::new(|_| true),
            hooks: Vec::new(),
        }
    }

    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// Returns `true` if this context accepts `session`.
    pub fn filter(&self, session: &Session) -> bool {
        (self.filter)(session)
    }

    fn derive(&self, filter: Filter) -> Self {
        Self {
            app: self.app.clone(),
            filter,
            hooks: self.hooks.clone(),
        }
    }

    // ─── Algebra ─────────────────────────────────────────────────────────────

    /// A view accepting every session.
    pub fn any(&self) -> Self {
        self.derive(Arc::new(|_| true))
    }

    /// A view accepting no session.
    pub fn never(&self) -> Self {
        self.derive(Arc::new(|_| false))
    }

    pub fn union(&self, other: impl IntoFilter) -> Self {
        let (a, b) = (self.filter.clone(), other.into_filter());
        self.derive(Arc::new(move |s| a(s) || b(s)))
    }

    pub fn intersect(&self, other: impl IntoFilter) -> Self {
        let (a, b) = (self.filter.clone(), other.into_filter());
        self.derive(Arc::new(move |s| a(s) && b(s)))
    }

    pub fn except(&self, other: impl IntoFilter) -> Self {
        let (a, b) = (self.filter.clone(), other.into_filter());
        self.derive(Arc::new(move |s| a(s) && !b(s)))
    }

    /// Narrows by a single session attribute.
    ///
    /// An empty `values` list only requires the attribute to be present.
    pub fn scope<I, S>(&self, kind: ScopeKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.intersect(predicate(move |s| kind.matches(s, &values)))
    }

    pub fn user<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope(ScopeKind::User, ids)
    }

    pub fn guild<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope(ScopeKind::Guild, ids)
    }

    pub fn channel<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope(ScopeKind::Channel, ids)
    }

    pub fn self_id<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope(ScopeKind::SelfId, ids)
    }

    pub fn platform<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope(ScopeKind::Platform, names)
    }

    pub fn private<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope(ScopeKind::Private, ids)
    }

    /// Narrows by a selection expression.
    pub fn select(&self, selection: &Selection) -> Self {
        self.intersect(selection)
    }

    // ─── Hooks ───────────────────────────────────────────────────────────────

    pub fn hooks(&self) -> &[BeforeHook] {
        &self.hooks
    }

    /// Returns a view that installs `hooks` on every command it creates,
    /// after the hooks this view already carries.
    pub fn with_hooks(&self, hooks: impl IntoIterator<Item = BeforeHook>) -> Self {
        let mut ctx = self.clone();
        ctx.hooks.extend(hooks);
        ctx
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Creates a command on this view, or returns the existing command with
    /// the same name.
    pub fn command(&self, def: &str, description: &str, config: CommandConfig) -> Command {
        let (command, created) =
            self.app
                .add_command(def, description, config, self.filter.clone());
        if created {
            for hook in &self.hooks {
                command.before(hook.clone());
            }
            debug!(command = %command.name(), hooks = self.hooks.len(), "Command created");
        }
        command
    }

    pub fn middleware(&self, middleware: Middleware, prepend: bool) {
        self.app
            .add_middleware(self.filter.clone(), middleware, prepend);
    }

    pub fn on(&self, event: &str, listener: Listener, prepend: bool) {
        self.app
            .add_listener(event, self.filter.clone(), listener, prepend);
    }

    /// Adds a hook that runs ahead of the listeners of `event`.
    pub fn before(&self, event: &str, listener: Listener, prepend: bool) {
        self.app
            .add_listener(&before_event(event), self.filter.clone(), listener, prepend);
    }

    /// Listens for capability `name` becoming available.
    ///
    /// Returns `true` if the capability was already present when the listener
    /// was added; the listener is not invoked in that case.
    pub fn on_service(&self, name: &str, listener: Listener, prepend: bool) -> bool {
        self.app
            .add_service_listener(name, self.filter.clone(), listener, prepend)
    }

    pub async fn emit(&self, event: &str, args: EventArgs) {
        self.app.emit(event, args).await;
    }

    /// Installs `plugin` on this view.
    ///
    /// Options equal to `false` disable the plugin; `Ok(false)` is returned and
    /// nothing is installed.
    pub async fn plugin(&self, plugin: Arc<dyn Plugin>, options: Value) -> CoreResult<bool> {
        if options == Value::Bool(false) {
            debug!(plugin = %plugin.name(), "Plugin disabled by options");
            return Ok(false);
        }
        plugin
            .apply(self.clone(), options)
            .await
            .map_err(|source| CoreError::PluginApply {
                plugin: plugin.name().to_owned(),
                source,
            })?;
        self.app.record_plugin(plugin.name());
        info!(plugin = %plugin.name(), "Plugin installed");
        Ok(true)
    }

    // ─── Capability slots ────────────────────────────────────────────────────

    pub fn service(&self, name: &str) -> Option<ServiceArc> {
        self.app.service(name)
    }

    /// Reads a capability slot and downcasts it to `Arc<T>`.
    pub fn service_as<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        self.service(name)?.downcast::<T>().ok()
    }

    /// Writes a capability slot; see [`App::set_service`].
    pub async fn set_service(&self, name: &str, value: Option<ServiceArc>) -> Option<ServiceArc> {
        self.app.set_service(name, value).await
    }

    pub async fn provide(&self, name: &str, value: ServiceArc) {
        self.app.provide(name, value).await;
    }
}
