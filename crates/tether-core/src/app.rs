//! The shared application state every [`Context`] is a view over.
//!
//! [`App`] owns the command table, middleware chain, event listeners,
//! installed plugin names and capability slots. Contexts never copy this
//! state; they only carry a filter and a handle back to the app.
//!
//! Locks are held only while reading or writing the tables, never across an
//! `.await`. Listeners and middleware are snapshotted before being invoked.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::command::{Command, CommandConfig, shell_split};
use crate::context::{Context, Filter};
use crate::error::{ActionError, ExceptionTranslator};
use crate::session::Session;

/// A value stored in a capability slot.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// An event listener.
pub type Listener = Arc<dyn Fn(EventArgs) -> BoxFuture<'static, ()> + Send + Sync>;

/// A session middleware. Call [`Next::run`] to continue the chain.
pub type Middleware =
    Arc<dyn Fn(Arc<Session>, Next) -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Arguments passed to event listeners.
#[derive(Debug, Clone, Default)]
pub struct EventArgs {
    pub session: Option<Arc<Session>>,
    pub payload: Value,
}

impl EventArgs {
    pub fn with_session(session: Arc<Session>) -> Self {
        Self {
            session: Some(session),
            payload: Value::Null,
        }
    }
}

/// Name of the event emitted when capability `name` is provided.
pub fn service_event(name: &str) -> String {
    format!("service/{name}")
}

/// Name under which hooks running ahead of event `name` are stored.
pub fn before_event(name: &str) -> String {
    format!("before-{name}")
}

// =============================================================================
// Translator used until the host installs its own
// =============================================================================

/// Shows user-facing errors and drops everything else after logging it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplyTranslator;

impl ExceptionTranslator for ReplyTranslator {
    fn translate(&self, err: &ActionError) -> Option<String> {
        match err {
            ActionError::Reply { message, .. } => Some(message.clone()),
            ActionError::Internal(source) => {
                error!(error = %source, "Unhandled action error");
                None
            }
        }
    }
}

// =============================================================================
// App
// =============================================================================

struct Entry<T> {
    filter: Filter,
    handler: T,
}

impl<T: Clone> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            handler: self.handler.clone(),
        }
    }
}

#[derive(Default)]
struct AppState {
    commands: Vec<Command>,
    middlewares: Vec<Entry<Middleware>>,
    listeners: HashMap<String, Vec<Entry<Listener>>>,
    plugins: Vec<String>,
    services: HashMap<String, ServiceArc>,
}

/// Root of the context tree.
pub struct App {
    state: RwLock<AppState>,
    translator: RwLock<Arc<dyn ExceptionTranslator>>,
}

impl App {
    /// Creates an empty app.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(AppState::default()),
            translator: RwLock::new(Arc::new(ReplyTranslator)),
        })
    }

    /// Returns the root context, which accepts every session.
    pub fn context(self: &Arc<Self>) -> Context {
        Context::root(self.clone())
    }

    pub fn translator(&self) -> Arc<dyn ExceptionTranslator> {
        self.translator.read().clone()
    }

    /// Replaces the translator used for command errors.
    pub fn set_translator(&self, translator: Arc<dyn ExceptionTranslator>) {
        *self.translator.write() = translator;
    }

    /// Looks up a command by name or alias.
    pub fn command(&self, name: &str) -> Option<Command> {
        self.state
            .read()
            .commands
            .iter()
            .find(|c| c.is_named(name))
            .cloned()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.state.read().commands.clone()
    }

    /// Names of installed plugins, in installation order.
    pub fn plugins(&self) -> Vec<String> {
        self.state.read().plugins.clone()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.state.read().listeners.get(event).map_or(0, Vec::len)
    }

    pub fn middleware_count(&self) -> usize {
        self.state.read().middlewares.len()
    }

    pub fn service(&self, name: &str) -> Option<ServiceArc> {
        self.state.read().services.get(name).cloned()
    }

    /// Writes a capability slot and returns the previous value.
    ///
    /// `None` clears the slot quietly. Assigning a value notifies the slot's
    /// `service/<name>` listeners, so consumers see late and replaced
    /// capabilities.
    pub async fn set_service(&self, name: &str, value: Option<ServiceArc>) -> Option<ServiceArc> {
        let (previous, listeners) = {
            let mut state = self.state.write();
            let Some(value) = value else {
                debug!(service = name, "Service cleared");
                return state.services.remove(name);
            };
            let previous = state.services.insert(name.to_owned(), value);
            let listeners: Vec<Listener> = state
                .listeners
                .get(&service_event(name))
                .map(|l| l.iter().map(|e| e.handler.clone()).collect())
                .unwrap_or_default();
            (previous, listeners)
        };
        debug!(service = name, listeners = listeners.len(), "Service provided");
        for listener in listeners {
            listener(EventArgs::default()).await;
        }
        previous
    }

    /// Fills a capability slot and notifies its `service/<name>` listeners.
    pub async fn provide(&self, name: &str, value: ServiceArc) {
        self.set_service(name, Some(value)).await;
    }

    /// Emits `event` to every listener whose context accepts the session.
    ///
    /// Hooks added through [`Context::before`] run first. Events without a
    /// session reach every listener.
    pub async fn emit(&self, event: &str, args: EventArgs) {
        self.notify(&before_event(event), &args).await;
        self.notify(event, &args).await;
    }

    async fn notify(&self, event: &str, args: &EventArgs) {
        let listeners: Vec<Listener> = {
            let state = self.state.read();
            let Some(entries) = state.listeners.get(event) else {
                return;
            };
            entries
                .iter()
                .filter(|e| args.session.as_deref().is_none_or(|s| (e.filter)(s)))
                .map(|e| e.handler.clone())
                .collect()
        };
        trace!(event, listeners = listeners.len(), "Emitting event");
        for listener in listeners {
            listener(args.clone()).await;
        }
    }

    /// Feeds a session through the app.
    ///
    /// Emits `message`, then runs every matching middleware in order. When the
    /// chain falls through, the session content is dispatched to the first
    /// matching command or shortcut.
    pub async fn receive(self: &Arc<Self>, session: Session) -> Option<String> {
        let session = Arc::new(session);
        self.emit("message", EventArgs::with_session(session.clone()))
            .await;
        let chain: Vec<Middleware> = self
            .state
            .read()
            .middlewares
            .iter()
            .filter(|e| (e.filter)(&session))
            .map(|e| e.handler.clone())
            .collect();
        Next {
            chain: chain.into(),
            index: 0,
            app: self.clone(),
        }
        .run(session)
        .await
    }

    async fn dispatch(&self, session: Arc<Session>) -> Option<String> {
        let commands: Vec<Command> = self
            .commands()
            .into_iter()
            .filter(|c| c.matches(&session))
            .collect();

        for command in &commands {
            if let Some(mut argv) = command.match_shortcut(&session.content) {
                argv.session = Some(session.clone());
                return command.execute(argv).await;
            }
        }

        let name = shell_split(&session.content).into_iter().next()?;
        let command = commands.into_iter().find(|c| c.is_named(&name))?;
        match command.parse(&session.content) {
            Ok(mut argv) => {
                argv.session = Some(session);
                command.execute(argv).await
            }
            Err(err) => self.translator().translate(&err),
        }
    }

    // ─── Mutation used by Context ────────────────────────────────────────────

    pub(crate) fn add_command(
        self: &Arc<Self>,
        def: &str,
        description: &str,
        config: CommandConfig,
        filter: Filter,
    ) -> (Command, bool) {
        let mut state = self.state.write();
        let name = def.split_whitespace().next().unwrap_or_default();
        if let Some(existing) = state.commands.iter().find(|c| c.name() == name) {
            return (existing.clone(), false);
        }
        let command = Command::new(def, description, config, filter, Arc::downgrade(self));
        state.commands.push(command.clone());
        (command, true)
    }

    pub(crate) fn add_middleware(&self, filter: Filter, handler: Middleware, prepend: bool) {
        let entry = Entry { filter, handler };
        let mut state = self.state.write();
        if prepend {
            state.middlewares.insert(0, entry);
        } else {
            state.middlewares.push(entry);
        }
    }

    pub(crate) fn add_listener(&self, event: &str, filter: Filter, handler: Listener, prepend: bool) {
        let mut state = self.state.write();
        push_listener(&mut state, event, Entry { filter, handler }, prepend);
    }

    /// Registers a `service/<name>` listener and reports, under the same lock,
    /// whether the slot is already filled.
    pub(crate) fn add_service_listener(
        &self,
        name: &str,
        filter: Filter,
        handler: Listener,
        prepend: bool,
    ) -> bool {
        let mut state = self.state.write();
        push_listener(&mut state, &service_event(name), Entry { filter, handler }, prepend);
        state.services.contains_key(name)
    }

    pub(crate) fn record_plugin(&self, name: &str) {
        self.state.write().plugins.push(name.to_owned());
    }
}

fn push_listener(state: &mut AppState, event: &str, entry: Entry<Listener>, prepend: bool) {
    let list = state.listeners.entry(event.to_owned()).or_default();
    if prepend {
        list.insert(0, entry);
    } else {
        list.push(entry);
    }
}

// =============================================================================
// Next
// =============================================================================

/// Continuation handed to a middleware.
pub struct Next {
    chain: Arc<[Middleware]>,
    index: usize,
    app: Arc<App>,
}

impl Next {
    /// Runs the rest of the chain, ending in command dispatch.
    pub fn run(self, session: Arc<Session>) -> BoxFuture<'static, Option<String>> {
        Box::pin(async move {
            match self.chain.get(self.index).cloned() {
                Some(middleware) => {
                    let next = Next {
                        chain: self.chain.clone(),
                        index: self.index + 1,
                        app: self.app.clone(),
                    };
                    middleware(session, next).await
                }
                None => self.app.dispatch(session).await,
            }
        })
    }
}
