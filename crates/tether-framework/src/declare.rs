//! Declaration builders.
//!
//! Providers describe their registration points once, through
//! [`Injectable::describe`]. The builders write plain metadata into the
//! store: scopes, interceptors, command mutators, capability provision,
//! service wires and, for each member, one [`Registration`] with its erased
//! [`MethodHandler`].
//!
//! ```rust,ignore
//! impl Injectable for EchoService {
//!     fn describe(class: ClassBuilder<'_, Self>) {
//!         class.on_platform(["discord"]);
//!         class
//!             .method("on_echo")
//!             .on_guild(["1111111111"])
//!             .put_option(0, "content", "-c <content:string>")
//!             .command("echo", "hi", CommandConfig::default(), |this, args| async move {
//!                 Ok(Some(format!("bot: {}", args.str(0).unwrap_or_default())))
//!             });
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tether_core::{
    ActionResult, Argv, Command, CommandConfig, Context, EventArgs, Instance, Listener,
    MetadataKey, MetadataStore, Middleware, Next, OptionConfig, Plugin, ScopeKind, Selection,
    Session, ShortcutConfig, Target,
};

use crate::interceptor::{Interceptor, InterceptorCaster, InterceptorRegistration};
use crate::keys::{
    COMMAND_DEFINITION, COMMAND_INTERCEPTORS, DO_REGISTER, INTERCEPTOR_CAST, MEMBERS,
    METHOD_HANDLER, ON_CONTEXT_SCOPE, SERVICE_PROVIDE, SERVICE_WIRE,
};
use crate::selector::{ContextSelector, scope_fn};
use crate::wire::{ServiceWire, WireBinding};

// =============================================================================
// Descriptors
// =============================================================================

/// A command mutator. Returning `None` keeps the current command.
pub type CommandMutator = Arc<dyn Fn(&Command) -> Option<Command> + Send + Sync>;

/// What a registration point attaches.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Middleware {
        prepend: bool,
    },
    Event {
        name: String,
        prepend: bool,
    },
    /// A hook running ahead of the listeners of event `name`.
    BeforeEvent {
        name: String,
        prepend: bool,
    },
    /// The method produces a [`PluginDef`] when called.
    Plugin,
    Command {
        def: String,
        desc: String,
        config: CommandConfig,
        bindings: Vec<Binding>,
    },
}

impl Registration {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Middleware { .. } => "middleware",
            Self::Event { .. } => "event",
            Self::BeforeEvent { .. } => "before-event",
            Self::Plugin => "plugin",
            Self::Command { .. } => "command",
        }
    }
}

/// How one positional handler argument is produced from an invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Binding {
    /// An index no binding was declared for; yields `Null`.
    #[default]
    Unset,
    Argv,
    Session,
    /// All positional arguments, as an array.
    Args,
    Arg(usize),
    Option {
        name: String,
        desc: String,
        config: OptionConfig,
    },
    SessionField(String),
    User(Vec<String>),
    Channel(Vec<String>),
    Username {
        use_database: bool,
    },
    /// A constant, rendered from templates at registration time.
    Value(Value),
}

/// The plugin a plugin method asks to install.
#[derive(Clone)]
pub struct PluginDef {
    pub plugin: Arc<dyn Plugin>,
    pub options: Value,
    pub selector: ContextSelector,
}

impl PluginDef {
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self {
            plugin,
            options: Value::Null,
            selector: ContextSelector::default(),
        }
    }

    pub fn options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.selector.select = Some(selection);
        self
    }

    pub fn use_selector<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context) -> Option<Context> + Send + Sync + 'static,
    {
        self.selector.use_selector = Some(scope_fn(f));
        self
    }
}

// =============================================================================
// Handler arguments
// =============================================================================

/// One resolved handler argument.
#[derive(Debug, Clone)]
pub enum Bound {
    Argv(Argv),
    Session(Option<Arc<Session>>),
    Value(Value),
}

static NULL: Value = Value::Null;

/// Positional arguments handed to a command handler.
#[derive(Debug, Clone, Default)]
pub struct ActionArgs {
    bound: Vec<Bound>,
}

impl ActionArgs {
    pub fn new(bound: Vec<Bound>) -> Self {
        Self { bound }
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// The JSON value at `index`; `Null` for non-value slots.
    pub fn value(&self, index: usize) -> &Value {
        match self.bound.get(index) {
            Some(Bound::Value(v)) => v,
            _ => &NULL,
        }
    }

    pub fn str(&self, index: usize) -> Option<&str> {
        self.value(index).as_str()
    }

    /// Deserialises the value at `index`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> Option<T> {
        T::deserialize(self.value(index)).ok()
    }

    pub fn argv(&self, index: usize) -> Option<&Argv> {
        match self.bound.get(index) {
            Some(Bound::Argv(argv)) => Some(argv),
            _ => None,
        }
    }

    pub fn session(&self, index: usize) -> Option<&Arc<Session>> {
        match self.bound.get(index) {
            Some(Bound::Session(session)) => session.as_ref(),
            _ => None,
        }
    }
}

// =============================================================================
// Erased handlers
// =============================================================================

/// Binds a handler to a live instance; `None` when the instance has the
/// wrong type.
pub type Bind<H> = Arc<dyn Fn(Instance) -> Option<H> + Send + Sync>;

/// A plugin method bound to its instance.
pub type PluginProducer = Arc<dyn Fn() -> BoxFuture<'static, Option<PluginDef>> + Send + Sync>;

/// A command handler bound to its instance.
pub type BoundAction = Arc<dyn Fn(ActionArgs) -> BoxFuture<'static, ActionResult> + Send + Sync>;

/// The erased method behind a registration point.
#[derive(Clone)]
pub enum MethodHandler {
    Middleware(Bind<Middleware>),
    Event(Bind<Listener>),
    Plugin(Bind<PluginProducer>),
    Action(Bind<BoundAction>),
}

impl MethodHandler {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Middleware(_) => "middleware",
            Self::Event(_) => "event",
            Self::Plugin(_) => "plugin",
            Self::Action(_) => "command",
        }
    }

    /// Rebinds a handler of `B` to instances of `T`.
    pub fn project<T, B>(&self, project: fn(&Arc<T>) -> Arc<B>) -> Self
    where
        T: Any + Send + Sync,
        B: Any + Send + Sync,
    {
        match self {
            Self::Middleware(bind) => Self::Middleware(project_bind(bind.clone(), project)),
            Self::Event(bind) => Self::Event(project_bind(bind.clone(), project)),
            Self::Plugin(bind) => Self::Plugin(project_bind(bind.clone(), project)),
            Self::Action(bind) => Self::Action(project_bind(bind.clone(), project)),
        }
    }
}

fn project_bind<H, T, B>(bind: Bind<H>, project: fn(&Arc<T>) -> Arc<B>) -> Bind<H>
where
    H: 'static,
    T: Any + Send + Sync,
    B: Any + Send + Sync,
{
    Arc::new(move |instance: Instance| {
        let this = instance.downcast::<T>().ok()?;
        let base: Instance = project(&this);
        bind(base)
    })
}

// =============================================================================
// Injectable
// =============================================================================

/// A type whose instances may be registered.
pub trait Injectable: Any + Send + Sync + Sized {
    /// Records the type's declarations. Called once per type and store.
    fn describe(class: ClassBuilder<'_, Self>) {
        let _ = class;
    }
}

/// Runs `T::describe` against `store` unless it already ran.
pub fn describe<T: Injectable>(store: &MetadataStore) {
    store.describe_once(TypeId::of::<T>(), || T::describe(ClassBuilder::new(store)));
}

// =============================================================================
// Shared declarations
// =============================================================================

/// Declarations available on both classes and methods.
///
/// Class-level entries apply to every registration point of the class and
/// are composed ahead of method-level ones.
pub trait Declare: Sized {
    fn store(&self) -> &MetadataStore;

    fn target(&self) -> Target;

    /// Adds a scope function.
    fn on_context<F>(self, f: F) -> Self
    where
        F: Fn(&Context) -> Option<Context> + Send + Sync + 'static,
    {
        self.store()
            .append(ON_CONTEXT_SCOPE, self.target(), scope_fn(f));
        self
    }

    fn on_scope<I, S>(self, kind: ScopeKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        self.on_context(move |ctx| Some(ctx.scope(kind, values.clone())))
    }

    fn on_user<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_scope(ScopeKind::User, ids)
    }

    fn on_guild<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_scope(ScopeKind::Guild, ids)
    }

    fn on_channel<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_scope(ScopeKind::Channel, ids)
    }

    fn on_self<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_scope(ScopeKind::SelfId, ids)
    }

    fn on_platform<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_scope(ScopeKind::Platform, names)
    }

    fn on_private<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_scope(ScopeKind::Private, ids)
    }

    fn on_selection(self, selection: Selection) -> Self {
        self.on_context(move |ctx| Some(ctx.select(&selection)))
    }

    fn on_anywhere(self) -> Self {
        self.on_context(|ctx| Some(ctx.any()))
    }

    fn on_nowhere(self) -> Self {
        self.on_context(|ctx| Some(ctx.never()))
    }

    fn interceptors<I>(self, registrations: I) -> Self
    where
        I: IntoIterator<Item = InterceptorRegistration>,
    {
        self.store()
            .concat(COMMAND_INTERCEPTORS, self.target(), registrations);
        self
    }

    fn interceptor(self, registration: InterceptorRegistration) -> Self {
        self.interceptors([registration])
    }

    /// Adds a command mutator.
    fn command_def<F>(self, f: F) -> Self
    where
        F: Fn(&Command) -> Option<Command> + Send + Sync + 'static,
    {
        self.store()
            .append(COMMAND_DEFINITION, self.target(), Arc::new(f) as CommandMutator);
        self
    }

    fn description(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.command_def(move |c| Some(c.set_description(text.clone())))
    }

    fn alias(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.command_def(move |c| Some(c.alias(name.clone())))
    }

    fn usage(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.command_def(move |c| Some(c.usage(text.clone())))
    }

    fn example(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.command_def(move |c| Some(c.example(text.clone())))
    }

    fn shortcut(self, text: impl Into<String>, config: ShortcutConfig) -> Self {
        let text = text.into();
        self.command_def(move |c| Some(c.shortcut(text.clone(), config.clone())))
    }

    fn option(self, name: impl Into<String>, desc: impl Into<String>, config: OptionConfig) -> Self {
        let (name, desc) = (name.into(), desc.into());
        self.command_def(move |c| Some(c.option(&name, &desc, config.clone())))
    }

    fn user_fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.command_def(move |c| Some(c.user_fields_add(fields.clone())))
    }

    fn channel_fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.command_def(move |c| Some(c.channel_fields_add(fields.clone())))
    }
}

// =============================================================================
// ClassBuilder
// =============================================================================

/// Class-level declarations for `T`.
pub struct ClassBuilder<'a, T> {
    store: &'a MetadataStore,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ClassBuilder<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ClassBuilder<'_, T> {}

impl<T> Declare for ClassBuilder<'_, T>
where
    T: Injectable,
{
    fn store(&self) -> &MetadataStore {
        self.store
    }

    fn target(&self) -> Target {
        Target::class::<T>()
    }
}

impl<'a, T: Injectable> ClassBuilder<'a, T> {
    pub fn new(store: &'a MetadataStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Declares that instances fill capability slot `name`.
    pub fn provide(self, name: impl Into<String>) -> Self {
        self.store
            .append(SERVICE_PROVIDE, Target::class::<T>(), name.into());
        self
    }

    /// Declares a field mirroring capability slot `service`.
    pub fn wire<S>(
        self,
        property: &'static str,
        service: impl Into<String>,
        accessor: fn(&T) -> &ServiceWire<S>,
    ) -> Self
    where
        S: Send + Sync + 'static,
    {
        self.store.append(
            SERVICE_WIRE,
            Target::class::<T>(),
            WireBinding::new(property, service, accessor),
        );
        self
    }

    /// Takes over the declarations of `B`, reaching the base through
    /// `project`.
    ///
    /// Class entries of `B` are appended to those of `T`. Every registration
    /// point of `B` becomes a point of `T` unless `T` already declared a
    /// member of that name, so overrides go before this call.
    pub fn inherit<B: Injectable>(self, project: fn(&Arc<T>) -> Arc<B>) -> Self {
        describe::<B>(self.store);
        let (base, derived) = (Target::class::<B>(), Target::class::<T>());
        copy_array(self.store, ON_CONTEXT_SCOPE, base, derived);
        copy_array(self.store, COMMAND_DEFINITION, base, derived);
        copy_array(self.store, COMMAND_INTERCEPTORS, base, derived);
        copy_array(self.store, SERVICE_PROVIDE, base, derived);
        self.store.concat(
            SERVICE_WIRE,
            derived,
            self.store
                .get_array(SERVICE_WIRE, base)
                .iter()
                .map(|wire| wire.project(project)),
        );

        let own = self.store.get_array(MEMBERS, derived);
        for name in self.store.get_array(MEMBERS, base) {
            if own.contains(&name) {
                continue;
            }
            let (from, to) = (Target::member::<B>(name), Target::member::<T>(name));
            let (Some(registration), Some(handler)) = (
                self.store.get(DO_REGISTER, from),
                self.store.get(METHOD_HANDLER, from),
            ) else {
                continue;
            };
            copy_array(self.store, ON_CONTEXT_SCOPE, from, to);
            copy_array(self.store, COMMAND_DEFINITION, from, to);
            copy_array(self.store, COMMAND_INTERCEPTORS, from, to);
            self.store.set(DO_REGISTER, to, registration);
            self.store.set(METHOD_HANDLER, to, handler.project(project));
            self.store.append(MEMBERS, derived, name);
        }
        self
    }

    /// Starts declaring member `name`.
    pub fn method(self, name: &'static str) -> MethodBuilder<'a, T> {
        MethodBuilder {
            store: self.store,
            name,
            bindings: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: Injectable + Interceptor> ClassBuilder<'_, T> {
    /// Lets container tokens for `T` resolve to interceptors.
    pub fn as_interceptor(self) -> Self {
        let cast: InterceptorCaster = Arc::new(|instance: Instance| {
            instance
                .downcast::<T>()
                .ok()
                .map(|this| this as Arc<dyn Interceptor>)
        });
        self.store.set(INTERCEPTOR_CAST, Target::class::<T>(), cast);
        self
    }
}

// =============================================================================
// MethodBuilder
// =============================================================================

/// Declarations for one member of `T`.
///
/// Ends with exactly one terminal call: [`middleware`](Self::middleware),
/// [`event`](Self::event), [`before_event`](Self::before_event),
/// [`plugin`](Self::plugin) or [`command`](Self::command). A builder dropped without a terminal call
/// still keeps its scope and command declarations but is not a
/// registration point.
pub struct MethodBuilder<'a, T> {
    store: &'a MetadataStore,
    name: &'static str,
    bindings: Vec<Binding>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> Declare for MethodBuilder<'_, T> {
    fn store(&self) -> &MetadataStore {
        self.store
    }

    fn target(&self) -> Target {
        Target::member::<T>(self.name)
    }
}

impl<T: Injectable> MethodBuilder<'_, T> {
    // ─── Argument bindings ───────────────────────────────────────────────────

    /// Binds handler argument `index`.
    pub fn put(mut self, index: usize, binding: Binding) -> Self {
        if self.bindings.len() <= index {
            self.bindings.resize(index + 1, Binding::Unset);
        }
        self.bindings[index] = binding;
        self
    }

    pub fn put_argv(self, index: usize) -> Self {
        self.put(index, Binding::Argv)
    }

    pub fn put_session(self, index: usize) -> Self {
        self.put(index, Binding::Session)
    }

    pub fn put_args(self, index: usize) -> Self {
        self.put(index, Binding::Args)
    }

    pub fn put_arg(self, index: usize, position: usize) -> Self {
        self.put(index, Binding::Arg(position))
    }

    pub fn put_option(self, index: usize, name: impl Into<String>, desc: impl Into<String>) -> Self {
        self.put_option_with(index, name, desc, OptionConfig::default())
    }

    pub fn put_option_with(
        self,
        index: usize,
        name: impl Into<String>,
        desc: impl Into<String>,
        config: OptionConfig,
    ) -> Self {
        self.put(
            index,
            Binding::Option {
                name: name.into(),
                desc: desc.into(),
                config,
            },
        )
    }

    pub fn put_session_field(self, index: usize, field: impl Into<String>) -> Self {
        self.put(index, Binding::SessionField(field.into()))
    }

    pub fn put_user<I, S>(self, index: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.put(index, Binding::User(fields.into_iter().map(Into::into).collect()))
    }

    pub fn put_channel<I, S>(self, index: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.put(index, Binding::Channel(fields.into_iter().map(Into::into).collect()))
    }

    pub fn put_username(self, index: usize, use_database: bool) -> Self {
        self.put(index, Binding::Username { use_database })
    }

    pub fn put_value(self, index: usize, value: impl Into<Value>) -> Self {
        self.put(index, Binding::Value(value.into()))
    }

    pub fn put_user_id(self, index: usize) -> Self {
        self.put_session_field(index, "userId")
    }

    pub fn put_guild_id(self, index: usize) -> Self {
        self.put_session_field(index, "guildId")
    }

    pub fn put_guild_name(self, index: usize) -> Self {
        self.put_session_field(index, "guildName")
    }

    pub fn put_channel_id(self, index: usize) -> Self {
        self.put_session_field(index, "channelId")
    }

    pub fn put_channel_name(self, index: usize) -> Self {
        self.put_session_field(index, "channelName")
    }

    pub fn put_self_id(self, index: usize) -> Self {
        self.put_session_field(index, "selfId")
    }

    // ─── Terminals ───────────────────────────────────────────────────────────

    fn finish(self, registration: Registration, handler: MethodHandler) {
        let target = Target::member::<T>(self.name);
        self.store.set(DO_REGISTER, target, registration);
        self.store.set(METHOD_HANDLER, target, handler);
        self.store.append(MEMBERS, Target::class::<T>(), self.name);
    }

    /// Registers the method as session middleware.
    pub fn middleware<F, Fut>(self, prepend: bool, f: F)
    where
        F: Fn(Arc<T>, Arc<Session>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<String>> + Send + 'static,
    {
        let f = Arc::new(f);
        let bind: Bind<Middleware> = Arc::new(move |instance: Instance| {
            let this = instance.downcast::<T>().ok()?;
            let f = f.clone();
            let middleware: Middleware = Arc::new(
                move |session: Arc<Session>, next: Next| -> BoxFuture<'static, Option<String>> {
                    Box::pin(f(this.clone(), session, next))
                },
            );
            Some(middleware)
        });
        self.finish(Registration::Middleware { prepend }, MethodHandler::Middleware(bind));
    }

    /// Registers the method as a listener for `event`.
    ///
    /// `service/<name>` events also fire once at registration when the
    /// capability is already present.
    pub fn event<F, Fut>(self, event: impl Into<String>, prepend: bool, f: F)
    where
        F: Fn(Arc<T>, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let registration = Registration::Event {
            name: event.into(),
            prepend,
        };
        self.finish(registration, MethodHandler::Event(bind_listener(f)));
    }

    /// Registers the method as a hook running ahead of `event`.
    pub fn before_event<F, Fut>(self, event: impl Into<String>, prepend: bool, f: F)
    where
        F: Fn(Arc<T>, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let registration = Registration::BeforeEvent {
            name: event.into(),
            prepend,
        };
        self.finish(registration, MethodHandler::Event(bind_listener(f)));
    }

    /// Registers the method as a plugin producer.
    ///
    /// Returning `None` is a fatal registration error.
    pub fn plugin<F, Fut>(self, f: F)
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<PluginDef>> + Send + 'static,
    {
        let f = Arc::new(f);
        let bind: Bind<PluginProducer> = Arc::new(move |instance: Instance| {
            let this = instance.downcast::<T>().ok()?;
            let f = f.clone();
            let producer: PluginProducer =
                Arc::new(move || -> BoxFuture<'static, Option<PluginDef>> {
                    Box::pin(f(this.clone()))
                });
            Some(producer)
        });
        self.finish(Registration::Plugin, MethodHandler::Plugin(bind));
    }

    /// Registers the method as the action of command `def`.
    ///
    /// Without declared bindings the handler receives the argv at index 0
    /// followed by the positional arguments.
    pub fn command<F, Fut>(
        self,
        def: impl Into<String>,
        desc: impl Into<String>,
        config: CommandConfig,
        f: F,
    ) where
        F: Fn(Arc<T>, ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let f = Arc::new(f);
        let bind: Bind<BoundAction> = Arc::new(move |instance: Instance| {
            let this = instance.downcast::<T>().ok()?;
            let f = f.clone();
            let action: BoundAction =
                Arc::new(move |args: ActionArgs| -> BoxFuture<'static, ActionResult> {
                    Box::pin(f(this.clone(), args))
                });
            Some(action)
        });
        let registration = Registration::Command {
            def: def.into(),
            desc: desc.into(),
            config,
            bindings: self.bindings.clone(),
        };
        self.finish(registration, MethodHandler::Action(bind));
    }
}

fn copy_array<V>(store: &MetadataStore, key: MetadataKey<V>, from: Target, to: Target)
where
    V: Clone + Send + Sync + 'static,
{
    store.concat(key, to, store.get_array(key, from));
}

fn bind_listener<T, F, Fut>(f: F) -> Bind<Listener>
where
    T: Injectable,
    F: Fn(Arc<T>, EventArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |instance: Instance| {
        let this = instance.downcast::<T>().ok()?;
        let f = f.clone();
        let listener: Listener = Arc::new(move |args: EventArgs| -> BoxFuture<'static, ()> {
            Box::pin(f(this.clone(), args))
        });
        Some(listener)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greeter;

    impl Injectable for Greeter {
        fn describe(class: ClassBuilder<'_, Self>) {
            class.on_platform(["discord"]).provide("greeter");
            class
                .method("greet")
                .on_guild(["1"])
                .alias("hi")
                .put_option(1, "name", "-n <name>")
                .put_session(0)
                .command("greet", "", CommandConfig::default(), |_this, _args| async {
                    Ok(None)
                });
            class.method("listen").event("ready", false, |_this, _args| async {});
        }
    }

    #[test]
    fn test_describe_records_metadata() {
        let store = MetadataStore::new();
        describe::<Greeter>(&store);
        describe::<Greeter>(&store);

        let class = Target::class::<Greeter>();
        assert_eq!(store.get_array(MEMBERS, class), vec!["greet", "listen"]);
        assert_eq!(store.get_array(ON_CONTEXT_SCOPE, class).len(), 1);
        assert_eq!(store.get_array(SERVICE_PROVIDE, class), vec!["greeter".to_owned()]);

        let greet = Target::member::<Greeter>("greet");
        assert_eq!(store.get_array(ON_CONTEXT_SCOPE, greet).len(), 1);
        assert_eq!(store.get_array(COMMAND_DEFINITION, greet).len(), 1);
        let Some(Registration::Command { bindings, .. }) = store.get(DO_REGISTER, greet) else {
            panic!("greet should be a command");
        };
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0], Binding::Session);
        assert!(matches!(&bindings[1], Binding::Option { name, .. } if name == "name"));

        let listen = Target::member::<Greeter>("listen");
        assert_eq!(
            store.get(METHOD_HANDLER, listen).map(|h| h.kind()),
            Some("event")
        );
    }

    struct Shouter {
        greeter: Arc<Greeter>,
    }

    impl Injectable for Shouter {
        fn describe(class: ClassBuilder<'_, Self>) {
            class.method("listen").before_event("shout", true, |_this, _args| async {});
            class.inherit::<Greeter>(|this| this.greeter.clone());
        }
    }

    #[test]
    fn test_inherit_copies_base_points() {
        let store = MetadataStore::new();
        describe::<Shouter>(&store);

        let class = Target::class::<Shouter>();
        assert_eq!(store.get_array(MEMBERS, class), vec!["listen", "greet"]);
        assert_eq!(store.get_array(ON_CONTEXT_SCOPE, class).len(), 1);
        assert_eq!(store.get_array(SERVICE_PROVIDE, class), vec!["greeter".to_owned()]);
        assert_eq!(
            store.get_array(MEMBERS, Target::class::<Greeter>()),
            vec!["greet", "listen"]
        );

        let greet = Target::member::<Shouter>("greet");
        assert_eq!(store.get_array(ON_CONTEXT_SCOPE, greet).len(), 1);
        assert_eq!(store.get_array(COMMAND_DEFINITION, greet).len(), 1);
        assert!(matches!(
            store.get(DO_REGISTER, Target::member::<Shouter>("listen")),
            Some(Registration::BeforeEvent { name, prepend: true }) if name == "shout"
        ));

        let Some(MethodHandler::Action(bind)) = store.get(METHOD_HANDLER, greet) else {
            panic!("greet should have an action");
        };
        let shouter = Shouter {
            greeter: Arc::new(Greeter),
        };
        assert!(bind(Arc::new(shouter)).is_some());
        assert!(bind(Arc::new(Greeter)).is_none());
    }

    #[test]
    fn test_sparse_bindings_are_unset() {
        let store = MetadataStore::new();
        ClassBuilder::<Greeter>::new(&store)
            .method("sparse")
            .put_value(2, "x")
            .command("sparse", "", CommandConfig::default(), |_this, _args| async {
                Ok(None)
            });
        let Some(Registration::Command { bindings, .. }) =
            store.get(DO_REGISTER, Target::member::<Greeter>("sparse"))
        else {
            panic!("sparse should be a command");
        };
        assert_eq!(bindings, vec![Binding::Unset, Binding::Unset, Binding::Value("x".into())]);
    }

    #[test]
    fn test_handlers_reject_foreign_instances() {
        let store = MetadataStore::new();
        describe::<Greeter>(&store);
        let Some(MethodHandler::Action(bind)) =
            store.get(METHOD_HANDLER, Target::member::<Greeter>("greet"))
        else {
            panic!("greet should have an action");
        };
        assert!(bind(Arc::new(Greeter)).is_some());
        assert!(bind(Arc::new(1_u8)).is_none());
    }

    #[test]
    fn test_action_args_accessors() {
        let args = ActionArgs::new(vec![
            Bound::Argv(Argv::new().arg("a")),
            Bound::Value(Value::from(3)),
            Bound::Session(None),
        ]);
        assert_eq!(args.argv(0).map(|a| a.args.len()), Some(1));
        assert_eq!(args.get::<u32>(1), Some(3));
        assert_eq!(args.value(0), &Value::Null);
        assert!(args.session(2).is_none());
        assert!(args.str(9).is_none());
    }
}
