//! End-to-end registration through a module graph.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tether_core::{
    ActionError, App, Argv, CommandConfig, Context, EventArgs, MetadataStore, ScopeKind, Selection,
    Session, Target, before_event, plugin_fn,
};
use tether_framework::keys::{DO_REGISTER, MEMBERS};
use tokio_test::{assert_err, assert_ok};
use tether_framework::prelude::*;
use tether_framework::{
    ContextResolver, ExceptionHandler, InterceptorManager, MetadataFetcher, ModuleGraph,
    Registrar, Registration, RegistrationError, RegistrationReport, Template,
};

// ─── Harness ─────────────────────────────────────────────────────────────────

struct Engine {
    app: Arc<App>,
    registrar: Registrar,
}

impl Engine {
    fn new(graph: Arc<ModuleGraph>) -> Self {
        Self::with(graph, Vec::new(), Value::Null, None)
    }

    fn with(
        graph: Arc<ModuleGraph>,
        global: Vec<InterceptorRegistration>,
        params: Value,
        action_error_message: Option<String>,
    ) -> Self {
        let store = MetadataStore::global();
        let handler = Arc::new(ExceptionHandler::new(action_error_message));
        let manager = InterceptorManager::new(graph.clone(), store, handler.clone());
        let resolver = ContextResolver::new(graph, MetadataFetcher::new(store), manager)
            .with_global_interceptors(global);
        let app = App::new();
        app.set_translator(handler.clone());
        Self {
            app,
            registrar: Registrar::new(Arc::new(resolver), handler, Template::new(params)),
        }
    }

    fn root(&self) -> Context {
        self.app.context()
    }

    async fn boot(&self) -> Result<RegistrationReport, RegistrationError> {
        self.registrar.pre_register(&self.root());
        self.registrar.register(&self.root()).await
    }

    async fn say(&self, session: Session, content: &str) -> Option<String> {
        self.app.receive(session.with_content(content)).await
    }
}

fn discord(guild: &str) -> Session {
    Session::new("discord", "bot").with_user("u1").with_guild(guild)
}

struct ChatModule;

// ─── Commands and scopes ─────────────────────────────────────────────────────

struct EchoService;

impl Injectable for EchoService {
    fn describe(class: ClassBuilder<'_, Self>) {
        class.on_platform(["discord"]);
        class
            .method("on_echo")
            .on_guild(["1111111111"])
            .put_option(0, "content", "-c <content:string>")
            .command("echo", "echo back", CommandConfig::default(), |_this, args| async move {
                Ok(Some(format!("bot: {}", args.str(0).unwrap_or_default())))
            });
        class
            .method("on_boo")
            .command("boo", "", CommandConfig::default(), |_this, _args| async {
                Err(ActionError::not_found("boo: bow!"))
            });
        class
            .method("on_bow")
            .command("bow", "", CommandConfig::default(), |_this, _args| async {
                Err(ActionError::internal("bow exploded"))
            });
    }
}

#[tokio::test]
async fn test_command_with_option_binding_and_scopes() {
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(Arc::new(EchoService));
        })
        .build();
    let engine = Engine::new(graph);
    let report = assert_ok!(engine.boot().await);
    assert_eq!(report.commands, 3);

    let echo = engine.app.command("echo").expect("echo command");
    assert_eq!(echo.options().len(), 1);
    assert_eq!(echo.description(), "echo back");

    assert_eq!(
        engine.say(discord("1111111111"), "echo -c hello").await.as_deref(),
        Some("bot: hello")
    );
    assert_eq!(
        engine.say(discord("1111111111"), "echo --content=world").await.as_deref(),
        Some("bot: world")
    );
    assert!(echo.matches(&discord("1111111111")));
    assert!(!echo.matches(&discord("2222222222")));
    assert_eq!(engine.say(discord("2222222222"), "echo -c hello").await, None);
    let qq = Session::new("qq", "bot").with_user("u1").with_guild("1111111111");
    assert_eq!(engine.say(qq, "echo -c hello").await, None);
}

#[tokio::test]
async fn test_action_errors_are_translated() {
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(Arc::new(EchoService));
        })
        .build();
    let engine = Engine::new(graph);
    assert_ok!(engine.boot().await);

    assert_eq!(engine.say(discord("1"), "boo").await.as_deref(), Some("boo: bow!"));
    assert_eq!(
        engine.say(discord("1"), "bow").await.as_deref(),
        Some("Internal Server Error")
    );
}

#[tokio::test]
async fn test_empty_error_message_suppresses_reply() {
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(Arc::new(EchoService));
        })
        .build();
    let engine = Engine::with(graph, Vec::new(), Value::Null, Some(String::new()));
    assert_ok!(engine.boot().await);

    assert_eq!(engine.say(discord("1"), "bow").await, None);
    assert_eq!(engine.say(discord("1"), "boo").await.as_deref(), Some("boo: bow!"));
}

// ─── Interceptors ────────────────────────────────────────────────────────────

struct WordInterceptor(&'static str);

#[async_trait]
impl Interceptor for WordInterceptor {
    async fn intercept(&self, argv: &Argv) -> Result<Option<String>, ActionError> {
        let hit = argv.options.get("content").and_then(Value::as_str) == Some(self.0);
        Ok(hit.then(|| format!("{}!", self.0)))
    }
}

struct PooInterceptor;

#[async_trait]
impl Interceptor for PooInterceptor {
    async fn intercept(&self, argv: &Argv) -> Result<Option<String>, ActionError> {
        WordInterceptor("poo").intercept(argv).await
    }
}

impl Injectable for PooInterceptor {
    fn describe(class: ClassBuilder<'_, Self>) {
        class.as_interceptor();
    }
}

struct ZooService;

impl Injectable for ZooService {
    fn describe(class: ClassBuilder<'_, Self>) {
        class.interceptor(InterceptorRegistration::of::<PooInterceptor>());
        class
            .method("on_zzz")
            .interceptor(InterceptorRegistration::instance(WordInterceptor("moo")))
            .put_option(0, "content", "-c <content:string>")
            .command("zzz", "", CommandConfig::default(), |_this, _args| async {
                Ok(Some("zzzz".to_owned()))
            });
        class
            .method("on_locked")
            .interceptor(InterceptorRegistration::key("missing-interceptor"))
            .command("locked", "", CommandConfig::default(), |_this, _args| async {
                Ok(Some("opened".to_owned()))
            });
    }
}

#[tokio::test]
async fn test_interceptor_layers() {
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(Arc::new(PooInterceptor))
                .provider(Arc::new(ZooService));
        })
        .build();
    let engine = Engine::with(
        graph,
        vec![InterceptorRegistration::instance(WordInterceptor("pee"))],
        Value::Null,
        None,
    );
    assert_ok!(engine.boot().await);

    let zzz = engine.app.command("zzz").expect("zzz command");
    assert_eq!(zzz.hook_count(), 3);

    let session = discord("1");
    assert_eq!(engine.say(session.clone(), "zzz").await.as_deref(), Some("zzzz"));
    assert_eq!(engine.say(session.clone(), "zzz -c moo").await.as_deref(), Some("moo!"));
    assert_eq!(engine.say(session.clone(), "zzz -c pee").await.as_deref(), Some("pee!"));
    assert_eq!(engine.say(session.clone(), "zzz --content=poo").await.as_deref(), Some("poo!"));
    assert_eq!(engine.say(session.clone(), "zzz -c baa").await.as_deref(), Some("zzzz"));
    assert_eq!(
        engine.say(session, "locked").await.as_deref(),
        Some("Internal Server Error")
    );
}

// ─── Templates ───────────────────────────────────────────────────────────────

struct MiiService;

impl Injectable for MiiService {
    fn describe(class: ClassBuilder<'_, Self>) {
        class
            .method("on_mii")
            .put_value(0, "{{abstract.content}}")
            .command("{{abstract.name}}", "{{abstract.name}} command", CommandConfig::default(), |_this, args| async move {
                Ok(args.str(0).map(str::to_owned))
            });
    }
}

#[tokio::test]
async fn test_templates_render_definitions_and_values() {
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(Arc::new(MiiService));
        })
        .build();
    let params = json!({ "abstract": { "name": "mii", "content": "miiii" } });
    let engine = Engine::with(graph, Vec::new(), params, None);
    assert_ok!(engine.boot().await);

    let mii = engine.app.command("mii").expect("mii command");
    assert_eq!(mii.description(), "mii command");
    assert_eq!(engine.say(discord("1"), "mii").await.as_deref(), Some("miiii"));
}

// ─── Capabilities ────────────────────────────────────────────────────────────

struct Pinger {
    word: &'static str,
}

impl Injectable for Pinger {
    fn describe(class: ClassBuilder<'_, Self>) {
        class.provide("pinger");
    }
}

#[derive(Default)]
struct PingConsumer {
    pinger: ServiceWire<Pinger>,
    fired: AtomicUsize,
}

impl Injectable for PingConsumer {
    fn describe(class: ClassBuilder<'_, Self>) {
        class.wire("pinger", "pinger", |this: &Self| &this.pinger);
        class
            .method("on_pinger")
            .event("service/pinger", false, |this, _args| async move {
                this.fired.fetch_add(1, Ordering::SeqCst);
            });
    }
}

#[tokio::test]
async fn test_service_wire_follows_the_slot() {
    let consumer = Arc::new(PingConsumer::default());
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(consumer.clone())
                .provider(Arc::new(Pinger { word: "pong" }));
        })
        .build();
    let engine = Engine::new(graph);
    let report = assert_ok!(engine.boot().await);
    assert_eq!(report.services, 1);
    assert_eq!(report.events, 1);

    assert!(consumer.pinger.is_bound());
    assert_eq!(consumer.pinger.get().map(|p| p.word), Some("pong"));
    assert_eq!(consumer.fired.load(Ordering::SeqCst), 1);

    engine.root().set_service("pinger", None).await;
    assert!(consumer.pinger.get().is_none());
    assert_eq!(consumer.fired.load(Ordering::SeqCst), 1);

    assert!(consumer.pinger.set(Some(Arc::new(Pinger { word: "again" }))).await);
    assert_eq!(
        engine.root().service_as::<Pinger>("pinger").map(|p| p.word),
        Some("again")
    );
    assert_eq!(consumer.fired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_service_listener_fires_when_already_present() {
    let consumer = Arc::new(PingConsumer::default());
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(Arc::new(Pinger { word: "first" }))
                .provider(consumer.clone());
        })
        .build();
    let engine = Engine::new(graph);
    assert_ok!(engine.boot().await);

    assert_eq!(consumer.fired.load(Ordering::SeqCst), 1);
}

// ─── Event hooks ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Herald {
    heard: Mutex<Vec<&'static str>>,
}

impl Injectable for Herald {
    fn describe(class: ClassBuilder<'_, Self>) {
        class
            .method("on_ready")
            .event("ready", false, |this, _args| async move {
                this.heard.lock().unwrap().push("ready");
            });
        class
            .method("before_ready")
            .before_event("ready", false, |this, _args| async move {
                this.heard.lock().unwrap().push("before");
            });
    }
}

#[tokio::test]
async fn test_before_event_hooks_run_first() {
    let herald = Arc::new(Herald::default());
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(herald.clone());
        })
        .build();
    let engine = Engine::new(graph);
    let report = assert_ok!(engine.boot().await);
    assert_eq!(report.events, 1);
    assert_eq!(report.before_events, 1);
    assert_eq!(engine.app.listener_count(&before_event("ready")), 1);

    engine.root().emit("ready", EventArgs::default()).await;
    assert_eq!(*herald.heard.lock().unwrap(), vec!["before", "ready"]);
}

// ─── Inheritance ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counter {
    hits: AtomicUsize,
}

impl Injectable for Counter {
    fn describe(class: ClassBuilder<'_, Self>) {
        class.on_platform(["discord"]);
        class
            .method("on_count")
            .command("count", "", CommandConfig::default(), |this, _args| async move {
                Ok(Some(this.hits.fetch_add(1, Ordering::SeqCst).to_string()))
            });
        class
            .method("on_reset")
            .command("reset", "", CommandConfig::default(), |_this, _args| async {
                Ok(Some("reset".to_owned()))
            });
    }
}

struct Tally {
    counter: Arc<Counter>,
}

impl Injectable for Tally {
    fn describe(class: ClassBuilder<'_, Self>) {
        class
            .method("on_reset")
            .command("reset", "", CommandConfig::default(), |this, _args| async move {
                this.counter.hits.store(0, Ordering::SeqCst);
                Ok(Some("cleared".to_owned()))
            });
        class.inherit::<Counter>(|this| this.counter.clone());
    }
}

#[tokio::test]
async fn test_inherited_points_run_against_the_base() {
    let tally = Arc::new(Tally {
        counter: Arc::new(Counter::default()),
    });
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(tally.clone());
        })
        .build();
    let engine = Engine::new(graph);
    let report = assert_ok!(engine.boot().await);
    assert_eq!(report.commands, 2);

    assert_eq!(engine.say(discord("1"), "count").await.as_deref(), Some("0"));
    assert_eq!(engine.say(discord("1"), "count").await.as_deref(), Some("1"));
    assert_eq!(tally.counter.hits.load(Ordering::SeqCst), 2);

    assert_eq!(engine.say(discord("1"), "reset").await.as_deref(), Some("cleared"));
    assert_eq!(tally.counter.hits.load(Ordering::SeqCst), 0);

    let qq = Session::new("qq", "bot").with_user("u1");
    assert_eq!(engine.say(qq, "count").await, None);
}

// ─── Middleware and plugins ──────────────────────────────────────────────────

struct Gatekeeper;

impl Injectable for Gatekeeper {
    fn describe(class: ClassBuilder<'_, Self>) {
        class
            .method("on_message")
            .middleware(false, |_this, session, next| async move {
                if session.content == "ping" {
                    return Some("pong".to_owned());
                }
                next.run(session).await
            });
        class.method("greeter").plugin(|_this| async {
            let plugin = plugin_fn("greeter", |ctx: Context, _options: Value| {
                Box::pin(async move {
                    ctx.command("greet", "", CommandConfig::default())
                        .action(Arc::new(|_argv| Box::pin(async { Ok(Some("hello".to_owned())) })));
                    Ok(())
                })
            });
            Some(PluginDef::new(plugin).select(Selection::new().with(ScopeKind::Platform, "discord")))
        });
    }
}

#[tokio::test]
async fn test_middleware_and_plugins() {
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.controller(Arc::new(Gatekeeper));
        })
        .build();
    let engine = Engine::new(graph);
    let report = assert_ok!(engine.boot().await);
    assert_eq!(report.middlewares, 1);
    assert_eq!(report.plugins, 1);
    assert_eq!(engine.app.plugins(), vec!["greeter".to_owned()]);

    assert_eq!(engine.say(discord("1"), "ping").await.as_deref(), Some("pong"));
    assert_eq!(engine.say(discord("1"), "greet").await.as_deref(), Some("hello"));
    let qq = Session::new("qq", "bot").with_user("u1");
    assert_eq!(engine.say(qq, "greet").await, None);
}

struct HollowPlugin;

impl Injectable for HollowPlugin {
    fn describe(class: ClassBuilder<'_, Self>) {
        class.method("nothing").plugin(|_this| async { None });
    }
}

#[tokio::test]
async fn test_plugin_without_descriptor_fails() {
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(Arc::new(HollowPlugin));
        })
        .build();
    let engine = Engine::new(graph);
    let err = assert_err!(engine.boot().await);
    assert!(matches!(
        err,
        RegistrationError::InvalidPlugin { member: "nothing", .. }
    ));
}

struct Headless;

impl Injectable for Headless {
    fn describe(class: ClassBuilder<'_, Self>) {
        let store = class.store();
        store.set(
            DO_REGISTER,
            Target::member::<Self>("orphan"),
            Registration::Middleware { prepend: false },
        );
        store.append(MEMBERS, Target::class::<Self>(), "orphan");
    }
}

#[tokio::test]
async fn test_point_without_handler_fails() {
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(Arc::new(Headless));
        })
        .build();
    let engine = Engine::new(graph);
    let err = assert_err!(engine.boot().await);
    assert!(matches!(
        err,
        RegistrationError::MissingHandler { member: "orphan", .. }
    ));
}

// ─── Container walk ──────────────────────────────────────────────────────────

struct Lazy;

impl Injectable for Lazy {
    fn describe(class: ClassBuilder<'_, Self>) {
        class
            .method("on_lazy")
            .command("lazy", "", CommandConfig::default(), |_this, _args| async {
                Ok(None)
            });
    }
}

struct SharedModule;

#[tokio::test]
async fn test_request_scoped_skipped_and_shared_instances_registered_once() {
    let echo = Arc::new(EchoService);
    let graph = ModuleGraph::builder()
        .module::<ChatModule>(|m| {
            m.provider(echo.clone()).request_scoped::<Lazy>();
        })
        .module::<SharedModule>(|m| {
            m.provider(echo.clone());
        })
        .build();
    let engine = Engine::new(graph);
    let report = assert_ok!(engine.boot().await);

    assert_eq!(report.instances, 1);
    assert_eq!(report.commands, 3);
    assert!(engine.app.command("lazy").is_none());
}
