//! Bootstrap lifecycle.
//!
//! A [`TetherRuntime`] owns the host [`App`] and the registration engine built
//! over a DI container. Bootstrapping runs, in order:
//!
//! 1. global plugins, each narrowed by its own selector;
//! 2. pass 1 (`pre_register`): service wires are bound;
//! 3. pass 2 (`register`): every registration point is attached, and the pass
//!    waits for all of them to settle;
//! 4. the `ready` event.
//!
//! Shutdown emits `dispose`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tether_runtime::TetherRuntime;
//!
//! let runtime = TetherRuntime::builder(graph)
//!     .config_file("tether.toml")
//!     .use_plugin(greeter(), json!({ "greeting": "hi" }), ContextSelector::new())
//!     .build()?;
//!
//! runtime.run().await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tether_core::{
    App, Context, EventArgs, MetadataStore, ModuleContainer, Plugin, ScopeKind, Token,
};
use tether_framework::{
    ContextResolver, ContextSelector, ExceptionHandler, InterceptorManager,
    InterceptorRegistration, MetadataFetcher, Registrar, RegistrationReport, Template,
    apply_selector,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, TetherConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Emitted on the root context once registration has finished.
pub const READY_EVENT: &str = "ready";
/// Emitted on the root context during shutdown.
pub const DISPOSE_EVENT: &str = "dispose";

/// Whether an external HTTP server was supplied to the host.
///
/// The engine only reports the mode; request forwarding is the host's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Requests are forwarded into the supplied server.
    External,
    /// The host serves HTTP on its own.
    Fallback,
}

impl ServerMode {
    pub fn detect(http_server_present: bool) -> Self {
        if http_server_present {
            Self::External
        } else {
            Self::Fallback
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::External => "external",
            Self::Fallback => "fallback",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Booting,
    Ready,
    Disposed,
}

/// A plugin installed on the root context before registration.
struct GlobalPlugin {
    plugin: Arc<dyn Plugin>,
    options: Value,
    selector: ContextSelector,
}

// =============================================================================
// TetherRuntime
// =============================================================================

/// Owns the host app and drives registration over a DI container.
pub struct TetherRuntime {
    config: TetherConfig,
    app: Arc<App>,
    registrar: Registrar,
    global_plugins: Vec<GlobalPlugin>,
    server_mode: ServerMode,
    lifecycle: Mutex<Lifecycle>,
    shutdown: CancellationToken,
}

impl TetherRuntime {
    pub fn builder(container: Arc<dyn ModuleContainer>) -> RuntimeBuilder {
        RuntimeBuilder::new(container)
    }

    pub fn config(&self) -> &TetherConfig {
        &self.config
    }

    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// The unfiltered root context.
    pub fn context(&self) -> Context {
        self.app.context()
    }

    pub fn registrar(&self) -> &Registrar {
        &self.registrar
    }

    pub fn server_mode(&self) -> ServerMode {
        self.server_mode
    }

    pub fn is_ready(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Ready
    }

    /// A token that stops [`run`](Self::run) and [`run_until`](Self::run_until)
    /// when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The context the provider behind `token` would register on, carrying
    /// the global and class-level interceptors as command hooks.
    pub fn inject_context(&self, token: &Token) -> Context {
        self.registrar
            .resolver()
            .inject_context(&self.context(), token)
    }

    /// [`inject_context`](Self::inject_context) narrowed by one more scope.
    pub fn inject_context_scoped<I, S>(&self, token: &Token, kind: ScopeKind, values: I) -> Context
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registrar
            .resolver()
            .inject_context_scoped(&self.context(), token, kind, values)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Installs global plugins, runs both registration passes, then emits
    /// `ready`.
    ///
    /// A failed bootstrap leaves the runtime stopped.
    pub async fn bootstrap(&self) -> RuntimeResult<RegistrationReport> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle != Lifecycle::Created {
                return Err(RuntimeError::AlreadyBootstrapped);
            }
            *lifecycle = Lifecycle::Booting;
        }

        let result = self.bootstrap_inner().await;
        *self.lifecycle.lock() = match result {
            Ok(_) => Lifecycle::Ready,
            Err(_) => Lifecycle::Disposed,
        };
        result
    }

    async fn bootstrap_inner(&self) -> RuntimeResult<RegistrationReport> {
        info!(server_mode = %self.server_mode, "Bootstrapping Tether runtime");
        let root = self.context();

        for global in &self.global_plugins {
            let name = global.plugin.name();
            let options = self.config.plugin_options(name, &global.options);
            let ctx = apply_selector(&root, &global.selector);
            debug!(plugin = %name, "Installing global plugin");
            ctx.plugin(global.plugin.clone(), options).await?;
        }

        let wires = self.registrar.pre_register(&root);
        debug!(wires, "Service wires bound");

        let report = self.registrar.register(&root).await?;

        root.emit(READY_EVENT, EventArgs::default()).await;
        info!(
            commands = report.commands,
            global_plugins = self.global_plugins.len(),
            "Tether runtime is ready"
        );
        Ok(report)
    }

    /// Emits `dispose` and releases anyone waiting on the shutdown token.
    pub async fn shutdown(&self) -> RuntimeResult<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            match *lifecycle {
                Lifecycle::Created | Lifecycle::Booting => {
                    return Err(RuntimeError::NotBootstrapped);
                }
                Lifecycle::Disposed => {
                    warn!("Runtime is already stopped");
                    return Ok(());
                }
                Lifecycle::Ready => *lifecycle = Lifecycle::Disposed,
            }
        }

        info!("Stopping Tether runtime");
        self.context()
            .emit(DISPOSE_EVENT, EventArgs::default())
            .await;
        self.shutdown.cancel();
        info!("Runtime stopped");
        Ok(())
    }

    /// Bootstraps, then runs until Ctrl+C, SIGTERM or the shutdown token.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.bootstrap().await?;
        info!("Tether runtime is now running. Press Ctrl+C to stop.");
        self.wait_for_shutdown().await;
        self.shutdown().await
    }

    /// Bootstraps, then runs until `shutdown` completes or the shutdown
    /// token is cancelled.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.bootstrap().await?;
        tokio::select! {
            _ = shutdown => {}
            _ = self.shutdown.cancelled() => {}
        }
        self.shutdown().await
    }

    async fn wait_for_shutdown(&self) {
        #[cfg(unix)]
        {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                        _ = self.shutdown.cancelled() => debug!("Shutdown requested"),
                    }
                    return;
                }
                Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
            }
        }

        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                    self.shutdown.cancelled().await;
                }
            },
            _ = self.shutdown.cancelled() => debug!("Shutdown requested"),
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

enum ConfigSource {
    Loader(ConfigLoader),
    Loaded(TetherConfig),
}

/// Builder for a [`TetherRuntime`].
///
/// Configuration is loaded from the current directory and `TETHER_*`
/// variables unless [`config`](Self::config) supplies it directly.
pub struct RuntimeBuilder {
    container: Arc<dyn ModuleContainer>,
    config: ConfigSource,
    store: &'static MetadataStore,
    module_selections: Vec<(Token, ContextSelector)>,
    global_interceptors: Vec<InterceptorRegistration>,
    global_plugins: Vec<GlobalPlugin>,
    http_server_present: bool,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new(container: Arc<dyn ModuleContainer>) -> Self {
        Self {
            container,
            config: ConfigSource::Loader(ConfigLoader::new().with_current_dir()),
            store: MetadataStore::global(),
            module_selections: Vec::new(),
            global_interceptors: Vec::new(),
            global_plugins: Vec::new(),
            http_server_present: false,
            init_logging: true,
        }
    }

    fn map_loader(mut self, f: impl FnOnce(ConfigLoader) -> ConfigLoader) -> Self {
        self.config = match self.config {
            ConfigSource::Loader(loader) => ConfigSource::Loader(f(loader)),
            loaded @ ConfigSource::Loaded(_) => loaded,
        };
        self
    }

    /// Uses `config` as is, skipping file and environment loading.
    pub fn config(mut self, config: TetherConfig) -> Self {
        self.config = ConfigSource::Loaded(config);
        self
    }

    pub fn config_loader(mut self, loader: ConfigLoader) -> Self {
        self.config = ConfigSource::Loader(loader);
        self
    }

    pub fn config_file<P: AsRef<std::path::Path>>(self, path: P) -> Self {
        self.map_loader(|loader| loader.file(path))
    }

    pub fn profile(self, profile: impl AsRef<str>) -> Self {
        self.map_loader(|loader| loader.profile(profile))
    }

    pub fn search_path<P: AsRef<std::path::Path>>(self, path: P) -> Self {
        self.map_loader(|loader| loader.search_path(path))
    }

    pub fn without_env(self) -> Self {
        self.map_loader(ConfigLoader::without_env)
    }

    /// Reads declarations from `store` instead of the global store.
    pub fn metadata_store(mut self, store: &'static MetadataStore) -> Self {
        self.store = store;
        self
    }

    /// Narrows every provider of module `token` by `selector`.
    pub fn module_selection(mut self, token: Token, selector: ContextSelector) -> Self {
        self.module_selections.push((token, selector));
        self
    }

    /// Interceptors installed on every command ahead of class and method ones.
    pub fn global_interceptors<I>(mut self, registrations: I) -> Self
    where
        I: IntoIterator<Item = InterceptorRegistration>,
    {
        self.global_interceptors.extend(registrations);
        self
    }

    /// Installs `plugin` on the root context before registration.
    ///
    /// `options` can be overridden from `plugins.<name>` in the configuration.
    pub fn use_plugin(
        mut self,
        plugin: Arc<dyn Plugin>,
        options: Value,
        selector: ContextSelector,
    ) -> Self {
        self.global_plugins.push(GlobalPlugin {
            plugin,
            options,
            selector,
        });
        self
    }

    pub fn http_server(mut self, present: bool) -> Self {
        self.http_server_present = present;
        self
    }

    /// Whether `build` installs the global `tracing` subscriber (default on).
    pub fn init_logging(mut self, enabled: bool) -> Self {
        self.init_logging = enabled;
        self
    }

    pub fn build(self) -> RuntimeResult<TetherRuntime> {
        let config = match self.config {
            ConfigSource::Loader(loader) => loader.load()?,
            ConfigSource::Loaded(config) => {
                crate::config::validate_config(&config)?;
                config
            }
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let handler = Arc::new(ExceptionHandler::new(config.action_error_message.clone()));
        let interceptors =
            InterceptorManager::new(self.container.clone(), self.store, handler.clone());
        let resolver = self
            .module_selections
            .into_iter()
            .fold(
                ContextResolver::new(
                    self.container,
                    MetadataFetcher::new(self.store),
                    interceptors,
                ),
                |resolver, (token, selector)| resolver.with_module_selection(token, selector),
            )
            .with_global_interceptors(self.global_interceptors);

        let app = App::new();
        app.set_translator(handler.clone());

        let server_mode = ServerMode::detect(self.http_server_present);
        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            server_mode = %server_mode,
            "Runtime initialized from configuration"
        );

        Ok(TetherRuntime {
            registrar: Registrar::new(
                Arc::new(resolver),
                handler,
                Template::new(config.template_params.clone()),
            ),
            config,
            app,
            global_plugins: self.global_plugins,
            server_mode,
            lifecycle: Mutex::new(Lifecycle::Created),
            shutdown: CancellationToken::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use tether_core::{
        ActionError, Argv, BoxError, BoxFuture, CommandConfig, Selection, Session, plugin_fn,
    };
    use tether_framework::{ModuleGraph, prelude::*};

    use super::*;

    struct LifecycleModule;

    struct PingService;

    impl Injectable for PingService {
        fn describe(class: ClassBuilder<'_, Self>) {
            class
                .method("on_ping")
                .command("ping", "", CommandConfig::default(), |_this, _args| async {
                    Ok(Some("pong".to_owned()))
                });
        }
    }

    struct Deny;

    #[async_trait]
    impl Interceptor for Deny {
        async fn intercept(&self, _argv: &Argv) -> Result<Option<String>, ActionError> {
            Ok(Some("denied".into()))
        }
    }

    fn builder() -> RuntimeBuilder {
        let graph = ModuleGraph::builder()
            .module::<LifecycleModule>(|m| {
                m.provider(Arc::new(PingService));
            })
            .build();
        TetherRuntime::builder(graph)
            .config(TetherConfig::default())
            .init_logging(false)
    }

    fn counter(ctx: &Context, event: &str) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        ctx.on(
            event,
            Arc::new(move |_args: EventArgs| -> BoxFuture<'static, ()> {
                seen.fetch_add(1, Ordering::SeqCst);
                Box::pin(async {})
            }),
            false,
        );
        count
    }

    fn recording_plugin(name: &str, seen: Arc<Mutex<Vec<Value>>>) -> Arc<dyn Plugin> {
        plugin_fn(name, move |_ctx, options| -> BoxFuture<'static, Result<(), BoxError>> {
            seen.lock().push(options);
            Box::pin(async { Ok(()) })
        })
    }

    #[tokio::test]
    async fn test_bootstrap_registers_and_emits_ready() {
        let runtime = builder().build().unwrap();
        let ready = counter(&runtime.context(), READY_EVENT);

        let report = runtime.bootstrap().await.unwrap();
        assert_eq!(report.commands, 1);
        assert!(runtime.is_ready());
        assert_eq!(ready.load(Ordering::SeqCst), 1);

        let session = Session::new("discord", "bot").with_user("u1");
        assert_eq!(
            runtime.app().receive(session.with_content("ping")).await.as_deref(),
            Some("pong")
        );
    }

    #[tokio::test]
    async fn test_bootstrap_twice_fails() {
        let runtime = builder().build().unwrap();
        assert!(matches!(
            runtime.shutdown().await,
            Err(RuntimeError::NotBootstrapped)
        ));
        runtime.bootstrap().await.unwrap();
        assert!(matches!(
            runtime.bootstrap().await,
            Err(RuntimeError::AlreadyBootstrapped)
        ));
    }

    #[tokio::test]
    async fn test_global_plugin_options_from_config() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut config = TetherConfig::default();
        config
            .plugins
            .insert("configured".into(), json!({ "greeting": "hey" }));
        config.plugins.insert("disabled".into(), json!(false));

        let runtime = builder()
            .config(config)
            .use_plugin(
                recording_plugin("configured", seen.clone()),
                json!({ "greeting": "hello" }),
                ContextSelector::new(),
            )
            .use_plugin(
                recording_plugin("declared", seen.clone()),
                json!({ "greeting": "hi" }),
                ContextSelector::new().select(Selection::new().with(ScopeKind::Platform, "discord")),
            )
            .use_plugin(
                recording_plugin("disabled", seen.clone()),
                json!({}),
                ContextSelector::new(),
            )
            .build()
            .unwrap();
        runtime.bootstrap().await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![json!({ "greeting": "hey" }), json!({ "greeting": "hi" })]
        );
        assert_eq!(runtime.app().plugins(), vec!["configured", "declared"]);
    }

    #[tokio::test]
    async fn test_failed_plugin_aborts_bootstrap() {
        let runtime = builder()
            .use_plugin(
                plugin_fn("broken", |_ctx, _options| -> BoxFuture<'static, Result<(), BoxError>> {
                    Box::pin(async { Err("no luck".into()) })
                }),
                Value::Null,
                ContextSelector::new(),
            )
            .build()
            .unwrap();
        let ready = counter(&runtime.context(), READY_EVENT);

        assert!(matches!(
            runtime.bootstrap().await,
            Err(RuntimeError::Plugin(_))
        ));
        assert!(!runtime.is_ready());
        assert_eq!(ready.load(Ordering::SeqCst), 0);
        assert!(runtime.app().command("ping").is_none());
    }

    #[tokio::test]
    async fn test_run_until_shutdown_token() {
        let runtime = builder().build().unwrap();
        let dispose = counter(&runtime.context(), DISPOSE_EVENT);

        let token = runtime.shutdown_token();
        let (result, ()) = tokio::join!(runtime.run_until(std::future::pending()), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        result.unwrap();
        assert_eq!(dispose.load(Ordering::SeqCst), 1);

        runtime.shutdown().await.unwrap();
        assert_eq!(dispose.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inject_context_carries_global_interceptors() {
        let runtime = builder()
            .global_interceptors([InterceptorRegistration::instance(Deny)])
            .build()
            .unwrap();

        let ctx = runtime.inject_context_scoped(
            &Token::of::<PingService>(),
            ScopeKind::Platform,
            ["discord"],
        );
        assert_eq!(ctx.hooks().len(), 1);
        let command = ctx.command("guarded", "", CommandConfig::default());
        assert_eq!(command.execute(Argv::new()).await.as_deref(), Some("denied"));
    }

    #[test]
    fn test_server_mode_detection() {
        assert_eq!(ServerMode::detect(true), ServerMode::External);
        assert_eq!(ServerMode::detect(false).to_string(), "fallback");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TetherConfig {
            template_params: json!([1]),
            ..Default::default()
        };
        assert!(matches!(
            builder().config(config).build(),
            Err(RuntimeError::Config(_))
        ));
    }
}
