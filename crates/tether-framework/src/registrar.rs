//! Two-pass registration of live providers.
//!
//! [`Registrar::pre_register`] binds service wires on every live instance.
//! [`Registrar::register`] then provides declared capabilities and attaches
//! every registration point (middleware, event listener, plugin, command)
//! to the point's resolved context. Asynchronous work spawned by pass 2 is
//! collected and awaited before `register` returns.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tether_core::{
    ActionResult, Argv, Command, CommandConfig, Context, EventArgs, ExceptionTranslator, Instance,
    InstanceWrapper, Module,
};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::binding::bind_arguments;
use crate::declare::{Binding, BoundAction, MethodHandler, Registration};
use crate::error::{RegistrationError, RegistrationResult};
use crate::interceptor::dedup_registrations;
use crate::keys::{
    COMMAND_DEFINITION, COMMAND_INTERCEPTORS, DO_REGISTER, METHOD_HANDLER, SERVICE_PROVIDE,
    SERVICE_WIRE,
};
use crate::resolver::ContextResolver;
use crate::selector::{apply_selector, coalesce};
use crate::template::Template;

// =============================================================================
// Report
// =============================================================================

/// What a registration pass attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub instances: usize,
    pub services: usize,
    pub middlewares: usize,
    pub events: usize,
    /// Hooks attached ahead of events.
    pub before_events: usize,
    pub plugins: usize,
    pub commands: usize,
}

impl RegistrationReport {
    fn record(&mut self, kind: &str) {
        match kind {
            "middleware" => self.middlewares += 1,
            "event" => self.events += 1,
            "before-event" => self.before_events += 1,
            "plugin" => self.plugins += 1,
            "command" => self.commands += 1,
            _ => {}
        }
    }
}

// =============================================================================
// Registrar
// =============================================================================

type Pending = BoxFuture<'static, (&'static str, RegistrationResult<()>)>;

enum Point {
    Done(&'static str),
    Pending(Pending),
}

/// A static provider with its instance and the modules containing it.
struct LiveInstance {
    wrapper: InstanceWrapper,
    instance: Instance,
    modules: Vec<Arc<dyn Module>>,
}

impl LiveInstance {
    fn class(&self) -> TypeId {
        self.wrapper.class
    }

    fn class_name(&self) -> &'static str {
        self.wrapper.class_name
    }
}

/// Walks the container and attaches every declared registration point.
pub struct Registrar {
    resolver: Arc<ContextResolver>,
    translator: Arc<dyn ExceptionTranslator>,
    template: Template,
}

impl Registrar {
    pub fn new(
        resolver: Arc<ContextResolver>,
        translator: Arc<dyn ExceptionTranslator>,
        template: Template,
    ) -> Self {
        Self {
            resolver,
            translator,
            template,
        }
    }

    pub fn resolver(&self) -> &Arc<ContextResolver> {
        &self.resolver
    }

    /// Live static instances, controllers before providers, first-seen order.
    ///
    /// An instance listed by several modules appears once, with every module
    /// that lists it.
    fn live_instances(&self) -> Vec<LiveInstance> {
        let mut live: Vec<LiveInstance> = Vec::new();
        let mut seen: HashMap<*const (), usize> = HashMap::new();
        for module in self.resolver.container().modules() {
            let wrappers: Vec<InstanceWrapper> = module
                .controllers()
                .iter()
                .chain(module.providers())
                .cloned()
                .collect();
            for wrapper in wrappers {
                if !wrapper.is_dependency_tree_static() {
                    debug!(provider = %wrapper.token, "Skipping per-request provider");
                    continue;
                }
                let Some(instance) = wrapper.instance.clone() else {
                    debug!(provider = %wrapper.token, "Skipping unresolved provider");
                    continue;
                };
                let key = Arc::as_ptr(&instance) as *const ();
                match seen.get(&key) {
                    Some(&index) => {
                        let entry = &mut live[index];
                        if !entry.modules.iter().any(|m| Arc::ptr_eq(m, &module)) {
                            entry.modules.push(module.clone());
                        }
                    }
                    None => {
                        seen.insert(key, live.len());
                        live.push(LiveInstance {
                            wrapper,
                            instance,
                            modules: vec![module.clone()],
                        });
                    }
                }
            }
        }
        live
    }

    // ─── Pass 1 ──────────────────────────────────────────────────────────────

    /// Binds declared service wires. Returns how many were bound.
    pub fn pre_register(&self, root: &Context) -> usize {
        let _span = info_span!("pre_register").entered();
        let fetcher = self.resolver.fetcher();
        let mut bound = 0;
        for live in self.live_instances() {
            let wires = fetcher.class_array(SERVICE_WIRE, live.class());
            if wires.is_empty() {
                continue;
            }
            let ctx = self.resolver.instance_context(root, &live.modules, live.class());
            for wire in wires {
                if wire.apply(&live.instance, &ctx) {
                    debug!(
                        class = live.class_name(),
                        property = wire.property,
                        service = %wire.service,
                        "Service wire bound"
                    );
                    bound += 1;
                } else {
                    warn!(
                        class = live.class_name(),
                        property = wire.property,
                        "Service wire does not match the instance type"
                    );
                }
            }
        }
        bound
    }

    // ─── Pass 2 ──────────────────────────────────────────────────────────────

    /// Provides capabilities and attaches registration points.
    ///
    /// Every failure is logged; the first one is returned once all pending
    /// work has settled.
    pub async fn register(&self, root: &Context) -> RegistrationResult<RegistrationReport> {
        self.register_all(root).instrument(info_span!("register")).await
    }

    async fn register_all(&self, root: &Context) -> RegistrationResult<RegistrationReport> {
        let fetcher = self.resolver.fetcher();
        let mut report = RegistrationReport::default();
        let mut pending: FuturesUnordered<Pending> = FuturesUnordered::new();
        let mut errors: Vec<RegistrationError> = Vec::new();

        for live in self.live_instances() {
            report.instances += 1;
            let ctx = self.resolver.instance_context(root, &live.modules, live.class());

            for name in fetcher.class_array(SERVICE_PROVIDE, live.class()) {
                debug!(class = live.class_name(), service = %name, "Providing service");
                ctx.provide(&name, live.instance.clone()).await;
                report.services += 1;
            }

            for member in fetcher.members(live.class()) {
                match self.register_point(&ctx, &live, member) {
                    Ok(Point::Done(kind)) => report.record(kind),
                    Ok(Point::Pending(work)) => pending.push(work),
                    Err(err) => {
                        error!(class = live.class_name(), member, error = %err, "Registration failed");
                        errors.push(err);
                    }
                }
            }
        }

        while let Some((kind, result)) = pending.next().await {
            match result {
                Ok(()) => report.record(kind),
                Err(err) => {
                    error!(error = %err, "Registration failed");
                    errors.push(err);
                }
            }
        }

        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }
        info!(
            instances = report.instances,
            services = report.services,
            middlewares = report.middlewares,
            events = report.events,
            before_events = report.before_events,
            plugins = report.plugins,
            commands = report.commands,
            "Registration complete"
        );
        Ok(report)
    }

    fn register_point(
        &self,
        ctx: &Context,
        live: &LiveInstance,
        member: &'static str,
    ) -> RegistrationResult<Point> {
        let (class, class_name) = (live.class(), live.class_name());
        let fetcher = self.resolver.fetcher();
        let registration = fetcher.member_metadata(DO_REGISTER, class, member);
        let handler = fetcher.member_metadata(METHOD_HANDLER, class, member);
        let (Some(registration), Some(handler)) = (registration, handler) else {
            return Err(RegistrationError::MissingHandler {
                class: class_name,
                member,
            });
        };
        let mismatch = || RegistrationError::InstanceMismatch {
            class: class_name,
            member,
        };

        let ctx = self.resolver.point_context(ctx, class, member);
        debug!(class = class_name, member, kind = registration.kind(), "Registering point");

        match (registration, handler) {
            (Registration::Middleware { prepend }, MethodHandler::Middleware(bind)) => {
                let middleware = bind(live.instance.clone()).ok_or_else(mismatch)?;
                ctx.middleware(middleware, prepend);
                Ok(Point::Done("middleware"))
            }
            (Registration::Event { name, prepend }, MethodHandler::Event(bind)) => {
                let listener = bind(live.instance.clone()).ok_or_else(mismatch)?;
                let Some(service) = name.strip_prefix("service/") else {
                    ctx.on(&name, listener, prepend);
                    return Ok(Point::Done("event"));
                };
                if !ctx.on_service(service, listener.clone(), prepend) {
                    return Ok(Point::Done("event"));
                }
                debug!(class = class_name, member, service, "Service already present");
                Ok(Point::Pending(
                    async move {
                        listener(EventArgs::default()).await;
                        ("event", Ok(()))
                    }
                    .boxed(),
                ))
            }
            (Registration::BeforeEvent { name, prepend }, MethodHandler::Event(bind)) => {
                let listener = bind(live.instance.clone()).ok_or_else(mismatch)?;
                ctx.before(&name, listener, prepend);
                Ok(Point::Done("before-event"))
            }
            (Registration::Plugin, MethodHandler::Plugin(bind)) => {
                let producer = bind(live.instance.clone()).ok_or_else(mismatch)?;
                Ok(Point::Pending(
                    async move {
                        let Some(def) = producer().await else {
                            let err = RegistrationError::InvalidPlugin {
                                class: class_name,
                                member,
                            };
                            return ("plugin", Err(err));
                        };
                        let target = apply_selector(&ctx, &def.selector);
                        let result = target
                            .plugin(def.plugin, def.options)
                            .await
                            .map(drop)
                            .map_err(RegistrationError::from);
                        ("plugin", result)
                    }
                    .boxed(),
                ))
            }
            (
                Registration::Command {
                    def,
                    desc,
                    config,
                    bindings,
                },
                MethodHandler::Action(bind),
            ) => {
                let action = bind(live.instance.clone()).ok_or_else(mismatch)?;
                let command =
                    self.register_command(&ctx, class, member, &def, &desc, config, bindings, action);
                debug!(command = %command.name(), class = class_name, member, "Command registered");
                Ok(Point::Done("command"))
            }
            (registration, handler) => Err(RegistrationError::HandlerMismatch {
                class: class_name,
                member,
                declared: registration.kind(),
                handler: handler.kind(),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn register_command(
        &self,
        ctx: &Context,
        class: TypeId,
        member: &'static str,
        def: &str,
        desc: &str,
        config: CommandConfig,
        bindings: Vec<Binding>,
        action: BoundAction,
    ) -> Command {
        let fetcher = self.resolver.fetcher();
        let command = ctx.command(
            &self.template.render(def),
            &self.template.render(desc),
            config.clone(),
        );
        let command = fetcher
            .property_array(COMMAND_DEFINITION, class, member)
            .iter()
            .fold(command, |command, mutate| {
                let next = mutate(&command);
                coalesce(command, next)
            });

        let bindings: Arc<[Binding]> = bindings
            .iter()
            .map(|b| b.render(&self.template))
            .collect();
        for binding in bindings.iter() {
            binding.pre_register(&command);
        }
        if config.empty {
            return command;
        }

        let registrations = dedup_registrations(
            self.resolver
                .global_interceptors()
                .iter()
                .cloned()
                .chain(fetcher.property_array(COMMAND_INTERCEPTORS, class, member)),
        );
        self.resolver
            .interceptors()
            .add_interceptors(&command, &registrations);

        let translator = self.translator.clone();
        command.action(Arc::new(move |argv: Argv| -> BoxFuture<'static, ActionResult> {
            let args = bind_arguments(&bindings, argv);
            let action = action.clone();
            let translator = translator.clone();
            async move {
                match action(args).await {
                    Ok(reply) => Ok(reply),
                    Err(err) => Ok(translator.translate(&err)),
                }
            }
            .boxed()
        }))
    }
}
