//! # Tether Core
//!
//! Host types the Tether registration engine binds to.
//!
//! ## Overview
//!
//! - **App and contexts**: [`App`] owns commands, middleware, listeners,
//!   plugins and capability slots; [`Context`] is a filtered view over it
//!   with a pure algebra (`union`, `intersect`, `except`, `select`, ...).
//! - **Commands**: [`Command`] handles with before-hooks, actions, options
//!   and shell-style argument parsing.
//! - **Selections**: serialisable [`Selection`] expressions.
//! - **Metadata**: the typed [`MetadataStore`] declarations are recorded in.
//! - **Container interface**: [`ModuleContainer`] / [`Module`] /
//!   [`InstanceWrapper`], the small enumeration surface of a DI container.
//! - **Errors**: [`ActionError`], [`CoreError`] and the
//!   [`ExceptionTranslator`] seam.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_core::{App, CommandConfig, Session};
//!
//! let app = App::new();
//! let ctx = app.context().platform(["discord"]).guild(["1111111111"]);
//! ctx.command("echo <content:text>", "repeat a message", CommandConfig::default())
//!     .action(Arc::new(|argv| Box::pin(async move {
//!         Ok(argv.args.first().and_then(|v| v.as_str()).map(str::to_owned))
//!     })));
//!
//! let reply = app
//!     .receive(Session::new("discord", "bot").with_guild("1111111111").with_content("echo hi"))
//!     .await;
//! ```

pub mod app;
pub mod command;
pub mod container;
pub mod context;
pub mod error;
pub mod metadata;
pub mod plugin;
pub mod selection;
pub mod session;

pub use app::{
    App, EventArgs, Listener, Middleware, Next, ReplyTranslator, ServiceArc, before_event,
    service_event,
};
pub use command::{
    Action, ArgType, Argv, BeforeHook, Command, CommandConfig, OptionConfig, OptionDecl,
    ShortcutConfig, shell_split,
};
pub use container::{Instance, InstanceWrapper, Module, ModuleContainer, Token};
pub use context::{Context, Filter, IntoFilter, predicate};
pub use error::{
    ActionError, ActionResult, BoxError, CoreError, CoreResult, ExceptionTranslator,
};
pub use metadata::{MetadataKey, MetadataStore, Target};
pub use plugin::{Plugin, plugin_fn};
pub use selection::{ScopeKind, Selection, SelectorValue};
pub use session::{Author, Session};

pub use futures::future::BoxFuture;
