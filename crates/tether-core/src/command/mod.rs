//! Commands and their invocation arguments.
//!
//! A [`Command`] is a cheap-to-clone handle; every clone refers to the same
//! command registered on the [`App`]. Mutators (`alias`, `usage`, `option`,
//! ...) take `&self` and return a handle so they can be chained.
//!
//! Invocation runs the before-hooks in installation order. The first hook
//! that answers short-circuits the call; otherwise the action runs and its
//! error, if any, is routed through the app's
//! [`ExceptionTranslator`](crate::ExceptionTranslator).

mod split;
mod syntax;

use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::app::App;
use crate::context::Filter;
use crate::error::{ActionError, ActionResult};
use crate::session::Session;

pub use split::shell_split;
pub use syntax::{ArgType, OptionConfig, OptionDecl, ValueDecl, parse_definition};

/// A before-hook: answers with `Some(reply)` to short-circuit the command.
pub type BeforeHook = Arc<dyn Fn(Argv) -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// A command action.
pub type Action = Arc<dyn Fn(Argv) -> BoxFuture<'static, ActionResult> + Send + Sync>;

/// Flags passed when a command is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// The command has no default action.
    pub empty: bool,
    /// Hide the command from help output.
    pub hidden: bool,
}

/// Predefined arguments applied when a shortcut matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub args: Vec<String>,
    pub options: Map<String, Value>,
    /// Accept trailing text after the shortcut as extra arguments.
    pub fuzzy: bool,
}

// =============================================================================
// Argv
// =============================================================================

/// Parsed invocation of a command.
#[derive(Debug, Clone, Default)]
pub struct Argv {
    pub args: Vec<Value>,
    pub options: Map<String, Value>,
    pub session: Option<Arc<Session>>,
    pub command: Option<Command>,
}

impl Argv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(Arc::new(session));
        self
    }

    /// Returns the named option or `Null`.
    pub fn option_value(&self, name: &str) -> Value {
        self.options.get(name).cloned().unwrap_or(Value::Null)
    }
}

// =============================================================================
// Command
// =============================================================================

#[derive(Default)]
struct CommandState {
    args: Vec<ValueDecl>,
    description: String,
    config: CommandConfig,
    options: Vec<OptionDecl>,
    aliases: Vec<String>,
    usage: Option<String>,
    examples: Vec<String>,
    shortcuts: Vec<(String, ShortcutConfig)>,
    user_fields: Vec<String>,
    channel_fields: Vec<String>,
    hooks: Vec<BeforeHook>,
    action: Option<Action>,
}

struct CommandInner {
    name: String,
    filter: Filter,
    app: Weak<App>,
    state: RwLock<CommandState>,
}

/// Handle to a registered command.
#[derive(Clone)]
pub struct Command {
    inner: Arc<CommandInner>,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

impl Command {
    pub(crate) fn new(
        def: &str,
        description: &str,
        config: CommandConfig,
        filter: Filter,
        app: Weak<App>,
    ) -> Self {
        let (name, args) = parse_definition(def);
        let state = CommandState {
            args,
            description: description.to_owned(),
            config,
            ..Default::default()
        };
        Self {
            inner: Arc::new(CommandInner {
                name,
                filter,
                app,
                state: RwLock::new(state),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `true` if both handles refer to the same command.
    pub fn ptr_eq(&self, other: &Command) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns `true` if `session` falls inside the context the command was
    /// created on.
    pub fn matches(&self, session: &Session) -> bool {
        (self.inner.filter)(session)
    }

    pub fn description(&self) -> String {
        self.inner.state.read().description.clone()
    }

    pub fn config(&self) -> CommandConfig {
        self.inner.state.read().config.clone()
    }

    pub fn aliases(&self) -> Vec<String> {
        self.inner.state.read().aliases.clone()
    }

    pub fn options(&self) -> Vec<OptionDecl> {
        self.inner.state.read().options.clone()
    }

    pub fn examples(&self) -> Vec<String> {
        self.inner.state.read().examples.clone()
    }

    pub fn usage_text(&self) -> Option<String> {
        self.inner.state.read().usage.clone()
    }

    pub fn user_fields(&self) -> Vec<String> {
        self.inner.state.read().user_fields.clone()
    }

    pub fn channel_fields(&self) -> Vec<String> {
        self.inner.state.read().channel_fields.clone()
    }

    pub fn hook_count(&self) -> usize {
        self.inner.state.read().hooks.len()
    }

    pub fn has_action(&self) -> bool {
        self.inner.state.read().action.is_some()
    }

    /// Returns `true` if `word` is the command name or one of its aliases.
    pub fn is_named(&self, word: &str) -> bool {
        self.inner.name == word || self.inner.state.read().aliases.iter().any(|a| a == word)
    }

    // ─── Mutators ────────────────────────────────────────────────────────────

    pub fn set_description(&self, description: impl Into<String>) -> Command {
        self.inner.state.write().description = description.into();
        self.clone()
    }

    pub fn alias(&self, name: impl Into<String>) -> Command {
        let name = name.into();
        let mut state = self.inner.state.write();
        if !state.aliases.contains(&name) {
            state.aliases.push(name);
        }
        drop(state);
        self.clone()
    }

    pub fn usage(&self, text: impl Into<String>) -> Command {
        self.inner.state.write().usage = Some(text.into());
        self.clone()
    }

    pub fn example(&self, text: impl Into<String>) -> Command {
        self.inner.state.write().examples.push(text.into());
        self.clone()
    }

    pub fn shortcut(&self, text: impl Into<String>, config: ShortcutConfig) -> Command {
        self.inner.state.write().shortcuts.push((text.into(), config));
        self.clone()
    }

    /// Declares an option. Re-declaring a name replaces the earlier entry.
    pub fn option(&self, name: &str, desc: &str, config: OptionConfig) -> Command {
        let decl = OptionDecl::parse(name, desc, config);
        let mut state = self.inner.state.write();
        match state.options.iter_mut().find(|o| o.name == decl.name) {
            Some(existing) => *existing = decl,
            None => state.options.push(decl),
        }
        drop(state);
        self.clone()
    }

    pub fn user_fields_add<I, S>(&self, fields: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        merge_fields(&mut self.inner.state.write().user_fields, fields);
        self.clone()
    }

    pub fn channel_fields_add<I, S>(&self, fields: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        merge_fields(&mut self.inner.state.write().channel_fields, fields);
        self.clone()
    }

    /// Appends a before-hook. Hooks run in the order they were added.
    pub fn before(&self, hook: BeforeHook) -> Command {
        self.inner.state.write().hooks.push(hook);
        self.clone()
    }

    /// Sets the action, replacing any previous one.
    pub fn action(&self, action: Action) -> Command {
        self.inner.state.write().action = Some(action);
        self.clone()
    }

    // ─── Invocation ──────────────────────────────────────────────────────────

    /// Runs the command with an already parsed [`Argv`].
    ///
    /// Declared option fallbacks are filled in before hooks run. Returns
    /// `None` when the command produced no reply. A hook answering with an
    /// empty string stops the command silently.
    pub async fn execute(&self, mut argv: Argv) -> Option<String> {
        let (hooks, action) = {
            let state = self.inner.state.read();
            for opt in &state.options {
                if let Some(fallback) = &opt.config.fallback {
                    argv.options
                        .entry(opt.name.clone())
                        .or_insert_with(|| fallback.clone());
                }
            }
            (state.hooks.clone(), state.action.clone())
        };
        if argv.command.is_none() {
            argv.command = Some(self.clone());
        }

        for hook in hooks {
            if let Some(reply) = hook(argv.clone()).await {
                debug!(command = %self.inner.name, "Before-hook answered");
                return (!reply.is_empty()).then_some(reply);
            }
        }

        let action = action?;
        match action(argv).await {
            Ok(reply) => reply,
            Err(err) => self.translate(&err),
        }
    }

    /// Parses `text` and runs the command.
    ///
    /// Parse failures are answered like user-facing action errors.
    pub async fn execute_text(&self, text: &str, session: Option<Session>) -> Option<String> {
        match self.parse(text) {
            Ok(mut argv) => {
                argv.session = session.map(Arc::new);
                self.execute(argv).await
            }
            Err(err) => self.translate(&err),
        }
    }

    fn translate(&self, err: &ActionError) -> Option<String> {
        match self.inner.app.upgrade() {
            Some(app) => app.translator().translate(err),
            None => err.is_user_facing().then(|| err.to_string()),
        }
    }

    /// Parses command text into an [`Argv`].
    ///
    /// A leading command name or alias is skipped. `--name`, `--name=value`
    /// and `-x` map to declared options; everything else is positional.
    pub fn parse(&self, text: &str) -> Result<Argv, ActionError> {
        let mut tokens = shell_split(text).into_iter().peekable();
        if tokens.peek().is_some_and(|first| self.is_named(first)) {
            tokens.next();
        }
        let tokens: Vec<String> = tokens.collect();
        let state = self.inner.state.read();
        let mut argv = Argv::new();
        let mut positional = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            i += 1;
            let (decl, inline) = if let Some(flag) = token.strip_prefix("--") {
                let (flag, inline) = match flag.split_once('=') {
                    Some((f, v)) => (f, Some(v.to_owned())),
                    None => (flag, None),
                };
                match state.options.iter().find(|o| o.matches_long(flag)) {
                    Some(decl) => (decl, inline),
                    None => {
                        return Err(ActionError::reply(format!("unknown option: --{flag}")));
                    }
                }
            } else if let Some(decl) = short_flag(token)
                .and_then(|flag| state.options.iter().find(|o| o.matches_short(flag)))
            {
                (decl, None)
            } else {
                positional.push(token.clone());
                continue;
            };

            let value = match &decl.value {
                None => Value::Bool(true),
                Some(param) => {
                    let raw = match inline {
                        Some(v) => v,
                        None if i < tokens.len() => {
                            i += 1;
                            tokens[i - 1].clone()
                        }
                        None => {
                            return Err(ActionError::reply(format!(
                                "missing value for option: {}",
                                decl.name
                            )));
                        }
                    };
                    param.ty.convert(&raw).ok_or_else(|| {
                        ActionError::reply(format!("invalid value for option {}: {raw}", decl.name))
                    })?
                }
            };
            argv.options.insert(decl.name.clone(), value);
        }

        argv.args = convert_positional(&state.args, positional)?;
        Ok(argv)
    }

    /// Returns the matching shortcut invocation for `content`, if any.
    pub fn match_shortcut(&self, content: &str) -> Option<Argv> {
        let state = self.inner.state.read();
        state.shortcuts.iter().find_map(|(text, config)| {
            let rest = if content == text {
                ""
            } else if config.fuzzy {
                content.strip_prefix(text.as_str())?
            } else {
                return None;
            };
            let mut argv = Argv::new();
            argv.args = config.args.iter().cloned().map(Value::String).collect();
            argv.args
                .extend(shell_split(rest).into_iter().map(Value::String));
            argv.options = config.options.clone();
            Some(argv)
        })
    }

    /// Renders help text for the command.
    pub fn help(&self) -> String {
        let state = self.inner.state.read();
        let mut lines = vec![format!("{} {}", self.inner.name, syntax::render_args(&state.args))
            .trim_end()
            .to_owned()];
        if !state.description.is_empty() {
            lines.push(state.description.clone());
        }
        if !state.aliases.is_empty() {
            lines.push(format!("Aliases: {}", state.aliases.join(", ")));
        }
        if let Some(usage) = &state.usage {
            lines.push(usage.clone());
        }
        let visible: Vec<_> = state.options.iter().filter(|o| !o.config.hidden).collect();
        if !visible.is_empty() {
            lines.push("Options:".to_owned());
            lines.extend(visible.iter().map(|o| format!("  {}", o.render())));
        }
        if !state.examples.is_empty() {
            lines.push("Examples:".to_owned());
            lines.extend(state.examples.iter().map(|e| format!("  {e}")));
        }
        lines.join("\n")
    }
}

fn merge_fields<I, S>(target: &mut Vec<String>, fields: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for field in fields {
        let field = field.into();
        if !target.contains(&field) {
            target.push(field);
        }
    }
}

/// `-x` with exactly one flag character. Anything else (e.g. `-5`) is left
/// to the positional arguments.
fn short_flag(token: &str) -> Option<char> {
    let mut chars = token.strip_prefix('-')?.chars();
    let flag = chars.next()?;
    chars.next().is_none().then_some(flag)
}

fn convert_positional(decls: &[ValueDecl], raw: Vec<String>) -> Result<Vec<Value>, ActionError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut raw = raw.into_iter();
    for decl in decls {
        if decl.ty == ArgType::Text {
            let rest: Vec<String> = raw.by_ref().collect();
            if !rest.is_empty() {
                out.push(Value::String(rest.join(" ")));
            }
            break;
        }
        let Some(token) = raw.next() else { break };
        let value = decl.ty.convert(&token).ok_or_else(|| {
            ActionError::reply(format!("invalid value for argument {}: {token}", decl.name))
        })?;
        out.push(value);
    }
    out.extend(raw.map(Value::String));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;

    fn echo(app: &Arc<App>) -> Command {
        app.context()
            .command("echo [rest:text]", "hi", CommandConfig::default())
            .option("content", "-c <content:string>", OptionConfig::default())
            .option("times", "-t <times:posint>", OptionConfig {
                fallback: Some(Value::from(1)),
                ..Default::default()
            })
            .option("loud", "-l", OptionConfig::default())
    }

    #[test]
    fn test_parse_options_and_args() {
        let app = App::new();
        let cmd = echo(&app);
        let argv = cmd.parse(r#"echo -c "hello there" --loud tail words"#).unwrap();
        assert_eq!(argv.option_value("content"), Value::from("hello there"));
        assert_eq!(argv.option_value("loud"), Value::Bool(true));
        assert_eq!(argv.args, vec![Value::from("tail words")]);

        let argv = cmd.parse("--times=3").unwrap();
        assert_eq!(argv.option_value("times"), Value::from(3_u64));
    }

    #[test]
    fn test_parse_errors_are_user_facing() {
        let app = App::new();
        let cmd = echo(&app);
        assert!(cmd.parse("echo --nope").unwrap_err().is_user_facing());
        assert!(cmd.parse("echo -t zero").unwrap_err().is_user_facing());
        assert!(cmd.parse("echo -c").unwrap_err().is_user_facing());
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_and_short_circuit() {
        let app = App::new();
        let cmd = echo(&app);
        let pass: BeforeHook = Arc::new(|_| Box::pin(async { None }));
        let answer: BeforeHook = Arc::new(|argv: Argv| {
            Box::pin(async move {
                (argv.option_value("content") == "stop").then(|| "stopped".to_owned())
            })
        });
        cmd.before(pass).before(answer).action(Arc::new(|argv: Argv| {
            Box::pin(async move {
                Ok(Some(format!(
                    "bot: {} x{}",
                    argv.option_value("content").as_str().unwrap_or_default(),
                    argv.option_value("times")
                )))
            })
        }));

        assert_eq!(
            cmd.execute(Argv::new().option("content", "stop")).await.as_deref(),
            Some("stopped")
        );
        assert_eq!(
            cmd.execute_text("echo -c go", None).await.as_deref(),
            Some("bot: go x1")
        );
    }

    #[tokio::test]
    async fn test_action_errors_are_translated() {
        let app = App::new();
        let cmd = app
            .context()
            .command("fail", "", CommandConfig::default())
            .action(Arc::new(|_| Box::pin(async { Err(ActionError::not_found("gone")) })));
        assert_eq!(cmd.execute(Argv::new()).await.as_deref(), Some("gone"));
    }

    #[test]
    fn test_mutators_and_help() {
        let app = App::new();
        let cmd = echo(&app).alias("say").usage("say something").example("echo -c hi");
        assert!(cmd.is_named("say"));
        assert!(app.command("say").is_some_and(|c| c.ptr_eq(&cmd)));
        let help = cmd.help();
        assert!(help.starts_with("echo [rest:text]\nhi"));
        assert!(help.contains("-c, --content <content>"));
        assert!(help.contains("Examples:\n  echo -c hi"));
    }

    #[test]
    fn test_shortcut() {
        let app = App::new();
        let cmd = echo(&app).shortcut("hey", ShortcutConfig {
            fuzzy: true,
            ..Default::default()
        });
        let argv = cmd.match_shortcut("hey you").unwrap();
        assert_eq!(argv.args, vec![Value::from("you")]);
        assert!(cmd.match_shortcut("nope").is_none());
    }
}
