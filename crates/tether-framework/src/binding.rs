//! Command argument bindings.
//!
//! Each [`Binding`] has two effects: a one-time declaration on the command
//! (options, requested user/channel fields) and a per-invocation extraction
//! from the [`Argv`].

use serde_json::{Map, Value};
use tether_core::{Argv, Command, Session};

use crate::declare::{ActionArgs, Binding, Bound};
use crate::template::Template;

impl Binding {
    /// Renders template placeholders in declaration text and constants.
    pub fn render(&self, template: &Template) -> Binding {
        match self {
            Self::Option { name, desc, config } => Self::Option {
                name: name.clone(),
                desc: template.render(desc),
                config: config.clone(),
            },
            Self::Value(value) => Self::Value(template.render_value(value.clone())),
            other => other.clone(),
        }
    }

    /// Declares what this binding needs on `command`.
    pub fn pre_register(&self, command: &Command) {
        match self {
            Self::Option { name, desc, config } => {
                command.option(name, desc, config.clone());
            }
            Self::User(fields) => {
                command.user_fields_add(fields.iter().cloned());
            }
            Self::Channel(fields) => {
                command.channel_fields_add(fields.iter().cloned());
            }
            Self::Username { use_database: true } => {
                command.user_fields_add(["name"]);
            }
            _ => {}
        }
    }

    /// Extracts this binding's value from an invocation.
    pub fn resolve(&self, argv: &Argv) -> Bound {
        let session = argv.session.as_deref();
        let value = match self {
            Self::Argv => return Bound::Argv(argv.clone()),
            Self::Session => return Bound::Session(argv.session.clone()),
            Self::Unset => Value::Null,
            Self::Args => Value::Array(argv.args.clone()),
            Self::Arg(position) => argv.args.get(*position).cloned().unwrap_or(Value::Null),
            Self::Option { name, .. } => argv.option_value(name),
            Self::SessionField(field) => session.map_or(Value::Null, |s| s.field(field)),
            Self::User(fields) => project(session.and_then(|s| s.user.as_ref()), fields),
            Self::Channel(fields) => project(session.and_then(|s| s.channel.as_ref()), fields),
            Self::Username { use_database } => {
                session.and_then(|s| username(s, *use_database)).map_or(Value::Null, Value::String)
            }
            Self::Value(value) => value.clone(),
        };
        Bound::Value(value)
    }
}

/// Builds handler arguments for one invocation.
///
/// Without bindings the handler sees the argv followed by the positional
/// arguments.
pub fn bind_arguments(bindings: &[Binding], argv: Argv) -> ActionArgs {
    if bindings.is_empty() {
        let mut bound = Vec::with_capacity(argv.args.len() + 1);
        bound.extend(argv.args.iter().cloned().map(Bound::Value));
        bound.insert(0, Bound::Argv(argv));
        return ActionArgs::new(bound);
    }
    ActionArgs::new(bindings.iter().map(|b| b.resolve(&argv)).collect())
}

/// Keeps only `fields` of a record; an empty field list keeps everything.
fn project(record: Option<&Value>, fields: &[String]) -> Value {
    match record {
        None => Value::Null,
        Some(Value::Object(map)) if !fields.is_empty() => Value::Object(
            fields
                .iter()
                .filter_map(|f| map.get(f).map(|v| (f.clone(), v.clone())))
                .collect::<Map<_, _>>(),
        ),
        Some(other) => other.clone(),
    }
}

/// Display name: stored name, then nickname, then username, then user id.
fn username(session: &Session, use_database: bool) -> Option<String> {
    let stored = use_database
        .then(|| session.user.as_ref()?.get("name")?.as_str())
        .flatten()
        .filter(|name| !name.is_empty())
        .map(str::to_owned);
    let author = session.author.as_ref();
    stored
        .or_else(|| author.and_then(|a| a.nickname.clone()).filter(|s| !s.is_empty()))
        .or_else(|| author.and_then(|a| a.username.clone()).filter(|s| !s.is_empty()))
        .or_else(|| session.user_id.clone().filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::{App, Author, CommandConfig, OptionConfig};

    fn session() -> Session {
        Session::new("discord", "bot")
            .with_user("u1")
            .with_guild("g1")
            .with_author(Author {
                nickname: None,
                username: Some("alice".into()),
            })
            .with_user_record(json!({ "name": "Alice", "authority": 3 }))
    }

    #[test]
    fn test_resolve_values() {
        let argv = Argv::new()
            .arg("first")
            .arg("second")
            .option("content", "hi")
            .session(session());

        let value = |b: Binding| match b.resolve(&argv) {
            Bound::Value(v) => v,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(value(Binding::Arg(1)), json!("second"));
        assert_eq!(value(Binding::Arg(5)), Value::Null);
        assert_eq!(value(Binding::Args), json!(["first", "second"]));
        assert_eq!(
            value(Binding::Option {
                name: "content".into(),
                desc: String::new(),
                config: OptionConfig::default(),
            }),
            json!("hi")
        );
        assert_eq!(value(Binding::SessionField("guildId".into())), json!("g1"));
        assert_eq!(value(Binding::User(vec!["name".into()])), json!({ "name": "Alice" }));
        assert_eq!(value(Binding::Channel(vec![])), Value::Null);
        assert_eq!(value(Binding::Username { use_database: true }), json!("Alice"));
        assert_eq!(value(Binding::Username { use_database: false }), json!("alice"));
        assert_eq!(value(Binding::Unset), Value::Null);
    }

    #[test]
    fn test_username_falls_back_to_user_id() {
        let argv = Argv::new().session(Session::new("discord", "bot").with_user("u9"));
        let Bound::Value(v) = Binding::Username { use_database: true }.resolve(&argv) else {
            panic!("expected value");
        };
        assert_eq!(v, json!("u9"));
    }

    #[test]
    fn test_username_skips_empty_names() {
        let session = Session::new("discord", "bot")
            .with_user("u7")
            .with_author(Author {
                nickname: Some(String::new()),
                username: Some("bob".into()),
            })
            .with_user_record(json!({ "name": "" }));
        let argv = Argv::new().session(session);
        let Bound::Value(v) = Binding::Username { use_database: true }.resolve(&argv) else {
            panic!("expected value");
        };
        assert_eq!(v, json!("bob"));

        let blank = Session::new("discord", "bot").with_author(Author {
            nickname: Some(String::new()),
            username: Some(String::new()),
        });
        let argv = Argv::new().session(blank);
        let Bound::Value(v) = Binding::Username { use_database: false }.resolve(&argv) else {
            panic!("expected value");
        };
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn test_pre_register_declares_options_and_fields() {
        let app = App::new();
        let command = app.context().command("who", "", CommandConfig::default());
        Binding::Option {
            name: "target".into(),
            desc: "-t <target>".into(),
            config: OptionConfig::default(),
        }
        .pre_register(&command);
        Binding::Username { use_database: true }.pre_register(&command);
        Binding::Channel(vec!["locale".into()]).pre_register(&command);

        assert_eq!(command.options().len(), 1);
        assert_eq!(command.user_fields(), vec!["name"]);
        assert_eq!(command.channel_fields(), vec!["locale"]);
    }

    #[test]
    fn test_unbound_handlers_get_argv_then_args() {
        let args = bind_arguments(&[], Argv::new().arg("x"));
        assert_eq!(args.len(), 2);
        assert!(args.argv(0).is_some());
        assert_eq!(args.str(1), Some("x"));
    }
}
